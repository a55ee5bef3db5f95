//! Health scorer.
//!
//! The score is a bounded random walk, not a time-decayed average. Each
//! completed run moves it by a fixed step and the result is clamped to
//! `[MIN_SCORE, MAX_SCORE]`:
//!
//! | outcome                 | step |
//! |-------------------------|------|
//! | success                 |  +5  |
//! | transient failure       |  -5  |
//! | non-transient failure   | -15  |
//!
//! A source with no history starts from `MAX_SCORE` before its first step.
//! Stores apply a [`ScoreStep`] inside their atomic upsert, so this module is
//! the only place the step sizes live.

use crate::types::RunOutcome;

pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 100.0;

/// Baseline for a source that has never reported.
pub const INITIAL_SCORE: f64 = MAX_SCORE;

pub const SUCCESS_REWARD: f64 = 5.0;
pub const TRANSIENT_PENALTY: f64 = 5.0;
pub const PERMANENT_PENALTY: f64 = 15.0;

/// Signed score change produced by one run outcome.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreStep {
    delta: f64,
}

impl ScoreStep {
    pub fn success() -> Self {
        Self {
            delta: SUCCESS_REWARD,
        }
    }

    pub fn failure(is_transient: bool) -> Self {
        let penalty = if is_transient {
            TRANSIENT_PENALTY
        } else {
            PERMANENT_PENALTY
        };
        Self { delta: -penalty }
    }

    pub fn for_outcome(outcome: &RunOutcome) -> Self {
        match outcome {
            RunOutcome::Success(_) => Self::success(),
            RunOutcome::Failed(failure) => Self::failure(failure.is_transient),
        }
    }

    pub fn delta(&self) -> f64 {
        self.delta
    }

    /// Score after applying this step to `score`.
    pub fn apply(&self, score: f64) -> f64 {
        clamp_score(score + self.delta)
    }

    /// Score of a brand-new source after its first run.
    pub fn initial(&self) -> f64 {
        self.apply(INITIAL_SCORE)
    }
}

pub fn clamp_score(score: f64) -> f64 {
    score.clamp(MIN_SCORE, MAX_SCORE)
}
