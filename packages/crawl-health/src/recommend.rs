//! Recommendation engine.
//!
//! Pure derivations over current health state. Everything here is advisory:
//! callers decide whether to honour a skip or a delay. Unknown sources get
//! permissive defaults.
//!
//! The thresholds are tuned operational constants, kept here by name.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::types::{ErrorKind, RunStats, SourceHealth};

/// Delay staircase on consecutive failures: `(min_failures, seconds)`,
/// highest step first.
pub const DELAY_STEPS: [(u32, u64); 3] = [(5, 10), (3, 5), (1, 2)];

/// Delay with no recent failures, or for an unknown source.
pub const BASE_DELAY_SECS: u64 = 1;

/// Sources scoring below this are skipped outright.
pub const QUARANTINE_SCORE: f64 = 10.0;

/// Failure streak at which non-transient failures trigger a skip.
pub const SKIP_STREAK: u32 = 5;

/// Last-error kinds whose streaks are never auto-skipped.
pub const STREAK_EXEMPT_KINDS: [ErrorKind; 3] =
    [ErrorKind::Socket, ErrorKind::Network, ErrorKind::Timeout];

/// Window for the acute overload check, in seconds.
pub const ACUTE_WINDOW_SECS: i64 = 3600;

/// Runs needed inside the window before the acute check applies.
pub const ACUTE_MIN_RUNS: u64 = 10;

/// Socket-error rate tiers: `(rate strictly above, workers)`, worst first.
pub const SOCKET_RATE_TIERS: [(f64, usize); 3] = [(0.2, 1), (0.1, 2), (0.05, 3)];

/// Worker count when no source has reported yet.
pub const DEFAULT_WORKERS: usize = 2;

/// Average-score tiers: `(score strictly below, workers)`, worst first.
pub const AVERAGE_SCORE_TIERS: [(f64, usize); 2] = [(50.0, 2), (70.0, 3)];

/// Worker count when the fleet is healthy.
pub const MAX_WORKERS: usize = 4;

/// Advice on whether to crawl a source now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipDecision {
    pub skip: bool,
    /// Empty when `skip` is false.
    pub reason: String,
}

impl SkipDecision {
    pub fn allow() -> Self {
        Self {
            skip: false,
            reason: String::new(),
        }
    }

    pub fn skip(reason: impl Into<String>) -> Self {
        Self {
            skip: true,
            reason: reason.into(),
        }
    }
}

/// Retry delay before the next attempt against a source.
pub fn delay_for(health: Option<&SourceHealth>) -> Duration {
    let failures = health.map(|h| h.consecutive_failures).unwrap_or(0);
    let secs = DELAY_STEPS
        .iter()
        .find(|(min, _)| failures >= *min)
        .map(|(_, secs)| *secs)
        .unwrap_or(BASE_DELAY_SECS);
    Duration::from_secs(secs)
}

/// Whether a source should be skipped, and why.
pub fn skip_decision(health: Option<&SourceHealth>) -> SkipDecision {
    let Some(health) = health else {
        return SkipDecision::allow();
    };

    if health.health_score < QUARANTINE_SCORE {
        return SkipDecision::skip(format!("health_score={:.2}", health.health_score));
    }

    if health.consecutive_failures >= SKIP_STREAK {
        let exempt = health
            .last_error_kind
            .map(|kind| STREAK_EXEMPT_KINDS.contains(&kind))
            .unwrap_or(false);
        if !exempt {
            return SkipDecision::skip(format!(
                "consecutive_failures={}",
                health.consecutive_failures
            ));
        }
    }

    SkipDecision::allow()
}

/// Acute stage: a high socket-error share in the recent window.
///
/// Returns `None` when the window is too quiet or the rate is acceptable.
pub fn acute_workers(recent: &RunStats) -> Option<usize> {
    if recent.total <= ACUTE_MIN_RUNS {
        return None;
    }
    let socket_rate = recent.rate_of(ErrorKind::Socket);
    SOCKET_RATE_TIERS
        .iter()
        .find(|(threshold, _)| socket_rate > *threshold)
        .map(|(_, workers)| *workers)
}

/// Chronic stage: average health across all tracked sources.
pub fn chronic_workers(sources: &[SourceHealth]) -> usize {
    if sources.is_empty() {
        return DEFAULT_WORKERS;
    }
    let average =
        sources.iter().map(|h| h.health_score).sum::<f64>() / sources.len() as f64;
    AVERAGE_SCORE_TIERS
        .iter()
        .find(|(below, _)| average < *below)
        .map(|(_, workers)| *workers)
        .unwrap_or(MAX_WORKERS)
}

/// Global worker count. The acute stage overrides the chronic one.
pub fn workers_for(recent: &RunStats, sources: &[SourceHealth]) -> usize {
    acute_workers(recent).unwrap_or_else(|| chronic_workers(sources))
}
