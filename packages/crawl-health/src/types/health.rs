//! Per-source health aggregate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error_kind::ErrorKind;
use crate::recommend;
use crate::scoring::MAX_SCORE;

/// Scores at or above this are considered healthy.
pub const HEALTHY_MIN_SCORE: f64 = 80.0;

/// Scores at or above this (and below [`HEALTHY_MIN_SCORE`]) are degraded.
pub const DEGRADED_MIN_SCORE: f64 = 50.0;

/// Running health aggregate for one source, upserted on every completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceHealth {
    pub source_key: String,
    pub consecutive_failures: u32,
    pub total_crawls: u64,
    pub successful_crawls: u64,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub last_error_kind: Option<ErrorKind>,
    /// Always within `[0, 100]`.
    pub health_score: f64,
    pub updated_at: DateTime<Utc>,
}

impl SourceHealth {
    /// A source that has never reported, at full trust.
    pub fn new(source_key: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            source_key: source_key.into(),
            consecutive_failures: 0,
            total_crawls: 0,
            successful_crawls: 0,
            last_success_at: None,
            last_failure_at: None,
            last_error_kind: None,
            health_score: MAX_SCORE,
            updated_at: now,
        }
    }

    /// Fraction of crawls that succeeded, `0.0` with no history.
    pub fn success_rate(&self) -> f64 {
        if self.total_crawls == 0 {
            return 0.0;
        }
        self.successful_crawls as f64 / self.total_crawls as f64
    }

    pub fn tier(&self) -> HealthTier {
        HealthTier::of(self)
    }
}

/// Derived operational state of a source. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthTier {
    Healthy,
    Degraded,
    Unhealthy,
    /// The recommendation engine currently advises skipping the source.
    Quarantined,
}

impl HealthTier {
    pub fn of(health: &SourceHealth) -> Self {
        if recommend::skip_decision(Some(health)).skip {
            return HealthTier::Quarantined;
        }
        Self::from_score(health.health_score)
    }

    /// Score band only, ignoring quarantine.
    pub fn from_score(score: f64) -> Self {
        if score >= HEALTHY_MIN_SCORE {
            HealthTier::Healthy
        } else if score >= DEGRADED_MIN_SCORE {
            HealthTier::Degraded
        } else {
            HealthTier::Unhealthy
        }
    }
}
