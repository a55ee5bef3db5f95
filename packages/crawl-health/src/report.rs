//! System-wide summary for dashboards and the operator CLI.
//!
//! Nothing here is stored. Every field is derived from the run log, the
//! source health table and [`HealthTracker::recommended_workers`] at call time.

use chrono::{DateTime, NaiveTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::Result;
use crate::traits::store::HealthStore;
use crate::tracker::HealthTracker;
use crate::types::{ErrorKind, HealthTier, RunStats, SourceHealth};

/// How many tracked sources sit in each score band.
///
/// `healthy`, `degraded` and `unhealthy` partition all sources by score.
/// `quarantined` counts sources currently advised to skip; they are also
/// counted in their band.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TierCounts {
    pub healthy: usize,
    pub degraded: usize,
    pub unhealthy: usize,
    pub quarantined: usize,
}

impl TierCounts {
    pub fn tally(sources: &[SourceHealth]) -> Self {
        let mut counts = Self::default();
        for health in sources {
            match HealthTier::from_score(health.health_score) {
                HealthTier::Healthy => counts.healthy += 1,
                HealthTier::Degraded => counts.degraded += 1,
                _ => counts.unhealthy += 1,
            }
            if health.tier() == HealthTier::Quarantined {
                counts.quarantined += 1;
            }
        }
        counts
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemSummary {
    pub generated_at: DateTime<Utc>,
    /// Start of the current UTC day; `today` covers runs started since.
    pub day_start: DateTime<Utc>,
    pub today: RunStats,
    pub success_rate: f64,
    pub errors_by_kind: BTreeMap<ErrorKind, u64>,
    pub tracked_sources: usize,
    pub tiers: TierCounts,
    pub recommended_workers: usize,
}

impl SystemSummary {
    pub fn build(
        generated_at: DateTime<Utc>,
        day_start: DateTime<Utc>,
        today: RunStats,
        sources: &[SourceHealth],
        recommended_workers: usize,
    ) -> Self {
        Self {
            generated_at,
            day_start,
            success_rate: today.success_rate(),
            errors_by_kind: today.by_kind.clone(),
            today,
            tracked_sources: sources.len(),
            tiers: TierCounts::tally(sources),
            recommended_workers,
        }
    }
}

/// Midnight UTC of the day containing `now`.
pub fn day_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_time(NaiveTime::MIN).and_utc()
}

impl<S: HealthStore> HealthTracker<S> {
    pub async fn system_summary(&self) -> Result<SystemSummary> {
        let now = Utc::now();
        let day_start = day_start(now);

        let today = self.store().run_stats(day_start).await?;
        let sources = self.store().get_all_health().await?;

        let workers = self.recommended_workers().await?;

        Ok(SystemSummary::build(now, day_start, today, &sources, workers))
    }
}
