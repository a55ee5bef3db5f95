//! Storage trait for crawl runs and per-source health.
//!
//! A backend owns two collections: `runs` (one row per attempt) and
//! `source_health` (one row per source, upserted in place). Every mutation
//! that touches `source_health` goes through [`HealthStore::complete_run`],
//! which must be atomic per source row so concurrent completions never lose
//! updates.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::scoring::ScoreStep;
use crate::types::{Run, RunId, RunOutcome, RunStats, SourceHealth};

#[async_trait]
pub trait HealthStore: Send + Sync {
    /// Insert a `running` run and return its id.
    async fn insert_run(&self, source_key: &str, started_at: DateTime<Utc>) -> Result<RunId>;

    /// Get a run by id.
    async fn get_run(&self, run_id: RunId) -> Result<Option<Run>>;

    /// Finish a run and fold the outcome into its source's health.
    ///
    /// The run transition and the `source_health` upsert happen as one unit.
    /// Returns `None` without touching anything if the run does not exist or
    /// has already finished.
    async fn complete_run(
        &self,
        run_id: RunId,
        outcome: &RunOutcome,
        step: ScoreStep,
        completed_at: DateTime<Utc>,
    ) -> Result<Option<SourceHealth>>;

    /// Get the health aggregate for a source.
    async fn get_health(&self, source_key: &str) -> Result<Option<SourceHealth>>;

    /// All tracked sources, worst score first.
    async fn get_all_health(&self) -> Result<Vec<SourceHealth>>;

    /// Sources with at least `min_failures` consecutive failures, longest
    /// streak first.
    async fn unhealthy_sources(&self, min_failures: u32) -> Result<Vec<SourceHealth>>;

    /// Totals over runs started at or after `since`.
    async fn run_stats(&self, since: DateTime<Utc>) -> Result<RunStats>;

    /// Runs still `running` that started before `started_before`.
    async fn stale_runs(&self, started_before: DateTime<Utc>) -> Result<Vec<Run>>;

    /// Delete runs started before `cutoff`. Health rows are untouched.
    ///
    /// Returns the number of runs deleted.
    async fn delete_runs_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

#[async_trait]
impl<T: HealthStore + ?Sized> HealthStore for std::sync::Arc<T> {
    async fn insert_run(&self, source_key: &str, started_at: DateTime<Utc>) -> Result<RunId> {
        (**self).insert_run(source_key, started_at).await
    }

    async fn get_run(&self, run_id: RunId) -> Result<Option<Run>> {
        (**self).get_run(run_id).await
    }

    async fn complete_run(
        &self,
        run_id: RunId,
        outcome: &RunOutcome,
        step: ScoreStep,
        completed_at: DateTime<Utc>,
    ) -> Result<Option<SourceHealth>> {
        (**self)
            .complete_run(run_id, outcome, step, completed_at)
            .await
    }

    async fn get_health(&self, source_key: &str) -> Result<Option<SourceHealth>> {
        (**self).get_health(source_key).await
    }

    async fn get_all_health(&self) -> Result<Vec<SourceHealth>> {
        (**self).get_all_health().await
    }

    async fn unhealthy_sources(&self, min_failures: u32) -> Result<Vec<SourceHealth>> {
        (**self).unhealthy_sources(min_failures).await
    }

    async fn run_stats(&self, since: DateTime<Utc>) -> Result<RunStats> {
        (**self).run_stats(since).await
    }

    async fn stale_runs(&self, started_before: DateTime<Utc>) -> Result<Vec<Run>> {
        (**self).stale_runs(started_before).await
    }

    async fn delete_runs_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        (**self).delete_runs_before(cutoff).await
    }
}
