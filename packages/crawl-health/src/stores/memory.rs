//! In-memory storage implementation for testing and development.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::error::{HealthError, Result};
use crate::scoring::ScoreStep;
use crate::traits::store::HealthStore;
use crate::types::{Run, RunId, RunOutcome, RunStats, SourceHealth};

#[derive(Default)]
struct MemoryState {
    runs: HashMap<RunId, Run>,
    health: HashMap<String, SourceHealth>,
}

/// In-memory storage for runs and source health.
///
/// One lock guards both collections, so a completion updates its run and its
/// source row together. Data is lost on drop.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of stored runs.
    pub fn run_count(&self) -> Result<usize> {
        Ok(self.state()?.runs.len())
    }

    fn state(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| HealthError::Storage("memory store lock poisoned".into()))
    }
}

#[async_trait]
impl HealthStore for MemoryStore {
    async fn insert_run(&self, source_key: &str, started_at: DateTime<Utc>) -> Result<RunId> {
        let run = Run::started(source_key, started_at);
        let id = run.id;
        self.state()?.runs.insert(id, run);
        Ok(id)
    }

    async fn get_run(&self, run_id: RunId) -> Result<Option<Run>> {
        Ok(self.state()?.runs.get(&run_id).cloned())
    }

    async fn complete_run(
        &self,
        run_id: RunId,
        outcome: &RunOutcome,
        step: ScoreStep,
        completed_at: DateTime<Utc>,
    ) -> Result<Option<SourceHealth>> {
        let mut state = self.state()?;

        let source_key = match state.runs.get_mut(&run_id) {
            Some(run) => {
                if !run.complete(outcome, completed_at) {
                    return Ok(None);
                }
                run.source_key.clone()
            }
            None => return Ok(None),
        };

        let health = state
            .health
            .entry(source_key.clone())
            .or_insert_with(|| SourceHealth::new(source_key, completed_at));

        health.total_crawls += 1;
        health.health_score = step.apply(health.health_score);
        health.updated_at = completed_at;

        match outcome {
            RunOutcome::Success(_) => {
                health.consecutive_failures = 0;
                health.successful_crawls += 1;
                health.last_success_at = Some(completed_at);
            }
            RunOutcome::Failed(failure) => {
                health.consecutive_failures += 1;
                health.last_failure_at = Some(completed_at);
                health.last_error_kind = Some(failure.kind);
            }
        }

        Ok(Some(health.clone()))
    }

    async fn get_health(&self, source_key: &str) -> Result<Option<SourceHealth>> {
        Ok(self.state()?.health.get(source_key).cloned())
    }

    async fn get_all_health(&self) -> Result<Vec<SourceHealth>> {
        let mut all: Vec<_> = self.state()?.health.values().cloned().collect();
        all.sort_by(|a, b| {
            a.health_score
                .partial_cmp(&b.health_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.source_key.cmp(&b.source_key))
        });
        Ok(all)
    }

    async fn unhealthy_sources(&self, min_failures: u32) -> Result<Vec<SourceHealth>> {
        let mut sources: Vec<_> = self
            .state()?
            .health
            .values()
            .filter(|h| h.consecutive_failures >= min_failures)
            .cloned()
            .collect();
        sources.sort_by(|a, b| {
            b.consecutive_failures
                .cmp(&a.consecutive_failures)
                .then_with(|| a.source_key.cmp(&b.source_key))
        });
        Ok(sources)
    }

    async fn run_stats(&self, since: DateTime<Utc>) -> Result<RunStats> {
        let mut stats = RunStats::default();
        for run in self.state()?.runs.values().filter(|r| r.started_at >= since) {
            stats.record(run.status, run.error_kind);
        }
        Ok(stats)
    }

    async fn stale_runs(&self, started_before: DateTime<Utc>) -> Result<Vec<Run>> {
        let mut runs: Vec<_> = self
            .state()?
            .runs
            .values()
            .filter(|r| !r.status.is_terminal() && r.started_at < started_before)
            .cloned()
            .collect();
        runs.sort_by_key(|r| r.started_at);
        Ok(runs)
    }

    async fn delete_runs_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut state = self.state()?;
        let before = state.runs.len();
        state.runs.retain(|_, run| run.started_at >= cutoff);
        Ok((before - state.runs.len()) as u64)
    }
}
