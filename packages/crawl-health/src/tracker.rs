//! The crawl health handle.
//!
//! `HealthTracker` is what crawl tasks and the dispatcher hold. It is cheap
//! to clone and shares one store, so it can be handed to every worker:
//!
//! ```rust,ignore
//! use crawl_health::{EventCounts, HealthTracker, MemoryStore};
//!
//! let tracker = HealthTracker::new(MemoryStore::new());
//!
//! let run_id = tracker.start_run("first-avenue").await?;
//! match crawl("first-avenue").await {
//!     Ok(stats) => tracker.complete_success(run_id, stats.into()).await?,
//!     Err(e) => tracker.complete_failure(run_id, &e.to_string()).await?,
//! };
//!
//! if tracker.should_skip("first-avenue").await?.skip {
//!     // dispatcher's call
//! }
//! ```
//!
//! A returned `HealthError` means only the bookkeeping write failed; the
//! crawl already happened. Errors are logged here and handed back as-is,
//! never retried, since a blind retry could count a completion twice.

use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::classifier::ErrorClassifier;
use crate::error::{HealthError, Result};
use crate::recommend::{self, SkipDecision, ACUTE_WINDOW_SECS};
use crate::scoring::ScoreStep;
use crate::traits::store::HealthStore;
use crate::types::{ErrorKind, EventCounts, Run, RunFailure, RunId, RunOutcome, SourceHealth};

/// Shared handle over a [`HealthStore`].
pub struct HealthTracker<S> {
    store: Arc<S>,
    classifier: Arc<ErrorClassifier>,
}

impl<S> Clone for HealthTracker<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            classifier: Arc::clone(&self.classifier),
        }
    }
}

impl<S: HealthStore> HealthTracker<S> {
    /// Create a tracker with the built-in classifier.
    pub fn new(store: S) -> Self {
        Self {
            store: Arc::new(store),
            classifier: Arc::new(ErrorClassifier::new()),
        }
    }

    /// Replace the classifier.
    pub fn with_classifier(mut self, classifier: ErrorClassifier) -> Self {
        self.classifier = Arc::new(classifier);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn classifier(&self) -> &ErrorClassifier {
        &self.classifier
    }

    // ------------------------------------------------------------------
    // Run lifecycle
    // ------------------------------------------------------------------

    /// Record the start of a crawl attempt.
    pub async fn start_run(&self, source_key: &str) -> Result<RunId> {
        self.store
            .insert_run(source_key, Utc::now())
            .await
            .map_err(|e| {
                warn!(source_key, error = %e, "failed to record run start");
                e
            })
    }

    /// Record a successful crawl.
    ///
    /// Returns the updated source health, or `None` if the run is unknown or
    /// already finished.
    pub async fn complete_success(
        &self,
        run_id: RunId,
        counts: EventCounts,
    ) -> Result<Option<SourceHealth>> {
        self.complete(run_id, RunOutcome::Success(counts)).await
    }

    /// Record a failed crawl, classifying `error_message`.
    pub async fn complete_failure(
        &self,
        run_id: RunId,
        error_message: &str,
    ) -> Result<Option<SourceHealth>> {
        let kind = self.classifier.classify(error_message);
        self.complete(run_id, RunOutcome::Failed(RunFailure::new(error_message, kind)))
            .await
    }

    async fn complete(&self, run_id: RunId, outcome: RunOutcome) -> Result<Option<SourceHealth>> {
        let step = ScoreStep::for_outcome(&outcome);
        let updated = self
            .store
            .complete_run(run_id, &outcome, step, Utc::now())
            .await
            .map_err(|e| {
                warn!(%run_id, status = %outcome.status(), error = %e, "failed to record run outcome");
                e
            })?;

        match &updated {
            Some(health) => debug!(
                %run_id,
                source_key = %health.source_key,
                status = %outcome.status(),
                health_score = health.health_score,
                consecutive_failures = health.consecutive_failures,
                "run completed"
            ),
            None => debug!(%run_id, "completion ignored: run unknown or already finished"),
        }
        Ok(updated)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub async fn get_run(&self, run_id: RunId) -> Result<Option<Run>> {
        self.store.get_run(run_id).await
    }

    pub async fn get_health(&self, source_key: &str) -> Result<Option<SourceHealth>> {
        self.store.get_health(source_key).await
    }

    /// All tracked sources, worst score first.
    pub async fn get_all_health(&self) -> Result<Vec<SourceHealth>> {
        self.store.get_all_health().await
    }

    /// Sources on a failure streak of at least `min_failures`, longest first.
    pub async fn unhealthy_sources(&self, min_failures: u32) -> Result<Vec<SourceHealth>> {
        self.store.unhealthy_sources(min_failures).await
    }

    // ------------------------------------------------------------------
    // Recommendations
    // ------------------------------------------------------------------

    pub async fn recommended_delay(&self, source_key: &str) -> Result<Duration> {
        let health = self.store.get_health(source_key).await?;
        Ok(recommend::delay_for(health.as_ref()))
    }

    pub async fn should_skip(&self, source_key: &str) -> Result<SkipDecision> {
        let health = self.store.get_health(source_key).await?;
        Ok(recommend::skip_decision(health.as_ref()))
    }

    /// Suggested global crawl concurrency.
    pub async fn recommended_workers(&self) -> Result<usize> {
        let since = Utc::now() - ChronoDuration::seconds(ACUTE_WINDOW_SECS);
        let recent = self.store.run_stats(since).await?;
        let sources = self.store.get_all_health().await?;
        Ok(recommend::workers_for(&recent, &sources))
    }

    // ------------------------------------------------------------------
    // Maintenance
    // ------------------------------------------------------------------

    /// Delete runs older than `retain_days`. Source health is kept.
    ///
    /// A retention reaching past the earliest representable time deletes
    /// nothing.
    pub async fn cleanup(&self, retain_days: u32) -> Result<u64> {
        let Some(cutoff) =
            Utc::now().checked_sub_signed(ChronoDuration::days(i64::from(retain_days)))
        else {
            info!(retain_days, deleted = 0, "run retention cleanup");
            return Ok(0);
        };
        let deleted = self.store.delete_runs_before(cutoff).await?;
        info!(retain_days, deleted, "run retention cleanup");
        Ok(deleted)
    }

    /// Fail every run left `running` for longer than `max_age`.
    ///
    /// For callers that crashed between start and completion. Each stale run
    /// is recorded as a timeout, so it counts against its source like any
    /// other transient failure. Returns how many runs were closed.
    ///
    /// `max_age` must be positive; otherwise in-flight runs would be closed.
    pub async fn reconcile_stale_runs(&self, max_age: ChronoDuration) -> Result<usize> {
        if max_age <= ChronoDuration::zero() {
            return Err(HealthError::Config(format!(
                "stale run age must be positive, got {} minutes",
                max_age.num_minutes()
            )));
        }
        let Some(cutoff) = Utc::now().checked_sub_signed(max_age) else {
            return Ok(0);
        };

        let stale = self.store.stale_runs(cutoff).await?;
        let message = format!(
            "run abandoned: timed out after {} minutes without completion",
            max_age.num_minutes()
        );

        let mut closed = 0;
        for run in stale {
            let outcome = RunOutcome::Failed(RunFailure::new(&message, ErrorKind::Timeout));
            if self.complete(run.id, outcome).await?.is_some() {
                closed += 1;
            }
        }

        info!(closed, max_age_minutes = max_age.num_minutes(), "stale run reconciliation");
        Ok(closed)
    }
}
