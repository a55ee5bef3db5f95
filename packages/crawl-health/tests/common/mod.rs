//! Shared fixtures for crawl health integration tests.

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use crawl_health::{EventCounts, HealthStore, HealthTracker, MemoryStore, RunId, SqliteStore};

pub fn memory_tracker() -> HealthTracker<MemoryStore> {
    HealthTracker::new(MemoryStore::new())
}

pub async fn sqlite_tracker() -> HealthTracker<SqliteStore> {
    HealthTracker::new(SqliteStore::in_memory().await.unwrap())
}

/// Record one finished successful run.
pub async fn succeed<S: HealthStore>(tracker: &HealthTracker<S>, source: &str) {
    let id = tracker.start_run(source).await.unwrap();
    tracker
        .complete_success(id, EventCounts::new(10, 2, 1))
        .await
        .unwrap();
}

/// Record one finished failed run.
pub async fn fail<S: HealthStore>(tracker: &HealthTracker<S>, source: &str, message: &str) {
    let id = tracker.start_run(source).await.unwrap();
    tracker.complete_failure(id, message).await.unwrap();
}

/// Start a run with a backdated start time.
pub async fn start_at<S: HealthStore>(
    tracker: &HealthTracker<S>,
    source: &str,
    started_at: DateTime<Utc>,
) -> RunId {
    tracker.store().insert_run(source, started_at).await.unwrap()
}
