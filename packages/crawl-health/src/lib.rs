//! Crawl Health Tracking
//!
//! Records every crawl attempt against a source, keeps a running health
//! score per source, and turns that history into advice for the crawl
//! dispatcher: how long to wait before the next attempt, whether to skip a
//! source, and how many workers to run.
//!
//! # Usage
//!
//! ```rust,ignore
//! use crawl_health::{EventCounts, HealthTracker, SqliteStore};
//!
//! let store = SqliteStore::new("sqlite://crawl_health.db").await?;
//! let tracker = HealthTracker::new(store);
//!
//! let run_id = tracker.start_run("first-avenue").await?;
//! tracker.complete_failure(run_id, "HTTP 429 Too Many Requests").await?;
//!
//! let delay = tracker.recommended_delay("first-avenue").await?;
//! let workers = tracker.recommended_workers().await?;
//! ```
//!
//! Recommendations are advisory. Nothing here schedules, retries or blocks
//! a crawl.
//!
//! # Modules
//!
//! - [`classifier`] - Error message to [`ErrorKind`] classification
//! - [`scoring`] - Health score policy
//! - [`traits`] - The [`HealthStore`] abstraction
//! - [`stores`] - Storage implementations (MemoryStore, SqliteStore, PostgresStore)
//! - [`tracker`] - [`HealthTracker`], the handle crawl tasks use
//! - [`recommend`] - Delay, skip and worker-count policy
//! - [`report`] - System-wide summary

pub mod classifier;
pub mod config;
pub mod error;
pub mod logging;
pub mod recommend;
pub mod report;
pub mod scoring;
pub mod stores;
pub mod tracker;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use classifier::{classify, ErrorClassifier, PhraseRule, PhraseTable};
pub use config::HealthConfig;
pub use error::{HealthError, Result};
pub use recommend::SkipDecision;
pub use report::{SystemSummary, TierCounts};
pub use scoring::ScoreStep;
pub use stores::MemoryStore;
pub use tracker::HealthTracker;
pub use traits::HealthStore;
pub use types::{
    ErrorKind, ErrorKindInfo, EventCounts, HealthTier, Run, RunFailure, RunId, RunOutcome,
    RunStats, RunStatus, SourceHealth,
};

#[cfg(feature = "sqlite")]
pub use stores::SqliteStore;

#[cfg(feature = "postgres")]
pub use stores::PostgresStore;
