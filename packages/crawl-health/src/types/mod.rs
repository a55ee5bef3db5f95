//! Domain types shared by the stores, tracker and recommendation engine.

pub mod error_kind;
pub mod health;
pub mod run;
pub mod stats;

pub use error_kind::{ErrorKind, ErrorKindInfo};
pub use health::{HealthTier, SourceHealth};
pub use run::{EventCounts, Run, RunFailure, RunId, RunOutcome, RunStatus};
pub use stats::RunStats;
