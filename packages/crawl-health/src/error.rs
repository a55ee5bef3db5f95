//! Typed errors for the crawl health library.
//!
//! These cover bookkeeping only. A `HealthError` means the outcome of a
//! crawl could not be recorded; it never describes the crawl itself.

use thiserror::Error;

/// Errors that can occur while tracking crawl health.
#[derive(Debug, Error)]
pub enum HealthError {
    /// Storage backend unavailable or a query failed
    #[error("storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Schema setup failed while opening a store
    #[error("schema setup failed: {0}")]
    Migration(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A persisted row could not be mapped back into a domain type
    #[error("invalid stored row: {reason}")]
    InvalidRow { reason: String },

    /// Classifier phrase data is malformed
    #[error("invalid phrase table: {reason}")]
    PhraseTable { reason: String },

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl HealthError {
    pub(crate) fn storage(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        HealthError::Storage(Box::new(err))
    }

    pub(crate) fn invalid_row(reason: impl Into<String>) -> Self {
        HealthError::InvalidRow {
            reason: reason.into(),
        }
    }
}

#[cfg(any(feature = "sqlite", feature = "postgres"))]
impl From<sqlx::Error> for HealthError {
    fn from(err: sqlx::Error) -> Self {
        HealthError::storage(err)
    }
}

/// Result type alias for health tracking operations.
pub type Result<T> = std::result::Result<T, HealthError>;
