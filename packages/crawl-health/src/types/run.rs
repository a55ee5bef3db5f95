//! Crawl attempts and their outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::error_kind::ErrorKind;

/// Stored error messages are cut to this many characters.
pub const MAX_ERROR_MESSAGE_CHARS: usize = 500;

/// Identifier of a single crawl attempt.
///
/// Backed by a v7 UUID so ids sort in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Success,
    Failed,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Success => "success",
            RunStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(RunStatus::Running),
            "success" => Ok(RunStatus::Success),
            "failed" => Ok(RunStatus::Failed),
            other => Err(format!("unknown run status: {}", other)),
        }
    }
}

/// Event counts reported by a successful crawl.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCounts {
    pub found: u32,
    pub new: u32,
    pub updated: u32,
}

impl EventCounts {
    pub fn new(found: u32, new: u32, updated: u32) -> Self {
        Self {
            found,
            new,
            updated,
        }
    }
}

/// A classified failure, ready to be persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFailure {
    /// Already truncated to [`MAX_ERROR_MESSAGE_CHARS`].
    pub message: String,
    pub kind: ErrorKind,
    pub is_transient: bool,
}

impl RunFailure {
    pub fn new(message: &str, kind: ErrorKind) -> Self {
        Self {
            message: truncate_error_message(message),
            kind,
            is_transient: kind.is_transient(),
        }
    }
}

/// Terminal outcome of a crawl attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Success(EventCounts),
    Failed(RunFailure),
}

impl RunOutcome {
    pub fn status(&self) -> RunStatus {
        match self {
            RunOutcome::Success(_) => RunStatus::Success,
            RunOutcome::Failed(_) => RunStatus::Failed,
        }
    }
}

/// One crawl attempt against a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub id: RunId,
    pub source_key: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Seconds between `started_at` and `completed_at`.
    pub duration_secs: Option<f64>,
    pub status: RunStatus,
    pub events_found: u32,
    pub events_new: u32,
    pub events_updated: u32,
    pub error_message: Option<String>,
    pub error_kind: Option<ErrorKind>,
    pub is_transient: Option<bool>,
}

impl Run {
    /// A freshly started attempt.
    pub fn started(source_key: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            id: RunId::new(),
            source_key: source_key.into(),
            started_at,
            completed_at: None,
            duration_secs: None,
            status: RunStatus::Running,
            events_found: 0,
            events_new: 0,
            events_updated: 0,
            error_message: None,
            error_kind: None,
            is_transient: None,
        }
    }

    /// Apply a terminal outcome.
    ///
    /// Returns `false` and leaves the run untouched if it already finished.
    pub fn complete(&mut self, outcome: &RunOutcome, completed_at: DateTime<Utc>) -> bool {
        if self.status.is_terminal() {
            return false;
        }

        self.completed_at = Some(completed_at);
        self.duration_secs = Some(duration_secs(self.started_at, completed_at));
        self.status = outcome.status();

        match outcome {
            RunOutcome::Success(counts) => {
                self.events_found = counts.found;
                self.events_new = counts.new;
                self.events_updated = counts.updated;
            }
            RunOutcome::Failed(failure) => {
                self.error_message = Some(failure.message.clone());
                self.error_kind = Some(failure.kind);
                self.is_transient = Some(failure.is_transient);
            }
        }
        true
    }
}

/// Elapsed seconds, never negative.
pub fn duration_secs(started_at: DateTime<Utc>, completed_at: DateTime<Utc>) -> f64 {
    let micros = (completed_at - started_at).num_microseconds().unwrap_or(0);
    (micros.max(0) as f64) / 1_000_000.0
}

/// Cut an error message to [`MAX_ERROR_MESSAGE_CHARS`] on a char boundary.
pub fn truncate_error_message(message: &str) -> String {
    match message.char_indices().nth(MAX_ERROR_MESSAGE_CHARS) {
        Some((idx, _)) => message[..idx].to_string(),
        None => message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let long = "é".repeat(MAX_ERROR_MESSAGE_CHARS + 20);
        let truncated = truncate_error_message(&long);
        assert_eq!(truncated.chars().count(), MAX_ERROR_MESSAGE_CHARS);

        assert_eq!(truncate_error_message("short"), "short");
    }

    #[test]
    fn test_run_completes_once() {
        let start = Utc::now();
        let mut run = Run::started("venue-a", start);

        let done = run.complete(
            &RunOutcome::Success(EventCounts::new(10, 3, 2)),
            start + Duration::seconds(4),
        );
        assert!(done);
        assert_eq!(run.status, RunStatus::Success);
        assert_eq!(run.events_found, 10);
        assert_eq!(run.duration_secs, Some(4.0));

        let again = run.complete(
            &RunOutcome::Failed(RunFailure::new("boom", ErrorKind::Unknown)),
            start + Duration::seconds(9),
        );
        assert!(!again);
        assert_eq!(run.status, RunStatus::Success);
        assert!(run.error_kind.is_none());
    }

    #[test]
    fn test_failure_carries_transience() {
        let failure = RunFailure::new("timed out", ErrorKind::Timeout);
        assert!(failure.is_transient);

        let failure = RunFailure::new("selector missing", ErrorKind::Parse);
        assert!(!failure.is_transient);
    }

    #[test]
    fn test_run_id_round_trips_through_str() {
        let id = RunId::new();
        assert_eq!(id.to_string().parse::<RunId>().unwrap(), id);
    }
}
