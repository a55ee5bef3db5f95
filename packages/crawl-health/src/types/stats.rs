//! Aggregated run counts over a time window.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::error_kind::ErrorKind;
use super::run::RunStatus;

/// Run totals for every run started inside a window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub total: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub running: u64,
    /// Failed runs by error kind. Kinds with no failures are absent.
    pub by_kind: BTreeMap<ErrorKind, u64>,
}

impl RunStats {
    /// Count one run into the totals.
    pub fn record(&mut self, status: RunStatus, kind: Option<ErrorKind>) {
        self.add(status, kind, 1);
    }

    /// Count `count` runs sharing a status and error kind.
    pub fn add(&mut self, status: RunStatus, kind: Option<ErrorKind>, count: u64) {
        self.total += count;
        match status {
            RunStatus::Running => self.running += count,
            RunStatus::Success => self.succeeded += count,
            RunStatus::Failed => self.failed += count,
        }
        if let Some(kind) = kind {
            *self.by_kind.entry(kind).or_insert(0) += count;
        }
    }

    pub fn count_of(&self, kind: ErrorKind) -> u64 {
        self.by_kind.get(&kind).copied().unwrap_or(0)
    }

    /// Share of all runs in the window that failed with `kind`.
    pub fn rate_of(&self, kind: ErrorKind) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.count_of(kind) as f64 / self.total as f64
    }

    /// Succeeded over finished runs, `0.0` when nothing finished.
    pub fn success_rate(&self) -> f64 {
        let finished = self.succeeded + self.failed;
        if finished == 0 {
            return 0.0;
        }
        self.succeeded as f64 / finished as f64
    }
}
