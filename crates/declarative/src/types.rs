//! Core types for tracking reconcile outcomes

use serde::{Deserialize, Serialize};

/// Lifecycle of one service within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Referenced but not started
    Pending,
    /// Reconciler is running
    InProgress,
    /// Reconciler finished without error
    Success,
    /// Reconciler returned an error
    Failed,
    /// Not attempted (e.g. unreachable)
    Skipped,
}

impl Status {
    /// Short tag used in the text report
    pub fn icon(&self) -> &'static str {
        match self {
            Self::Success => "OK",
            Self::Failed => "FAIL",
            Self::Skipped => "SKIP",
            Self::InProgress => "...",
            Self::Pending => "---",
        }
    }

    /// Whether the run is over for this service
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Skipped)
    }
}

/// Outcome of one service: status plus everything that happened to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub status: Status,
    pub changes: Vec<String>,
    pub errors: Vec<String>,
}

impl Default for ServiceRecord {
    fn default() -> Self {
        Self {
            status: Status::Pending,
            changes: Vec::new(),
            errors: Vec::new(),
        }
    }
}

/// Per-status totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub unfinished: usize,
}

impl StatusCounts {
    /// Add one record's status to the totals
    pub fn add(&mut self, status: Status) {
        match status {
            Status::Success => self.succeeded += 1,
            Status::Failed => self.failed += 1,
            Status::Skipped => self.skipped += 1,
            Status::Pending | Status::InProgress => self.unfinished += 1,
        }
    }

    /// Human-readable result line, e.g. "2 succeeded, 1 skipped"
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if self.succeeded > 0 {
            parts.push(format!("{} succeeded", self.succeeded));
        }
        if self.failed > 0 {
            parts.push(format!("{} failed", self.failed));
        }
        if self.skipped > 0 {
            parts.push(format!("{} skipped", self.skipped));
        }
        if parts.is_empty() {
            "nothing to do".to_string()
        } else {
            parts.join(", ")
        }
    }
}
