//! Events emitted by a running batch.

use serde::Serialize;
use std::path::PathBuf;

/// One observation about a batch, delivered in order on a single channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BatchEvent {
    /// A file is about to be processed
    Processing { index: usize, file_name: String },

    /// A file finished successfully. `completed` counts successes only.
    Progress {
        completed: usize,
        attempted: usize,
        total: usize,
    },

    /// A file failed; the batch continues unless it was aborted
    Failed {
        file_name: String,
        input: PathBuf,
        message: String,
    },

    /// The batch ended. Always the last event.
    Completed(BatchSummary),
}

impl BatchEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BatchEvent::Completed(_))
    }
}

/// Outcome of a whole batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Stopped early by the cancel flag
    pub cancelled: bool,
    /// Stopped early because the engine became unavailable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aborted: Option<String>,
    /// Outputs written, in processing order
    pub outputs: Vec<PathBuf>,
}

impl BatchSummary {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    /// Label used for metrics and logs.
    pub fn outcome(&self) -> &'static str {
        if self.aborted.is_some() {
            "aborted"
        } else if self.cancelled {
            "cancelled"
        } else {
            "completed"
        }
    }

    /// Every file was attempted and none failed.
    pub fn is_clean(&self) -> bool {
        self.outcome() == "completed" && self.failed == 0
    }
}
