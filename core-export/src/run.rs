//! # Sync Run Records
//!
//! One `SyncRun` describes one pipeline execution for one target at one
//! point in time. Runs are ephemeral: they exist for the duration of a
//! cycle and are reported through events, never persisted.

use uuid::Uuid;

/// Outcome of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// A non-empty row set was fetched, serialized, and uploaded.
    Uploaded,
    /// The fetch returned no data rows; nothing downstream ran.
    SkippedEmpty,
    /// A pipeline step failed.
    Failed(String),
}

/// The record of one pipeline execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRun {
    /// Correlates this run across log and event output.
    pub run_id: Uuid,
    /// Target name.
    pub target: String,
    /// The query that was (or would have been) executed.
    pub resolved_query: String,
    /// Number of data rows fetched.
    pub row_count: u64,
    /// Resolved destination folder, when resolution happened.
    pub destination_folder_id: Option<String>,
    /// How the run ended.
    pub outcome: RunOutcome,
}

impl SyncRun {
    pub fn is_uploaded(&self) -> bool {
        matches!(self.outcome, RunOutcome::Uploaded)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, RunOutcome::Failed(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.outcome, RunOutcome::SkippedEmpty)
    }
}
