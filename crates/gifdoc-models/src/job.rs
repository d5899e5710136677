//! Job records for the in-process runner.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::diagnostics::StepWarning;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Job lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Job accepted, waiting for a worker slot
    #[default]
    Queued,
    /// Job is being processed
    Running,
    /// Job completed successfully (possibly with per-step warnings)
    Done,
    /// Job aborted with a fatal error
    Failed,
    /// Job cancelled by the caller
    Cancelled,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Running => "running",
            JobState::Done => "done",
            JobState::Failed => "failed",
            JobState::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Done | JobState::Failed | JobState::Cancelled)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Snapshot of one job's progress, published to subscribers on every
/// transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    /// Unique job ID
    pub id: JobId,

    /// Current state
    #[serde(default)]
    pub state: JobState,

    /// Progress (0-100)
    #[serde(default)]
    pub progress: u8,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Started at timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    /// Completed at timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    /// Terminal failure reason (fatal errors only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Accumulated per-step warnings (soft failures)
    #[serde(default)]
    pub warnings: Vec<StepWarning>,
}

impl JobRecord {
    /// Create a fresh queued record.
    pub fn new(id: JobId) -> Self {
        Self {
            id,
            state: JobState::Queued,
            progress: 0,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error_message: None,
            warnings: Vec::new(),
        }
    }

    /// Start processing the job.
    pub fn start(mut self) -> Self {
        self.state = JobState::Running;
        self.started_at = Some(Utc::now());
        self
    }

    /// Mark the job as done. Warnings do not change the state.
    pub fn complete(mut self) -> Self {
        self.state = JobState::Done;
        self.completed_at = Some(Utc::now());
        self.progress = 100;
        self
    }

    /// Mark the job as failed with a terminal reason.
    pub fn fail(mut self, error: impl Into<String>) -> Self {
        self.state = JobState::Failed;
        self.error_message = Some(error.into());
        self.completed_at = Some(Utc::now());
        self
    }

    /// Mark the job as cancelled.
    pub fn cancel(mut self) -> Self {
        self.state = JobState::Cancelled;
        self.completed_at = Some(Utc::now());
        self
    }

    /// Update progress.
    pub fn with_progress(mut self, progress: u8) -> Self {
        self.progress = progress.min(100);
        self
    }

    /// Attach a warning.
    pub fn with_warning(mut self, warning: StepWarning) -> Self {
        self.warnings.push(warning);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::WarningKind;

    #[test]
    fn test_state_transitions() {
        let record = JobRecord::new(JobId::new());
        assert_eq!(record.state, JobState::Queued);

        let started = record.start();
        assert_eq!(started.state, JobState::Running);
        assert!(started.started_at.is_some());

        let done = started.complete();
        assert_eq!(done.state, JobState::Done);
        assert_eq!(done.progress, 100);
        assert!(done.state.is_terminal());
    }

    #[test]
    fn test_fail_keeps_reason() {
        let record = JobRecord::new(JobId::new()).start().fail("unreadable media");
        assert_eq!(record.state, JobState::Failed);
        assert_eq!(record.error_message.as_deref(), Some("unreadable media"));
    }

    #[test]
    fn test_warnings_do_not_change_state() {
        let record = JobRecord::new(JobId::new())
            .start()
            .with_warning(StepWarning::new(0, WarningKind::EncoderFailed, "boom"))
            .complete();
        assert_eq!(record.state, JobState::Done);
        assert_eq!(record.warnings.len(), 1);
    }
}
