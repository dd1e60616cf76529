//! Batch execution types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use vaultline_shared::types::{ActorId, BatchRecordId};

/// Status of one job execution.
///
/// RUNNING is the only non-terminal status:
/// - Running → Completed (handler returned Ok)
/// - Running → Failed (handler error, panic, or operator abandon)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BatchStatus {
    /// Handler is executing.
    Running,
    /// Handler finished successfully.
    Completed,
    /// Handler failed; see `error_log`.
    Failed,
}

impl BatchStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }

    /// Parses a status from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "RUNNING" => Some(Self::Running),
            "COMPLETED" => Some(Self::Completed),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Returns true for COMPLETED and FAILED.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What started a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TriggerSource {
    /// Operator request.
    Manual,
    /// Configured interval.
    Timer,
}

impl TriggerSource {
    /// Returns the string representation of the source.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "MANUAL",
            Self::Timer => "TIMER",
        }
    }

    /// Parses a source from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "MANUAL" => Some(Self::Manual),
            "TIMER" => Some(Self::Timer),
            _ => None,
        }
    }
}

/// One execution of a named job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRecord {
    /// Record id.
    pub id: BatchRecordId,
    /// Job name, e.g. `Daily Accrual`.
    pub job_name: String,
    /// When the run started.
    pub start_time: DateTime<Utc>,
    /// When the run reached a terminal status.
    pub end_time: Option<DateTime<Utc>>,
    /// Current status.
    pub status: BatchStatus,
    /// Failure detail for FAILED runs.
    pub error_log: Option<String>,
    /// Operator or `system`.
    pub triggered_by: ActorId,
    /// Manual or timer.
    pub trigger: TriggerSource,
}

impl BatchRecord {
    /// A fresh RUNNING record.
    #[must_use]
    pub fn running(job_name: &str, triggered_by: ActorId, trigger: TriggerSource) -> Self {
        Self {
            id: BatchRecordId::new(),
            job_name: job_name.to_string(),
            start_time: Utc::now(),
            end_time: None,
            status: BatchStatus::Running,
            error_log: None,
            triggered_by,
            trigger,
        }
    }

    /// Marks the run COMPLETED.
    #[must_use]
    pub fn completed(mut self) -> Self {
        self.status = BatchStatus::Completed;
        self.end_time = Some(Utc::now());
        self
    }

    /// Marks the run FAILED with `error_log`.
    #[must_use]
    pub fn failed(mut self, error_log: String) -> Self {
        self.status = BatchStatus::Failed;
        self.end_time = Some(Utc::now());
        self.error_log = Some(error_log);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse() {
        assert_eq!(BatchStatus::parse("running"), Some(BatchStatus::Running));
        assert_eq!(BatchStatus::parse("FAILED"), Some(BatchStatus::Failed));
        assert_eq!(BatchStatus::parse("queued"), None);
        assert_eq!(TriggerSource::parse("timer"), Some(TriggerSource::Timer));
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!BatchStatus::Running.is_terminal());
        assert!(BatchStatus::Completed.is_terminal());
        assert!(BatchStatus::Failed.is_terminal());
    }

    #[test]
    fn test_record_transitions_set_end_time() {
        let record = BatchRecord::running("Fee Sweeper", ActorId::system(), TriggerSource::Timer);
        assert!(record.end_time.is_none());

        let done = record.clone().completed();
        assert_eq!(done.status, BatchStatus::Completed);
        assert!(done.end_time.is_some());
        assert!(done.error_log.is_none());

        let failed = record.failed("ledger timeout".into());
        assert_eq!(failed.status, BatchStatus::Failed);
        assert_eq!(failed.error_log.as_deref(), Some("ledger timeout"));
    }
}
