use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const JOB_ID_PREFIX: &str = "job_";

/// Ledger contents keyed by `job_id`.
pub type JobLedger = BTreeMap<String, JobRecord>;

/// Error returned when a status transition would leave a terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid job status transition for {job_id}: {from} -> {to}")]
pub struct JobStatusTransitionError {
    pub job_id: String,
    pub from: JobStatus,
    pub to: JobStatus,
}

/// Lifecycle state of a tracked background process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Spawned and not yet observed to have exited.
    Running,
    /// A termination signal was delivered by an explicit stop request.
    Stopped,
    /// Exited successfully; only set by an embedder that knows the exit code.
    Completed,
    /// Exited unsuccessfully; only set by an embedder that knows the exit code.
    Failed,
    /// Observed to be gone without an exit code.
    NotFound,
}

impl JobStatus {
    pub const ALL: [JobStatus; 5] = [
        JobStatus::Running,
        JobStatus::Stopped,
        JobStatus::Completed,
        JobStatus::Failed,
        JobStatus::NotFound,
    ];

    /// Returns the stable snake_case wire representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::NotFound => "not_found",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }

    /// Only `running` may move, and only into a terminal status. Re-asserting the
    /// current status is accepted as a no-op.
    pub fn can_transition_to(self, next: Self) -> bool {
        self == next || (self == Self::Running && next.is_terminal())
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One tracked background process as persisted in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: String,
    pub pid: u32,
    pub name: String,
    pub command: String,
    pub session_id: String,
    pub status: JobStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub stopped_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    /// Builds a fresh `running` record with a newly generated id.
    pub fn new_running(pid: u32, name: &str, command: &str, session_id: &str) -> Self {
        Self {
            job_id: next_job_id(),
            pid,
            name: name.to_string(),
            command: command.to_string(),
            session_id: session_id.to_string(),
            status: JobStatus::Running,
            started_at: Utc::now(),
            stopped_at: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == JobStatus::Running
    }

    /// Applies `next` under the monotone rule, stamping `stopped_at` on the first
    /// entry into a terminal status. Returns whether the record changed.
    pub fn transition_to(
        &mut self,
        next: JobStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, JobStatusTransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(JobStatusTransitionError {
                job_id: self.job_id.clone(),
                from: self.status,
                to: next,
            });
        }
        if self.status == next {
            return Ok(false);
        }
        self.status = next;
        if self.stopped_at.is_none() {
            self.stopped_at = Some(at);
        }
        Ok(true)
    }
}

/// Generates an opaque id from 122 random bits, so ids are not reused even
/// after their record has been removed from the ledger.
pub fn next_job_id() -> String {
    format!("{JOB_ID_PREFIX}{}", uuid::Uuid::new_v4().simple())
}
