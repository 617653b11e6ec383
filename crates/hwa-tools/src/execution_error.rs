use std::time::Duration;

use hwa_access::PermissionResolution;
use serde_json::{json, Map, Value};
use thiserror::Error;

/// Failure modes of gated command execution and job control.
///
/// Everything except `Storage` is a recoverable outcome the caller presents;
/// `Storage` means a ledger mutation could not be persisted.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("permission denied: {}", .resolution.decision.reason())]
    Denied {
        resolution: Box<PermissionResolution>,
    },
    #[error("command is empty")]
    EmptyCommand,
    #[error("failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("process {pid} was started but could not be registered: {cause:#}")]
    Orphaned {
        pid: u32,
        command: String,
        cause: anyhow::Error,
    },
    #[error("command timed out after {} ms", .timeout.as_millis())]
    Timeout { command: String, timeout: Duration },
    #[error("failed waiting for '{command}': {source}")]
    Wait {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("job {job_id} not found")]
    JobNotFound { job_id: String },
    #[error("not permitted to signal job {job_id} (pid {pid})")]
    SignalDenied { job_id: String, pid: u32 },
    #[error("failed to signal job {job_id}: {cause:#}")]
    Signal { job_id: String, cause: anyhow::Error },
    #[error("background job limit reached ({running}/{limit} running)")]
    CapacityExceeded { running: usize, limit: usize },
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl ExecutionError {
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::Denied { .. } => "permission_denied",
            Self::EmptyCommand => "empty_command",
            Self::Spawn { .. } => "spawn_failed",
            Self::Orphaned { .. } => "orphaned_process",
            Self::Timeout { .. } => "timeout",
            Self::Wait { .. } => "wait_failed",
            Self::JobNotFound { .. } => "job_not_found",
            Self::SignalDenied { .. } => "signal_permission_denied",
            Self::Signal { .. } => "signal_failed",
            Self::CapacityExceeded { .. } => "capacity_exceeded",
            Self::Storage(_) => "storage_write_failed",
        }
    }

    /// Only a lost ledger write is a hard failure.
    pub fn is_hard_failure(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    /// Structured error payload for the tool/CLI boundary.
    pub fn to_payload(&self) -> Value {
        let mut payload = Map::new();
        payload.insert("error".to_string(), json!(format!("{self:#}")));
        payload.insert("reason_code".to_string(), json!(self.reason_code()));
        payload.insert("hard_failure".to_string(), json!(self.is_hard_failure()));
        match self {
            Self::Denied { resolution } => {
                payload.insert("permission".to_string(), json!(resolution));
            }
            Self::Spawn { command, .. } | Self::Wait { command, .. } => {
                payload.insert("command".to_string(), json!(command));
            }
            Self::Orphaned { pid, command, .. } => {
                payload.insert("pid".to_string(), json!(pid));
                payload.insert("command".to_string(), json!(command));
            }
            Self::Timeout { command, timeout } => {
                payload.insert("command".to_string(), json!(command));
                payload.insert("timeout_ms".to_string(), json!(timeout.as_millis() as u64));
            }
            Self::JobNotFound { job_id } | Self::Signal { job_id, .. } => {
                payload.insert("job_id".to_string(), json!(job_id));
            }
            Self::SignalDenied { job_id, pid } => {
                payload.insert("job_id".to_string(), json!(job_id));
                payload.insert("pid".to_string(), json!(pid));
            }
            Self::CapacityExceeded { running, limit } => {
                payload.insert("running".to_string(), json!(running));
                payload.insert("limit".to_string(), json!(limit));
            }
            Self::EmptyCommand | Self::Storage(_) => {}
        }
        Value::Object(payload)
    }
}
