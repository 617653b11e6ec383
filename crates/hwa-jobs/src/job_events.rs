use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use hwa_core::{append_line_with_rotation, current_unix_timestamp_ms, LogRotationPolicy};
use serde::Serialize;

use crate::job_record::JobRecord;

/// Lifecycle events appended to the JSONL event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobEventKind {
    Registered,
    StatusChanged,
    Reconciled,
    Removed,
}

#[derive(Debug, Clone, Serialize)]
struct JobEventRecord<'a> {
    timestamp_unix_ms: u64,
    job_id: &'a str,
    event: JobEventKind,
    status: &'a str,
    pid: u32,
    detail: &'a str,
}

/// Append-only trail of ledger mutations next to the ledger itself.
#[derive(Debug, Clone)]
pub struct JobEventLog {
    path: PathBuf,
    rotation: LogRotationPolicy,
}

impl JobEventLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            rotation: LogRotationPolicy::from_env(),
        }
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    pub fn append(&self, record: &JobRecord, event: JobEventKind, detail: &str) -> Result<()> {
        let line = serde_json::to_string(&JobEventRecord {
            timestamp_unix_ms: current_unix_timestamp_ms(),
            job_id: record.job_id.as_str(),
            event,
            status: record.status.as_str(),
            pid: record.pid,
            detail,
        })
        .context("failed to encode job event")?;
        append_line_with_rotation(&self.path, &line, self.rotation)
    }
}
