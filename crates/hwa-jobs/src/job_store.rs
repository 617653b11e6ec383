use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use hwa_core::{write_text_atomic, FileLock};
use serde_json::Value;

use crate::job_record::{JobLedger, JobRecord};

pub const DEFAULT_LEDGER_FILE: &str = ".job_registry.json";
const LOCK_FILE_SUFFIX: &str = ".lock";

/// Held for the duration of one read-modify-write cycle on a store.
#[derive(Debug)]
pub struct StoreLock {
    _file: Option<FileLock>,
}

impl StoreLock {
    /// A lock that only relies on the caller's in-process serialization.
    pub fn in_process() -> Self {
        Self { _file: None }
    }

    fn file(lock: FileLock) -> Self {
        Self { _file: Some(lock) }
    }
}

/// Durable mapping of `job_id` to record.
///
/// `load` is best-effort and never fails: a missing or unreadable ledger reads
/// as empty. `save` failures are real errors and must reach the caller.
pub trait JobStore: Send + Sync {
    fn load(&self) -> JobLedger;
    fn save(&self, ledger: &JobLedger) -> Result<()>;
    /// Excludes other writers, including other processes sharing the ledger,
    /// until the returned guard is dropped.
    fn lock(&self) -> Result<StoreLock>;
    fn describe(&self) -> String;
}

/// Ledger persisted as one pretty-printed JSON object, replaced atomically on
/// every save and guarded by an advisory lock on `<ledger>.lock`.
#[derive(Debug, Clone)]
pub struct FileJobStore {
    path: PathBuf,
    lock_path: PathBuf,
}

impl FileJobStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let lock_path = PathBuf::from(format!("{}{LOCK_FILE_SUFFIX}", path.display()));
        Self { path, lock_path }
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    pub fn lock_path(&self) -> &Path {
        self.lock_path.as_path()
    }
}

impl JobStore for FileJobStore {
    fn load(&self) -> JobLedger {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return JobLedger::new()
            }
            Err(error) => {
                tracing::warn!(path = %self.path.display(), %error, "job ledger unreadable; treating as empty");
                return JobLedger::new();
            }
        };
        parse_ledger(&raw, &self.path)
    }

    fn save(&self, ledger: &JobLedger) -> Result<()> {
        let mut payload =
            serde_json::to_string_pretty(ledger).context("failed to encode job ledger")?;
        payload.push('\n');
        write_text_atomic(&self.path, &payload)
            .with_context(|| format!("failed to write {}", self.path.display()))
    }

    fn lock(&self) -> Result<StoreLock> {
        FileLock::acquire_exclusive(&self.lock_path).map(StoreLock::file)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Decodes ledger text. A non-object document reads as empty; individual
/// entries that fail to decode, or whose key disagrees with their `job_id`,
/// are dropped so one bad record cannot hide the rest.
fn parse_ledger(raw: &str, path: &Path) -> JobLedger {
    if raw.trim().is_empty() {
        return JobLedger::new();
    }
    let entries = match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(entries)) => entries,
        Ok(_) => {
            tracing::warn!(path = %path.display(), "job ledger is not a JSON object; treating as empty");
            return JobLedger::new();
        }
        Err(error) => {
            tracing::warn!(path = %path.display(), %error, "job ledger is corrupt; treating as empty");
            return JobLedger::new();
        }
    };

    let mut ledger = JobLedger::new();
    for (key, value) in entries {
        match serde_json::from_value::<JobRecord>(value) {
            Ok(record) if record.job_id == key => {
                ledger.insert(key, record);
            }
            Ok(record) => {
                tracing::warn!(
                    key = %key,
                    job_id = %record.job_id,
                    "dropping ledger entry whose key does not match its job_id"
                );
            }
            Err(error) => {
                tracing::warn!(key = %key, %error, "dropping undecodable ledger entry");
            }
        }
    }
    ledger
}

/// Ledger kept in process memory; for tests and embedders that never share it.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    ledger: Mutex<JobLedger>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl JobStore for MemoryJobStore {
    fn load(&self) -> JobLedger {
        hwa_core::lock_unpoisoned(&self.ledger).clone()
    }

    fn save(&self, ledger: &JobLedger) -> Result<()> {
        *hwa_core::lock_unpoisoned(&self.ledger) = ledger.clone();
        Ok(())
    }

    fn lock(&self) -> Result<StoreLock> {
        Ok(StoreLock::in_process())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
