use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;

use crate::job_events::{JobEventKind, JobEventLog};
use crate::job_record::{JobLedger, JobRecord, JobStatus};
use crate::job_store::JobStore;
use hwa_core::lock_unpoisoned;
use crate::process_probe::ProcessProbe;

/// Outcome of `update_status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusChange {
    /// No record carries this id.
    Unknown,
    /// The record moved to the requested status and was persisted.
    Applied(JobRecord),
    /// The record already had the status, or the move would leave a terminal
    /// status; the record is returned as stored.
    Unchanged(JobRecord),
}

impl StatusChange {
    pub fn record(&self) -> Option<&JobRecord> {
        match self {
            Self::Unknown => None,
            Self::Applied(record) | Self::Unchanged(record) => Some(record),
        }
    }
}

/// A record paired with the liveness observed while answering a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobSnapshot {
    #[serde(flatten)]
    pub record: JobRecord,
    pub is_running: bool,
}

/// Reconciled view of the whole ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobListing {
    pub jobs: Vec<JobSnapshot>,
    pub total: usize,
    pub running: usize,
}

/// Domain API over a `JobStore`.
///
/// Every mutation runs as one locked load-mutate-save cycle, so concurrent
/// registrants never lose each other's writes and each writer sees every
/// previously completed write.
pub struct JobRegistry {
    store: Arc<dyn JobStore>,
    probe: Arc<dyn ProcessProbe>,
    events: Option<JobEventLog>,
    write_guard: Mutex<()>,
}

impl std::fmt::Debug for JobRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRegistry")
            .field("store", &self.store.describe())
            .field("events", &self.events)
            .finish()
    }
}

impl JobRegistry {
    pub fn new(store: Arc<dyn JobStore>, probe: Arc<dyn ProcessProbe>) -> Self {
        Self {
            store,
            probe,
            events: None,
            write_guard: Mutex::new(()),
        }
    }

    pub fn with_event_log(mut self, events: JobEventLog) -> Self {
        self.events = Some(events);
        self
    }

    /// Records a freshly spawned process as `running` and returns its new id.
    pub fn register(&self, pid: u32, name: &str, command: &str, session_id: &str) -> Result<String> {
        let record = self.mutate(|ledger| {
            let mut record = JobRecord::new_running(pid, name, command, session_id);
            while ledger.contains_key(&record.job_id) {
                record = JobRecord::new_running(pid, name, command, session_id);
            }
            ledger.insert(record.job_id.clone(), record.clone());
            (record, true)
        })?;
        tracing::info!(
            job_id = %record.job_id,
            pid,
            name,
            session_id,
            "registered background job"
        );
        self.emit(&record, JobEventKind::Registered, &format!("pid {pid}"));
        Ok(record.job_id)
    }

    pub fn get(&self, job_id: &str) -> Option<JobRecord> {
        self.store.load().remove(job_id)
    }

    /// All records, oldest first.
    pub fn list(&self) -> Vec<JobRecord> {
        let mut jobs: Vec<JobRecord> = self.store.load().into_values().collect();
        jobs.sort_by(|left, right| {
            left.started_at
                .cmp(&right.started_at)
                .then_with(|| left.job_id.cmp(&right.job_id))
        });
        jobs
    }

    /// Applies the monotone transition rule; unknown ids are a no-op.
    pub fn update_status(&self, job_id: &str, status: JobStatus) -> Result<StatusChange> {
        let change = self.transition(job_id, status, false)?;
        if let StatusChange::Applied(record) = &change {
            self.emit(record, JobEventKind::StatusChanged, "status updated");
        }
        Ok(change)
    }

    /// Drops the record; the OS process, if any, is left untouched.
    pub fn remove(&self, job_id: &str) -> Result<bool> {
        let removed = self.mutate(|ledger| {
            let removed = ledger.remove(job_id);
            let dirty = removed.is_some();
            (removed, dirty)
        })?;
        match removed {
            Some(record) => {
                tracing::info!(job_id, pid = record.pid, status = %record.status, "removed job from ledger");
                self.emit(&record, JobEventKind::Removed, "removed from ledger");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Probes the record's pid. A dead process whose record still says
    /// `running` becomes `not_found`: without an exit code the registry never
    /// guesses `completed` or `failed`, and only an explicit stop sets `stopped`.
    pub fn refresh_liveness(&self, record: &JobRecord) -> Result<bool> {
        let alive = self.probe.is_alive(record.pid);
        if alive || !record.is_running() {
            return Ok(alive);
        }
        if let StatusChange::Applied(updated) =
            self.transition(&record.job_id, JobStatus::NotFound, true)?
        {
            tracing::info!(
                job_id = %updated.job_id,
                pid = updated.pid,
                "background job no longer running; marked not_found"
            );
            self.emit(&updated, JobEventKind::Reconciled, "process exited unobserved");
        }
        Ok(false)
    }

    /// Looks up one record after reconciling its liveness.
    pub fn get_refreshed(&self, job_id: &str) -> Result<Option<JobSnapshot>> {
        let Some(record) = self.get(job_id) else {
            return Ok(None);
        };
        let is_running = self.observe_running(&record)?;
        let record = self.get(job_id).unwrap_or(record);
        Ok(Some(JobSnapshot { record, is_running }))
    }

    /// Reconciles every `running` record, then returns the listing with counters.
    pub fn list_refreshed(&self) -> Result<JobListing> {
        let mut alive = std::collections::BTreeMap::new();
        for record in self.list() {
            alive.insert(record.job_id.clone(), self.observe_running(&record)?);
        }
        let jobs: Vec<JobSnapshot> = self
            .list()
            .into_iter()
            .map(|record| {
                let is_running = alive.get(&record.job_id).copied().unwrap_or(false);
                JobSnapshot { record, is_running }
            })
            .collect();
        let running = jobs.iter().filter(|job| job.is_running).count();
        Ok(JobListing {
            total: jobs.len(),
            running,
            jobs,
        })
    }

    /// Number of `running` records after reconciliation.
    pub fn running_count(&self) -> Result<usize> {
        let mut running = 0;
        for record in self.list() {
            if self.observe_running(&record)? {
                running += 1;
            }
        }
        Ok(running)
    }

    /// Terminal records are never probed: their pid may already belong to an
    /// unrelated process.
    fn observe_running(&self, record: &JobRecord) -> Result<bool> {
        if !record.is_running() {
            return Ok(false);
        }
        self.refresh_liveness(record)
    }

    /// A rejected reconciliation only means another writer got there first.
    fn transition(
        &self,
        job_id: &str,
        status: JobStatus,
        reconciling: bool,
    ) -> Result<StatusChange> {
        self.mutate(|ledger| {
            let Some(record) = ledger.get_mut(job_id) else {
                return (StatusChange::Unknown, false);
            };
            match record.transition_to(status, Utc::now()) {
                Ok(true) => (StatusChange::Applied(record.clone()), true),
                Ok(false) => (StatusChange::Unchanged(record.clone()), false),
                Err(error) if reconciling => {
                    tracing::debug!(%error, "job changed status before reconciliation");
                    (StatusChange::Unchanged(record.clone()), false)
                }
                Err(error) => {
                    tracing::warn!(%error, "ignoring job status transition");
                    (StatusChange::Unchanged(record.clone()), false)
                }
            }
        })
    }

    fn mutate<R>(&self, mutation: impl FnOnce(&mut JobLedger) -> (R, bool)) -> Result<R> {
        let _in_process = lock_unpoisoned(&self.write_guard);
        let _store_lock = self.store.lock()?;
        let mut ledger = self.store.load();
        let (result, dirty) = mutation(&mut ledger);
        if dirty {
            self.store.save(&ledger)?;
        }
        Ok(result)
    }

    fn emit(&self, record: &JobRecord, event: JobEventKind, detail: &str) {
        let Some(events) = self.events.as_ref() else {
            return;
        };
        if let Err(error) = events.append(record, event, detail) {
            tracing::warn!(
                path = %events.path().display(),
                job_id = %record.job_id,
                error = %format!("{error:#}"),
                "failed to append job event"
            );
        }
    }
}
