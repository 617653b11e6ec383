//! Foreground and detached execution of shell commands.

use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use hwa_core::lock_unpoisoned;
use hwa_jobs::{
    JobRecord, JobRegistry, JobStatus, ProcessControl, SignalOutcome, SignalScope,
    TerminationSignal,
};
use serde::Serialize;
use tokio::process::Command;
use tokio::time::timeout;

use crate::execution_error::ExecutionError;

pub const DEFAULT_SHELL: &str = "sh";
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 16_000;
pub const DEFAULT_MAX_BACKGROUND_JOBS: usize = 10;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
const OUTPUT_TRUNCATED_MARKER: &str = "<output truncated>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Interpreter invoked as `<shell> -c <command>`.
    pub shell: String,
    pub max_output_bytes: usize,
    pub max_background_jobs: usize,
    pub default_timeout: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            shell: DEFAULT_SHELL.to_string(),
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            max_background_jobs: DEFAULT_MAX_BACKGROUND_JOBS,
            default_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForegroundOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was ended by a signal.
    pub return_code: Option<i32>,
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackgroundLaunch {
    pub job_id: String,
    pub pid: u32,
}

/// Result of a stop request on a known job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    /// A termination signal was delivered; the record is now `stopped`.
    Stopped(JobRecord),
    /// The process no longer existed; the record reflects reconciliation.
    AlreadyGone(JobRecord),
}

impl StopOutcome {
    pub fn record(&self) -> &JobRecord {
        match self {
            Self::Stopped(record) | Self::AlreadyGone(record) => record,
        }
    }
}

pub struct CommandExecutor {
    registry: Arc<JobRegistry>,
    control: Arc<dyn ProcessControl>,
    config: ExecutorConfig,
    /// Held from the capacity check until the new job is in the ledger.
    launch_guard: Mutex<()>,
}

impl std::fmt::Debug for CommandExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandExecutor")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl CommandExecutor {
    pub fn new(
        registry: Arc<JobRegistry>,
        control: Arc<dyn ProcessControl>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            registry,
            control,
            config,
            launch_guard: Mutex::new(()),
        }
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Runs to completion or to the deadline. On timeout the command's whole
    /// process group is killed before the error is returned.
    pub async fn run_foreground(
        &self,
        command: &str,
        timeout_override: Option<Duration>,
    ) -> Result<ForegroundOutput, ExecutionError> {
        let command = non_empty_command(command)?;
        let deadline = timeout_override
            .unwrap_or(self.config.default_timeout)
            .max(Duration::from_millis(1));

        let mut builder = self.shell_command(command);
        builder
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        builder.process_group(0);

        let child = builder.spawn().map_err(|source| ExecutionError::Spawn {
            command: command.to_string(),
            source,
        })?;
        let pid = child.id();
        tracing::debug!(command, pid = ?pid, "foreground command started");

        let output = match timeout(deadline, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => {
                return Err(ExecutionError::Wait {
                    command: command.to_string(),
                    source,
                })
            }
            Err(_) => {
                if let Some(pid) = pid {
                    self.kill_timed_out_group(pid);
                }
                tracing::warn!(command, timeout_ms = deadline.as_millis() as u64, "foreground command timed out");
                return Err(ExecutionError::Timeout {
                    command: command.to_string(),
                    timeout: deadline,
                });
            }
        };

        let limit = self.config.max_output_bytes;
        Ok(ForegroundOutput {
            stdout: truncate_bytes(&String::from_utf8_lossy(&output.stdout), limit),
            stderr: truncate_bytes(&String::from_utf8_lossy(&output.stderr), limit),
            return_code: output.status.code(),
            success: output.status.success(),
        })
    }

    /// Starts the command in its own session with null stdio and registers it.
    /// Returns once the process exists and is in the ledger.
    ///
    /// Launches through one executor are serialized, so concurrent callers
    /// cannot overshoot `max_background_jobs`. Executors in other processes
    /// sharing the ledger are not, and the cap is best-effort across them.
    pub async fn run_background(
        &self,
        command: &str,
        name: &str,
        session_id: &str,
    ) -> Result<BackgroundLaunch, ExecutionError> {
        let command = non_empty_command(command)?;
        let _launch = lock_unpoisoned(&self.launch_guard);
        let running = self.registry.running_count()?;
        if running >= self.config.max_background_jobs {
            return Err(ExecutionError::CapacityExceeded {
                running,
                limit: self.config.max_background_jobs,
            });
        }

        let mut builder = self.shell_command(command);
        builder
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        #[cfg(unix)]
        detach_into_new_session(&mut builder);

        let child = builder.spawn().map_err(|source| ExecutionError::Spawn {
            command: command.to_string(),
            source,
        })?;
        let Some(pid) = child.id() else {
            return Err(ExecutionError::Spawn {
                command: command.to_string(),
                source: std::io::Error::other("spawned process exited before its pid was read"),
            });
        };
        spawn_reaper(child, pid);

        match self.registry.register(pid, name, command, session_id) {
            Ok(job_id) => {
                tracing::info!(job_id = %job_id, pid, command, "background job started");
                Ok(BackgroundLaunch { job_id, pid })
            }
            Err(cause) => {
                tracing::error!(
                    pid,
                    command,
                    error = %format!("{cause:#}"),
                    "background process is running but missing from the ledger"
                );
                Err(ExecutionError::Orphaned {
                    pid,
                    command: command.to_string(),
                    cause,
                })
            }
        }
    }

    /// Sends SIGTERM to the job's process group, falling back to the pid.
    pub fn stop(&self, job_id: &str) -> Result<StopOutcome, ExecutionError> {
        let record = self
            .registry
            .get(job_id)
            .ok_or_else(|| ExecutionError::JobNotFound {
                job_id: job_id.to_string(),
            })?;

        // The pid of a terminal record may already belong to another process.
        if record.status.is_terminal() {
            tracing::debug!(job_id, status = %record.status, "job already terminal; not signalling");
            return Ok(StopOutcome::AlreadyGone(record));
        }

        let outcome = self
            .terminate(record.pid)
            .map_err(|cause| ExecutionError::Signal {
                job_id: job_id.to_string(),
                cause,
            })?;
        match outcome {
            SignalOutcome::Delivered => {
                let change = self.registry.update_status(job_id, JobStatus::Stopped)?;
                tracing::info!(job_id, pid = record.pid, "stopped background job");
                Ok(StopOutcome::Stopped(change.record().cloned().unwrap_or(record)))
            }
            SignalOutcome::NotFound => {
                let change = self.registry.update_status(job_id, JobStatus::NotFound)?;
                tracing::info!(job_id, pid = record.pid, "background job already exited");
                Ok(StopOutcome::AlreadyGone(change.record().cloned().unwrap_or(record)))
            }
            SignalOutcome::PermissionDenied => Err(ExecutionError::SignalDenied {
                job_id: job_id.to_string(),
                pid: record.pid,
            }),
        }
    }

    fn terminate(&self, pid: u32) -> anyhow::Result<SignalOutcome> {
        match self
            .control
            .signal(pid, TerminationSignal::Terminate, SignalScope::Group)?
        {
            SignalOutcome::NotFound => {
                self.control
                    .signal(pid, TerminationSignal::Terminate, SignalScope::Process)
            }
            outcome => Ok(outcome),
        }
    }

    fn kill_timed_out_group(&self, pid: u32) {
        match self
            .control
            .signal(pid, TerminationSignal::Kill, SignalScope::Group)
        {
            Ok(SignalOutcome::Delivered | SignalOutcome::NotFound) => {}
            Ok(SignalOutcome::PermissionDenied) => {
                tracing::warn!(pid, "not permitted to kill timed-out process group");
            }
            Err(error) => {
                tracing::warn!(pid, error = %format!("{error:#}"), "failed to kill timed-out process group");
            }
        }
    }

    fn shell_command(&self, command: &str) -> Command {
        let mut builder = Command::new(&self.config.shell);
        builder.arg("-c").arg(command);
        builder
    }
}

fn non_empty_command(command: &str) -> Result<&str, ExecutionError> {
    let trimmed = command.trim();
    if trimmed.is_empty() {
        return Err(ExecutionError::EmptyCommand);
    }
    Ok(trimmed)
}

#[cfg(unix)]
fn detach_into_new_session(builder: &mut Command) {
    // SAFETY: setsid(2) is async-signal-safe and touches no parent memory.
    unsafe {
        builder.pre_exec(|| {
            if libc::setsid() == -1 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }
}

/// Waits on the child so an exited job does not linger as a zombie that
/// still answers liveness probes. The exit status is only logged.
fn spawn_reaper(mut child: tokio::process::Child, pid: u32) {
    tokio::spawn(async move {
        match child.wait().await {
            Ok(status) => tracing::debug!(pid, code = ?status.code(), "background process exited"),
            Err(error) => tracing::warn!(pid, %error, "failed to reap background process"),
        }
    });
}

/// Truncates on a char boundary and appends a marker when anything was cut.
pub fn truncate_bytes(value: &str, limit: usize) -> String {
    if value.len() <= limit {
        return value.to_string();
    }

    if limit == 0 {
        return OUTPUT_TRUNCATED_MARKER.to_string();
    }

    let mut end = limit.min(value.len());
    while end > 0 && !value.is_char_boundary(end) {
        end -= 1;
    }

    let mut output = value[..end].to_string();
    output.push('\n');
    output.push_str(OUTPUT_TRUNCATED_MARKER);
    output
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    use anyhow::{bail, Result};
    use hwa_jobs::{
        JobLedger, JobRegistry, JobStatus, JobStore, MemoryJobStore, ProbeOutcome,
        ProcessControl, ProcessProbe, SignalOutcome, SignalScope, StoreLock,
        SystemProcessControl, TerminationSignal,
    };
    use proptest::prelude::*;

    use super::{truncate_bytes, CommandExecutor, ExecutorConfig, StopOutcome};
    use crate::execution_error::ExecutionError;

    /// Scripted host: per-pid probe answers and signal outcomes, with a log of
    /// every signal sent.
    #[derive(Default)]
    struct FakeControl {
        probes: Mutex<BTreeMap<u32, ProbeOutcome>>,
        signals: Mutex<BTreeMap<(u32, bool), SignalOutcome>>,
        sent: Mutex<Vec<(u32, TerminationSignal, SignalScope)>>,
    }

    impl FakeControl {
        fn respond(&self, pid: u32, scope: SignalScope, outcome: SignalOutcome) {
            self.signals
                .lock()
                .expect("signals")
                .insert((pid, scope == SignalScope::Group), outcome);
        }

        fn sent(&self) -> Vec<(u32, TerminationSignal, SignalScope)> {
            self.sent.lock().expect("sent").clone()
        }
    }

    impl ProcessProbe for FakeControl {
        fn probe(&self, pid: u32) -> ProbeOutcome {
            self.probes
                .lock()
                .expect("probes")
                .get(&pid)
                .copied()
                .unwrap_or(ProbeOutcome::Alive)
        }
    }

    impl ProcessControl for FakeControl {
        fn signal(
            &self,
            pid: u32,
            signal: TerminationSignal,
            scope: SignalScope,
        ) -> Result<SignalOutcome> {
            self.sent.lock().expect("sent").push((pid, signal, scope));
            Ok(self
                .signals
                .lock()
                .expect("signals")
                .get(&(pid, scope == SignalScope::Group))
                .copied()
                .unwrap_or(SignalOutcome::Delivered))
        }
    }

    struct FailingStore;

    impl JobStore for FailingStore {
        fn load(&self) -> JobLedger {
            JobLedger::new()
        }
        fn save(&self, _ledger: &JobLedger) -> Result<()> {
            bail!("ledger directory is read-only")
        }
        fn lock(&self) -> Result<StoreLock> {
            Ok(StoreLock::in_process())
        }
        fn describe(&self) -> String {
            "failing".to_string()
        }
    }

    fn executor_with<C: ProcessControl + 'static>(
        control: Arc<C>,
        config: ExecutorConfig,
    ) -> CommandExecutor {
        let registry = JobRegistry::new(Arc::new(MemoryJobStore::new()), control.clone());
        CommandExecutor::new(Arc::new(registry), control, config)
    }

    fn system_executor() -> CommandExecutor {
        executor_with(Arc::new(SystemProcessControl), ExecutorConfig::default())
    }

    async fn wait_until_gone(pid: u32) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while SystemProcessControl.is_alive(pid) && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    #[test]
    fn unit_truncate_bytes_keeps_valid_utf8_boundaries() {
        assert_eq!(truncate_bytes("short", 16), "short");
        assert_eq!(truncate_bytes("abcdef", 0), "<output truncated>");
        let truncated = truncate_bytes("ééé", 3);
        assert_eq!(truncated, "é\n<output truncated>");
    }

    proptest! {
        #[test]
        fn property_truncate_bytes_keeps_a_prefix_within_limit(
            value in "\\PC{0,48}",
            limit in 0usize..96,
        ) {
            let output = truncate_bytes(&value, limit);
            if value.len() <= limit {
                prop_assert_eq!(&output, &value);
            } else {
                let kept = output.strip_suffix("<output truncated>").expect("marker");
                let kept = kept.strip_suffix('\n').unwrap_or(kept);
                prop_assert!(kept.len() <= limit);
                prop_assert!(value.starts_with(kept));
            }
        }
    }

    #[tokio::test]
    async fn unit_empty_command_is_rejected_before_spawning() {
        let executor = system_executor();
        let error = executor
            .run_foreground("   ", None)
            .await
            .expect_err("empty command");
        assert!(matches!(error, ExecutionError::EmptyCommand));
        let error = executor
            .run_background("", "noop", "s1")
            .await
            .expect_err("empty command");
        assert!(matches!(error, ExecutionError::EmptyCommand));
        assert!(executor.registry().list().is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn functional_foreground_captures_streams_and_exit_code() {
        let executor = system_executor();
        let output = executor
            .run_foreground("echo out; echo err >&2; exit 3", None)
            .await
            .expect("run");
        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");
        assert_eq!(output.return_code, Some(3));
        assert!(!output.success);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn functional_foreground_truncates_large_output() {
        let executor = executor_with(
            Arc::new(SystemProcessControl),
            ExecutorConfig {
                max_output_bytes: 8,
                ..ExecutorConfig::default()
            },
        );
        let output = executor
            .run_foreground("printf '0123456789abcdef'", None)
            .await
            .expect("run");
        assert_eq!(output.stdout, "01234567\n<output truncated>");
        assert!(output.success);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn regression_foreground_timeout_is_distinct_and_kills_the_group() {
        let temp = tempfile::tempdir().expect("tempdir");
        let marker = temp.path().join("survived");
        let executor = system_executor();
        let started = Instant::now();
        let command = format!("sleep 1 && touch {}; sleep 30", marker.display());
        let error = executor
            .run_foreground(&command, Some(Duration::from_millis(200)))
            .await
            .expect_err("timeout");
        assert!(matches!(error, ExecutionError::Timeout { .. }));
        assert_eq!(error.reason_code(), "timeout");
        assert!(started.elapsed() < Duration::from_secs(10));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!marker.exists(), "timed-out command kept running");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn functional_spawn_failure_creates_no_record() {
        let executor = executor_with(
            Arc::new(SystemProcessControl),
            ExecutorConfig {
                shell: "/nonexistent/hwa-shell".to_string(),
                ..ExecutorConfig::default()
            },
        );
        let error = executor
            .run_background("sleep 5", "sleeper", "s1")
            .await
            .expect_err("spawn failure");
        assert!(matches!(error, ExecutionError::Spawn { .. }));
        assert!(executor.registry().list().is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn integration_background_job_stop_is_idempotent() {
        let executor = system_executor();
        let launch = executor
            .run_background("sleep 30", "sleeper", "s1")
            .await
            .expect("launch");
        let record = executor.registry().get(&launch.job_id).expect("record");
        assert_eq!(record.status, JobStatus::Running);
        assert_eq!(record.pid, launch.pid);

        let first = executor.stop(&launch.job_id).expect("first stop");
        let stopped_at = match &first {
            StopOutcome::Stopped(record) => {
                assert_eq!(record.status, JobStatus::Stopped);
                record.stopped_at
            }
            other => panic!("expected stopped, got {other:?}"),
        };
        assert!(stopped_at.is_some());

        wait_until_gone(launch.pid).await;
        let second = executor.stop(&launch.job_id).expect("second stop");
        assert!(matches!(second, StopOutcome::AlreadyGone(_)));
        let record = executor.registry().get(&launch.job_id).expect("record");
        assert_eq!(record.status, JobStatus::Stopped);
        assert_eq!(record.stopped_at, stopped_at);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn functional_exited_background_job_reconciles_to_not_found() {
        let executor = system_executor();
        let launch = executor
            .run_background("exit 0", "quick", "s1")
            .await
            .expect("launch");
        wait_until_gone(launch.pid).await;

        let listing = executor.registry().list_refreshed().expect("list");
        assert_eq!(listing.running, 0);
        let record = executor.registry().get(&launch.job_id).expect("record");
        assert_eq!(record.status, JobStatus::NotFound);
        assert!(record.stopped_at.is_some());
    }

    #[test]
    fn unit_stop_unknown_job_reports_not_found() {
        let executor = executor_with(Arc::new(FakeControl::default()), ExecutorConfig::default());
        let error = executor.stop("job_missing").expect_err("unknown job");
        assert!(matches!(error, ExecutionError::JobNotFound { .. }));
    }

    #[test]
    fn unit_stop_falls_back_to_pid_and_reconciles_missing_process() {
        let control = Arc::new(FakeControl::default());
        control.respond(4242, SignalScope::Group, SignalOutcome::NotFound);
        control.respond(4242, SignalScope::Process, SignalOutcome::NotFound);
        let executor = executor_with(control.clone(), ExecutorConfig::default());
        let job_id = executor
            .registry()
            .register(4242, "stress", "stress --cpu 4", "s1")
            .expect("register");

        let outcome = executor.stop(&job_id).expect("stop");
        match outcome {
            StopOutcome::AlreadyGone(record) => assert_eq!(record.status, JobStatus::NotFound),
            other => panic!("expected already gone, got {other:?}"),
        }
        assert_eq!(
            control.sent(),
            vec![
                (4242, TerminationSignal::Terminate, SignalScope::Group),
                (4242, TerminationSignal::Terminate, SignalScope::Process),
            ]
        );
    }

    #[test]
    fn regression_stopped_job_with_live_pid_is_not_signalled_again() {
        let control = Arc::new(FakeControl::default());
        let executor = executor_with(control.clone(), ExecutorConfig::default());
        let job_id = executor
            .registry()
            .register(4242, "stubborn", "trap '' TERM; sleep 100", "s1")
            .expect("register");

        let first = executor.stop(&job_id).expect("first stop");
        assert!(matches!(first, StopOutcome::Stopped(_)));
        let stopped_at = first.record().stopped_at;
        assert_eq!(control.sent().len(), 1);

        let second = executor.stop(&job_id).expect("second stop");
        match second {
            StopOutcome::AlreadyGone(record) => {
                assert_eq!(record.status, JobStatus::Stopped);
                assert_eq!(record.stopped_at, stopped_at);
            }
            other => panic!("expected already gone, got {other:?}"),
        }
        assert_eq!(control.sent().len(), 1);
    }

    #[test]
    fn regression_terminal_job_is_not_signalled_again() {
        let control = Arc::new(FakeControl::default());
        let executor = executor_with(control.clone(), ExecutorConfig::default());
        let job_id = executor
            .registry()
            .register(77, "bench", "sysbench", "s1")
            .expect("register");
        executor
            .registry()
            .update_status(&job_id, JobStatus::NotFound)
            .expect("reconcile");

        let outcome = executor.stop(&job_id).expect("stop");
        assert!(matches!(outcome, StopOutcome::AlreadyGone(_)));
        assert!(control.sent().is_empty());
    }

    #[test]
    fn unit_stop_reports_permission_denied_without_touching_status() {
        let control = Arc::new(FakeControl::default());
        control.respond(1, SignalScope::Group, SignalOutcome::PermissionDenied);
        let executor = executor_with(control, ExecutorConfig::default());
        let job_id = executor
            .registry()
            .register(1, "init", "init", "s1")
            .expect("register");

        let error = executor.stop(&job_id).expect_err("denied");
        assert!(matches!(error, ExecutionError::SignalDenied { pid: 1, .. }));
        assert_eq!(
            executor.registry().get(&job_id).expect("record").status,
            JobStatus::Running
        );
    }

    #[tokio::test]
    async fn unit_background_capacity_is_enforced_before_spawning() {
        let control = Arc::new(FakeControl::default());
        let executor = executor_with(
            control,
            ExecutorConfig {
                max_background_jobs: 1,
                ..ExecutorConfig::default()
            },
        );
        executor
            .registry()
            .register(500, "existing", "sleep 100", "s1")
            .expect("register");

        let error = executor
            .run_background("sleep 100", "second", "s1")
            .await
            .expect_err("capacity");
        assert!(matches!(
            error,
            ExecutionError::CapacityExceeded {
                running: 1,
                limit: 1
            }
        ));
        assert_eq!(executor.registry().list().len(), 1);
    }

    #[cfg(unix)]
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn regression_concurrent_launches_respect_capacity() {
        let control = Arc::new(FakeControl::default());
        let executor = Arc::new(executor_with(
            control,
            ExecutorConfig {
                max_background_jobs: 2,
                ..ExecutorConfig::default()
            },
        ));

        let handles: Vec<_> = (0..6)
            .map(|index| {
                let executor = Arc::clone(&executor);
                tokio::spawn(async move {
                    executor
                        .run_background("sleep 30", &format!("worker-{index}"), "s1")
                        .await
                })
            })
            .collect();
        let mut launched = Vec::new();
        let mut refused = 0;
        for handle in handles {
            match handle.await.expect("join") {
                Ok(launch) => launched.push(launch.pid),
                Err(ExecutionError::CapacityExceeded { limit: 2, .. }) => refused += 1,
                Err(other) => panic!("unexpected error {other:?}"),
            }
        }

        assert_eq!(launched.len(), 2);
        assert_eq!(refused, 4);
        assert_eq!(executor.registry().list().len(), 2);
        for pid in launched {
            SystemProcessControl
                .signal(pid, TerminationSignal::Kill, SignalScope::Group)
                .expect("cleanup");
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn regression_registration_failure_surfaces_orphaned_process() {
        let control = Arc::new(SystemProcessControl);
        let registry = JobRegistry::new(Arc::new(FailingStore), control.clone());
        let executor = CommandExecutor::new(Arc::new(registry), control.clone(), ExecutorConfig::default());

        let error = executor
            .run_background("sleep 30", "orphan", "s1")
            .await
            .expect_err("orphaned");
        let pid = match &error {
            ExecutionError::Orphaned { pid, .. } => *pid,
            other => panic!("expected orphaned, got {other:?}"),
        };
        assert_eq!(error.reason_code(), "orphaned_process");
        assert_eq!(error.to_payload()["pid"], pid);

        control
            .signal(pid, TerminationSignal::Kill, SignalScope::Group)
            .expect("cleanup");
    }
}
