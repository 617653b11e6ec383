use std::sync::Arc;
use std::time::Duration;

use hwa_access::{CommandClassifier, DecisionAuthority, PermissionGate};
use hwa_jobs::{FileJobStore, JobEventLog, JobRegistry, SystemProcessControl};
use hwa_tools::job_tools;
use hwa_tools::{CommandExecutor, ExecutionPipeline, ExecutorConfig, ToolExecutionResult};

use crate::{Cli, CliCommand, CliJobsCommand};

impl Cli {
    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            shell: self.shell.clone(),
            max_output_bytes: self.max_output_bytes,
            max_background_jobs: self.max_background_jobs,
            default_timeout: Duration::from_secs(self.timeout_secs),
        }
    }

    pub fn classifier(&self) -> CommandClassifier {
        CommandClassifier::default().extended(
            self.safe_commands.iter().cloned(),
            self.dangerous_patterns.iter().cloned(),
        )
    }
}

/// Wires the file-backed registry, host process control and gate together.
pub fn build_pipeline(cli: &Cli, authority: Arc<dyn DecisionAuthority>) -> ExecutionPipeline {
    let control = Arc::new(SystemProcessControl);
    let mut registry = JobRegistry::new(
        Arc::new(FileJobStore::new(&cli.ledger_path)),
        control.clone(),
    );
    if let Some(path) = &cli.event_log {
        registry = registry.with_event_log(JobEventLog::new(path));
    }
    tracing::debug!(
        ledger = %cli.ledger_path.display(),
        approval_mode = ?cli.approval_mode,
        "execution pipeline ready"
    );
    ExecutionPipeline::new(
        PermissionGate::new(cli.classifier(), authority),
        CommandExecutor::new(Arc::new(registry), control, cli.executor_config()),
    )
}

pub async fn execute_cli_command(cli: &Cli, pipeline: &ExecutionPipeline) -> ToolExecutionResult {
    let registry = pipeline.executor().registry();
    match &cli.command {
        CliCommand::Run {
            command,
            timeout_secs,
        } => {
            let timeout = timeout_secs.map(Duration::from_secs);
            job_tools::run_command(pipeline, command, &cli.session_id, timeout).await
        }
        CliCommand::Spawn { command, name } => {
            job_tools::spawn_job(pipeline, command, name, &cli.session_id).await
        }
        CliCommand::Jobs { action } => match action {
            CliJobsCommand::List => job_tools::list_jobs(registry),
            CliJobsCommand::Status { job_id } => job_tools::job_status(registry, job_id),
            CliJobsCommand::Stop { job_id } => job_tools::stop_job(pipeline, job_id),
            CliJobsCommand::Remove { job_id } => job_tools::remove_job(registry, job_id),
        },
        CliCommand::Classify { command } => job_tools::classify_command(pipeline, command),
    }
}
