use std::time::Duration;

use hwa_access::{PermissionGate, PermissionRequest, PermissionResolution};
use serde::Serialize;

use crate::command_executor::{BackgroundLaunch, CommandExecutor, ForegroundOutput, StopOutcome};
use crate::execution_error::ExecutionError;

/// An executor outcome together with the approval that allowed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Authorized<T> {
    pub permission: PermissionResolution,
    #[serde(flatten)]
    pub outcome: T,
}

/// Gate in front of the executor: nothing is spawned until the gate approves.
#[derive(Debug)]
pub struct ExecutionPipeline {
    gate: PermissionGate,
    executor: CommandExecutor,
}

impl ExecutionPipeline {
    pub fn new(gate: PermissionGate, executor: CommandExecutor) -> Self {
        Self { gate, executor }
    }

    pub fn gate(&self) -> &PermissionGate {
        &self.gate
    }

    pub fn executor(&self) -> &CommandExecutor {
        &self.executor
    }

    /// Resolves any request; denials become `ExecutionError::Denied`.
    pub fn authorize(
        &self,
        request: &PermissionRequest,
    ) -> Result<PermissionResolution, ExecutionError> {
        let resolution = self.gate.resolve(request);
        if resolution.is_approved() {
            Ok(resolution)
        } else {
            tracing::info!(
                kind = %request.kind,
                payload = %request.payload,
                reason = resolution.decision.reason(),
                "request denied by permission gate"
            );
            Err(ExecutionError::Denied {
                resolution: Box::new(resolution),
            })
        }
    }

    pub async fn run_foreground(
        &self,
        command: &str,
        session_id: &str,
        timeout: Option<Duration>,
    ) -> Result<Authorized<ForegroundOutput>, ExecutionError> {
        let permission = self.authorize(&PermissionRequest::shell(command, session_id))?;
        let outcome = self.executor.run_foreground(command, timeout).await?;
        Ok(Authorized {
            permission,
            outcome,
        })
    }

    pub async fn run_background(
        &self,
        command: &str,
        name: &str,
        session_id: &str,
    ) -> Result<Authorized<BackgroundLaunch>, ExecutionError> {
        let permission = self.authorize(&PermissionRequest::shell(command, session_id))?;
        let outcome = self
            .executor
            .run_background(command, name, session_id)
            .await?;
        Ok(Authorized {
            permission,
            outcome,
        })
    }

    /// Job control is not gated; only starting processes is.
    pub fn stop(&self, job_id: &str) -> Result<StopOutcome, ExecutionError> {
        self.executor.stop(job_id)
    }
}
