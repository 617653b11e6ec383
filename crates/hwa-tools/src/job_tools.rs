//! Tool-facing operations: each maps onto one registry or executor call and
//! returns a structured success or error payload.

use std::time::Duration;

use hwa_jobs::JobRegistry;
use serde_json::{json, Value};

use crate::command_executor::StopOutcome;
use crate::execution_error::ExecutionError;
use crate::execution_pipeline::ExecutionPipeline;
use crate::tool_result::ToolExecutionResult;

fn to_payload<T: serde::Serialize>(value: &T) -> ToolExecutionResult {
    match serde_json::to_value(value) {
        Ok(content) => ToolExecutionResult::ok(content),
        Err(error) => ToolExecutionResult::error(json!({
            "error": format!("failed to encode payload: {error}"),
            "reason_code": "encode_failed",
        })),
    }
}

fn job_not_found(job_id: &str) -> ToolExecutionResult {
    ExecutionError::JobNotFound {
        job_id: job_id.to_string(),
    }
    .into()
}

/// `{jobs, total, running}` after reconciling every running record.
pub fn list_jobs(registry: &JobRegistry) -> ToolExecutionResult {
    match registry.list_refreshed() {
        Ok(listing) => to_payload(&listing),
        Err(error) => ExecutionError::Storage(error).into(),
    }
}

pub fn job_status(registry: &JobRegistry, job_id: &str) -> ToolExecutionResult {
    match registry.get_refreshed(job_id) {
        Ok(Some(snapshot)) => to_payload(&snapshot),
        Ok(None) => job_not_found(job_id),
        Err(error) => ExecutionError::Storage(error).into(),
    }
}

pub fn stop_job(pipeline: &ExecutionPipeline, job_id: &str) -> ToolExecutionResult {
    match pipeline.stop(job_id) {
        Ok(StopOutcome::Stopped(record)) => ToolExecutionResult::ok(json!({
            "success": true,
            "outcome": "stopped",
            "job_id": record.job_id,
            "pid": record.pid,
            "status": record.status,
            "message": format!("Job {} (PID {}) stopped", record.job_id, record.pid),
        })),
        Ok(StopOutcome::AlreadyGone(record)) => ToolExecutionResult::ok(json!({
            "success": false,
            "outcome": "already_gone",
            "reason_code": "process_already_exited",
            "job_id": record.job_id,
            "pid": record.pid,
            "status": record.status,
            "message": "Process not found - may have already exited",
        })),
        Err(error) => error.into(),
    }
}

/// Drops the ledger entry only; a still-running process keeps running.
pub fn remove_job(registry: &JobRegistry, job_id: &str) -> ToolExecutionResult {
    match registry.remove(job_id) {
        Ok(true) => ToolExecutionResult::ok(json!({
            "success": true,
            "job_id": job_id,
            "message": format!("Job {job_id} removed"),
        })),
        Ok(false) => job_not_found(job_id),
        Err(error) => ExecutionError::Storage(error).into(),
    }
}

pub async fn run_command(
    pipeline: &ExecutionPipeline,
    command: &str,
    session_id: &str,
    timeout: Option<Duration>,
) -> ToolExecutionResult {
    match pipeline.run_foreground(command, session_id, timeout).await {
        Ok(authorized) => {
            let mut result = to_payload(&authorized);
            if let Value::Object(payload) = &mut result.content {
                payload.insert("command".to_string(), json!(command));
            }
            result
        }
        Err(error) => error.into(),
    }
}

pub async fn spawn_job(
    pipeline: &ExecutionPipeline,
    command: &str,
    name: &str,
    session_id: &str,
) -> ToolExecutionResult {
    match pipeline.run_background(command, name, session_id).await {
        Ok(authorized) => {
            let mut result = to_payload(&authorized);
            let pid = authorized.outcome.pid;
            if let Value::Object(payload) = &mut result.content {
                payload.insert("success".to_string(), json!(true));
                payload.insert("name".to_string(), json!(name));
                payload.insert("command".to_string(), json!(command));
                payload.insert("status".to_string(), json!("running"));
                payload.insert(
                    "message".to_string(),
                    json!(format!("Background job '{name}' started with PID {pid}")),
                );
            }
            result
        }
        Err(error) => error.into(),
    }
}

/// Classifier and gate preview without executing anything or consulting the
/// decision authority.
pub fn classify_command(pipeline: &ExecutionPipeline, command: &str) -> ToolExecutionResult {
    let classification = pipeline.gate().classifier().classify(command);
    ToolExecutionResult::ok(json!({
        "command": command,
        "classification": classification,
        "auto_approved": classification.is_safe(),
        "danger_flag": classification.is_dangerous(),
    }))
}
