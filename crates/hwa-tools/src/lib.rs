//! Gated execution of host commands and control of background jobs.
//!
//! `ExecutionPipeline` puts the permission gate in front of
//! `CommandExecutor`; `job_tools` turns every operation into a structured
//! payload for the CLI or an embedding agent.

pub mod command_executor;
pub mod execution_error;
pub mod execution_pipeline;
pub mod job_tools;
pub mod tool_result;

pub use command_executor::*;
pub use execution_error::*;
pub use execution_pipeline::*;
pub use tool_result::*;
