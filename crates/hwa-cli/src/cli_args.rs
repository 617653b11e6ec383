use std::path::PathBuf;

use clap::{Parser, Subcommand};
use hwa_jobs::DEFAULT_LEDGER_FILE;

use crate::CliApprovalMode;

fn parse_positive_usize(value: &str) -> Result<usize, String> {
    let parsed = value
        .parse::<usize>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

#[derive(Debug, Parser)]
#[command(
    name = "hwa",
    about = "Gated shell execution and background job control for the hardware agent",
    version
)]
pub struct Cli {
    #[arg(
        long,
        env = "HWA_LEDGER_PATH",
        default_value = DEFAULT_LEDGER_FILE,
        help = "Background job ledger (JSON). A sibling '<path>.lock' file serializes writers."
    )]
    pub ledger_path: PathBuf,

    #[arg(
        long,
        env = "HWA_EVENT_LOG",
        help = "Optional JSONL file receiving one line per job lifecycle event"
    )]
    pub event_log: Option<PathBuf>,

    #[arg(
        long,
        env = "HWA_SESSION_ID",
        default_value = "cli",
        help = "Session id recorded on permission requests and registered jobs"
    )]
    pub session_id: String,

    #[arg(
        long,
        env = "HWA_MAX_BACKGROUND_JOBS",
        default_value_t = 10,
        value_parser = parse_positive_usize,
        help = "Refuse to spawn when this many jobs are still running"
    )]
    pub max_background_jobs: usize,

    #[arg(
        long,
        env = "HWA_TIMEOUT_SECS",
        default_value_t = 30,
        value_parser = parse_positive_u64,
        help = "Default foreground command timeout in seconds"
    )]
    pub timeout_secs: u64,

    #[arg(
        long,
        env = "HWA_MAX_OUTPUT_BYTES",
        default_value_t = 16_000,
        value_parser = parse_positive_usize,
        help = "Maximum bytes kept from each of stdout and stderr"
    )]
    pub max_output_bytes: usize,

    #[arg(
        long,
        env = "HWA_SHELL",
        default_value = "sh",
        help = "Shell used as '<shell> -c <command>'"
    )]
    pub shell: String,

    #[arg(
        long,
        env = "HWA_APPROVAL_MODE",
        value_enum,
        default_value_t = CliApprovalMode::Prompt,
        help = "How requests that are not auto-approved are decided"
    )]
    pub approval_mode: CliApprovalMode,

    #[arg(
        long = "safe-command",
        env = "HWA_SAFE_COMMANDS",
        value_delimiter = ',',
        help = "Additional executable that auto-approves when it leads a plain command"
    )]
    pub safe_commands: Vec<String>,

    #[arg(
        long = "dangerous-pattern",
        env = "HWA_DANGEROUS_PATTERNS",
        value_delimiter = ',',
        help = "Additional substring that flags a command as dangerous"
    )]
    pub dangerous_patterns: Vec<String>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Run a command in the foreground and print its output.
    Run {
        command: String,
        #[arg(long = "timeout-secs", value_parser = parse_positive_u64)]
        timeout_secs: Option<u64>,
    },
    /// Start a command detached and track it as a background job.
    Spawn {
        command: String,
        #[arg(long)]
        name: String,
    },
    /// Inspect and control background jobs.
    Jobs {
        #[command(subcommand)]
        action: CliJobsCommand,
    },
    /// Show how a command would be classified, without running it.
    Classify { command: String },
}

#[derive(Debug, Subcommand)]
pub enum CliJobsCommand {
    List,
    Status { job_id: String },
    Stop { job_id: String },
    Remove { job_id: String },
}
