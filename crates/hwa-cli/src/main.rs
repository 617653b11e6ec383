mod bootstrap_helpers;

use std::process::ExitCode;

use clap::Parser;
use hwa_cli::{build_pipeline, execute_cli_command, Cli};

#[tokio::main]
async fn main() -> ExitCode {
    bootstrap_helpers::init_tracing();
    let cli = Cli::parse();
    let pipeline = build_pipeline(&cli, cli.approval_mode.authority());
    let result = execute_cli_command(&cli, &pipeline).await;
    println!("{}", result.as_text());
    if result.is_hard_failure() {
        ExitCode::from(2)
    } else if result.is_error {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
