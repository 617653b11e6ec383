//! Command-line surface for the hardware agent's execution core.
//!
//! Parses `hwa` flags into executor, classifier and ledger settings, builds
//! the gated execution pipeline, and maps subcommands onto job tools.

pub mod cli_args;
pub mod cli_types;
pub mod commands;
pub mod console_authority;

pub use cli_args::{Cli, CliCommand, CliJobsCommand};
pub use cli_types::*;
pub use commands::*;
pub use console_authority::*;
