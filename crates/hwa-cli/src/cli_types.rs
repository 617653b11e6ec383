use std::sync::Arc;

use clap::ValueEnum;
use hwa_access::{DecisionAuthority, StaticDecisionAuthority};

use crate::console_authority::ConsoleDecisionAuthority;

/// How requests that are not auto-approved get decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CliApprovalMode {
    /// Ask on the terminal.
    Prompt,
    /// Deny everything that is not auto-approved.
    Deny,
    /// Approve everything.
    Allow,
}

impl CliApprovalMode {
    pub fn authority(self) -> Arc<dyn DecisionAuthority> {
        match self {
            Self::Prompt => Arc::new(ConsoleDecisionAuthority::stdio()),
            Self::Deny => Arc::new(StaticDecisionAuthority::deny_all()),
            Self::Allow => Arc::new(StaticDecisionAuthority::allow_all()),
        }
    }
}
