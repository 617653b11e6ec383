use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::command_classifier::Classification;
use crate::permission_request::PermissionRequest;

/// Why a request was denied. Serialized with the wire strings hosts expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DenialReason {
    #[serde(rename = "denied-interactively-by-user")]
    InteractivelyByUser,
    #[serde(rename = "denied-by-rules")]
    ByRules,
    #[serde(rename = "denied-no-approval-rule-and-could-not-request-from-user")]
    NoApprovalRule,
}

impl DenialReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InteractivelyByUser => "denied-interactively-by-user",
            Self::ByRules => "denied-by-rules",
            Self::NoApprovalRule => "denied-no-approval-rule-and-could-not-request-from-user",
        }
    }
}

impl std::fmt::Display for DenialReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Answer returned by a decision authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorityVerdict {
    Approved,
    Denied(DenialReason),
}

/// Everything an authority is shown about a request that needs a decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecisionPrompt {
    pub request: PermissionRequest,
    pub classification: Option<Classification>,
    pub danger_flag: bool,
    pub warning: Option<String>,
}

/// Human or policy collaborator consulted for every request that is not
/// auto-approved. An `Err` is a fault and resolves to a denial.
pub trait DecisionAuthority: Send + Sync {
    fn decide(&self, prompt: &DecisionPrompt) -> Result<AuthorityVerdict>;
}

impl<F> DecisionAuthority for F
where
    F: Fn(&DecisionPrompt) -> Result<AuthorityVerdict> + Send + Sync,
{
    fn decide(&self, prompt: &DecisionPrompt) -> Result<AuthorityVerdict> {
        self(prompt)
    }
}

/// Non-interactive authority that answers every prompt the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticDecisionAuthority {
    verdict: AuthorityVerdict,
}

impl StaticDecisionAuthority {
    pub fn allow_all() -> Self {
        Self {
            verdict: AuthorityVerdict::Approved,
        }
    }

    pub fn deny_all() -> Self {
        Self {
            verdict: AuthorityVerdict::Denied(DenialReason::ByRules),
        }
    }
}

impl DecisionAuthority for StaticDecisionAuthority {
    fn decide(&self, _prompt: &DecisionPrompt) -> Result<AuthorityVerdict> {
        Ok(self.verdict)
    }
}
