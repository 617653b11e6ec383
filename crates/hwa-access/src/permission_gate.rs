//! Request/approval state machine for privileged actions.
//!
//! `REQUESTED` moves to `AUTO_APPROVED` for safe shell commands and read
//! requests; everything else moves to `DANGER_FLAGGED` and is resolved to
//! `APPROVED` or `DENIED` by the decision authority. The gate keeps no state
//! between requests and never memoizes by command text.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde::Serialize;

use crate::command_classifier::{Classification, CommandClassifier};
use crate::decision_authority::{
    AuthorityVerdict, DecisionAuthority, DecisionPrompt, DenialReason,
};
use crate::permission_request::{PermissionKind, PermissionRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateState {
    Requested,
    AutoApproved,
    /// Awaiting the authority. The prompt's `danger_flag` says whether a
    /// dangerous pattern matched.
    DangerFlagged,
    Approved,
    Denied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApprovalReason {
    AutoSafeCommand,
    AutoRead,
    Authority,
}

impl ApprovalReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AutoSafeCommand => "auto-safe-command",
            Self::AutoRead => "auto-read",
            Self::Authority => "authority",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", content = "reason", rename_all = "snake_case")]
pub enum PermissionDecision {
    Approved(ApprovalReason),
    Denied(DenialReason),
}

impl PermissionDecision {
    pub fn is_approved(self) -> bool {
        matches!(self, Self::Approved(_))
    }

    pub fn reason(self) -> &'static str {
        match self {
            Self::Approved(reason) => reason.as_str(),
            Self::Denied(reason) => reason.as_str(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GateTraceStep {
    pub check: &'static str,
    pub outcome: &'static str,
    pub detail: String,
}

/// Outcome of resolving one request, with the path it took.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionResolution {
    pub kind: PermissionKind,
    pub payload: String,
    pub state: GateState,
    #[serde(flatten)]
    pub decision: PermissionDecision,
    pub classification: Option<Classification>,
    pub danger_flag: bool,
    pub trace: Vec<GateTraceStep>,
}

impl PermissionResolution {
    pub fn is_approved(&self) -> bool {
        self.decision.is_approved()
    }
}

fn push_trace(
    trace: &mut Vec<GateTraceStep>,
    check: &'static str,
    outcome: &'static str,
    detail: impl Into<String>,
) {
    trace.push(GateTraceStep {
        check,
        outcome,
        detail: detail.into(),
    });
}

pub struct PermissionGate {
    classifier: CommandClassifier,
    authority: Arc<dyn DecisionAuthority>,
}

impl std::fmt::Debug for PermissionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionGate")
            .field("classifier", &self.classifier)
            .finish_non_exhaustive()
    }
}

impl PermissionGate {
    pub fn new(classifier: CommandClassifier, authority: Arc<dyn DecisionAuthority>) -> Self {
        Self {
            classifier,
            authority,
        }
    }

    pub fn classifier(&self) -> &CommandClassifier {
        &self.classifier
    }

    pub fn resolve(&self, request: &PermissionRequest) -> PermissionResolution {
        let mut trace = Vec::new();
        push_trace(
            &mut trace,
            "request",
            "received",
            format!("kind={} session={}", request.kind, request.session_label()),
        );

        let classification = match request.kind {
            PermissionKind::Shell => {
                let classification = self.classifier.classify(&request.payload);
                push_trace(
                    &mut trace,
                    "classify",
                    classification.label(),
                    request.payload.clone(),
                );
                Some(classification)
            }
            _ => None,
        };

        let auto_approval = match (&request.kind, &classification) {
            (PermissionKind::Read, _) => Some(ApprovalReason::AutoRead),
            (_, Some(Classification::Safe { .. })) => Some(ApprovalReason::AutoSafeCommand),
            _ => None,
        };
        if let Some(reason) = auto_approval {
            push_trace(&mut trace, "auto_approval", "approved", reason.as_str());
            tracing::debug!(
                kind = %request.kind,
                payload = %request.payload,
                reason = reason.as_str(),
                "permission auto-approved"
            );
            return PermissionResolution {
                kind: request.kind.clone(),
                payload: request.payload.clone(),
                state: GateState::AutoApproved,
                decision: PermissionDecision::Approved(reason),
                classification,
                danger_flag: false,
                trace,
            };
        }

        let warning = match &classification {
            Some(Classification::Dangerous { matched }) => Some(format!(
                "potentially dangerous command (matches: {})",
                matched.join(", ")
            )),
            _ => None,
        };
        let prompt = DecisionPrompt {
            request: request.clone(),
            danger_flag: warning.is_some(),
            warning,
            classification: classification.clone(),
        };
        push_trace(
            &mut trace,
            "danger_flag",
            if prompt.danger_flag { "flagged" } else { "clear" },
            prompt.warning.clone().unwrap_or_default(),
        );

        let decision = self.consult_authority(&prompt, &mut trace);
        let state = if decision.is_approved() {
            GateState::Approved
        } else {
            GateState::Denied
        };
        tracing::info!(
            kind = %request.kind,
            payload = %request.payload,
            danger_flag = prompt.danger_flag,
            decision = decision.reason(),
            "permission resolved by authority"
        );
        PermissionResolution {
            kind: request.kind.clone(),
            payload: request.payload.clone(),
            state,
            decision,
            classification,
            danger_flag: prompt.danger_flag,
            trace,
        }
    }

    /// Errors and panics from the authority both resolve to a denial.
    fn consult_authority(
        &self,
        prompt: &DecisionPrompt,
        trace: &mut Vec<GateTraceStep>,
    ) -> PermissionDecision {
        match catch_unwind(AssertUnwindSafe(|| self.authority.decide(prompt))) {
            Ok(Ok(AuthorityVerdict::Approved)) => {
                push_trace(trace, "authority", "approved", "");
                PermissionDecision::Approved(ApprovalReason::Authority)
            }
            Ok(Ok(AuthorityVerdict::Denied(reason))) => {
                push_trace(trace, "authority", "denied", reason.as_str());
                PermissionDecision::Denied(reason)
            }
            Ok(Err(error)) => {
                tracing::warn!(error = %format!("{error:#}"), "decision authority failed; denying");
                push_trace(trace, "authority", "fault", format!("{error:#}"));
                PermissionDecision::Denied(DenialReason::NoApprovalRule)
            }
            Err(_) => {
                tracing::warn!("decision authority panicked; denying");
                push_trace(trace, "authority", "fault", "authority panicked");
                PermissionDecision::Denied(DenialReason::NoApprovalRule)
            }
        }
    }
}
