use serde::{Deserialize, Serialize};

/// Category of privileged action a caller wants to perform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionKind {
    Shell,
    Write,
    Read,
    Other(String),
}

impl PermissionKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Shell => "shell",
            Self::Write => "write",
            Self::Read => "read",
            Self::Other(name) => name.as_str(),
        }
    }

}

impl std::fmt::Display for PermissionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One request for authorization. Requests are resolved once and discarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRequest {
    pub kind: PermissionKind,
    /// The literal command for `shell`, the target path for `write`/`read`.
    pub payload: String,
    pub session_id: String,
}

impl PermissionRequest {
    pub fn new(kind: PermissionKind, payload: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            kind,
            payload: payload.into(),
            session_id: session_id.into(),
        }
    }

    pub fn shell(command: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self::new(PermissionKind::Shell, command, session_id)
    }

    pub fn write(path: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self::new(PermissionKind::Write, path, session_id)
    }

    pub fn read(path: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self::new(PermissionKind::Read, path, session_id)
    }

    /// Short session prefix for display; full ids stay out of prompts.
    pub fn session_label(&self) -> String {
        let prefix: String = self.session_id.chars().take(8).collect();
        if prefix.is_empty() {
            "unknown".to_string()
        } else {
            prefix
        }
    }
}
