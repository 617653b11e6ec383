use serde_json::Value;

/// Structured payload returned across the tool/CLI boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolExecutionResult {
    pub content: Value,
    pub is_error: bool,
}

impl ToolExecutionResult {
    pub fn ok(content: Value) -> Self {
        Self {
            content,
            is_error: false,
        }
    }

    pub fn error(content: Value) -> Self {
        Self {
            content,
            is_error: true,
        }
    }

    /// True for error payloads built from a lost ledger write.
    pub fn is_hard_failure(&self) -> bool {
        self.is_error && self.content["hard_failure"] == Value::Bool(true)
    }

    /// Converts the payload to text for display.
    pub fn as_text(&self) -> String {
        match &self.content {
            Value::String(text) => text.clone(),
            other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
        }
    }
}

impl From<crate::execution_error::ExecutionError> for ToolExecutionResult {
    fn from(error: crate::execution_error::ExecutionError) -> Self {
        Self::error(error.to_payload())
    }
}
