//! Heuristic shell command classification.
//!
//! The classifier is a hint for the decision authority, not a security
//! boundary: quoting, aliases and indirection can defeat both lists.

use std::path::Path;

use serde::Serialize;

/// Read-only executables that auto-approve when they lead a plain command.
pub const DEFAULT_SAFE_COMMANDS: &[&str] = &[
    "ls", "pwd", "whoami", "date", "cat", "head", "tail", "echo", "ps", "top", "df", "free",
    "uname", "hostname", "uptime", "which", "whereis", "env", "printenv",
];

/// Substrings that mark a command as potentially destructive.
pub const DEFAULT_DANGEROUS_PATTERNS: &[&str] = &[
    "rm", "dd", "mkfs", "chmod", "chown", "kill", "pkill", "shutdown", "reboot", "format",
    "fdisk", "parted",
];

const CONTROL_OPERATORS: &[&str] = &[";", "&", "|", "`", "$(", ">", "<", "\n"];

/// Safe-listed executables that are only safe when given no arguments.
const COMMAND_RUNNERS: &[&str] = &["env"];

/// Classifier verdict for one shell command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Classification {
    Safe { executable: String },
    Dangerous { matched: Vec<String> },
    Unclassified,
}

impl Classification {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Safe { .. } => "safe",
            Self::Dangerous { .. } => "dangerous",
            Self::Unclassified => "unclassified",
        }
    }

    pub fn is_safe(&self) -> bool {
        matches!(self, Self::Safe { .. })
    }

    pub fn is_dangerous(&self) -> bool {
        matches!(self, Self::Dangerous { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandClassifier {
    safe_commands: Vec<String>,
    dangerous_patterns: Vec<String>,
}

impl Default for CommandClassifier {
    fn default() -> Self {
        Self::new(
            DEFAULT_SAFE_COMMANDS.iter().map(ToString::to_string).collect(),
            DEFAULT_DANGEROUS_PATTERNS
                .iter()
                .map(ToString::to_string)
                .collect(),
        )
    }
}

impl CommandClassifier {
    pub fn new(safe_commands: Vec<String>, dangerous_patterns: Vec<String>) -> Self {
        Self {
            safe_commands: normalize_entries(safe_commands),
            dangerous_patterns: normalize_entries(dangerous_patterns),
        }
    }

    /// Adds entries on top of the current lists.
    pub fn extended(
        mut self,
        safe_commands: impl IntoIterator<Item = String>,
        dangerous_patterns: impl IntoIterator<Item = String>,
    ) -> Self {
        self.safe_commands.extend(safe_commands);
        self.dangerous_patterns.extend(dangerous_patterns);
        self.safe_commands = normalize_entries(std::mem::take(&mut self.safe_commands));
        self.dangerous_patterns = normalize_entries(std::mem::take(&mut self.dangerous_patterns));
        self
    }

    pub fn safe_commands(&self) -> &[String] {
        &self.safe_commands
    }

    pub fn dangerous_patterns(&self) -> &[String] {
        &self.dangerous_patterns
    }

    /// Any dangerous substring flags the command. Otherwise a plain command
    /// whose leading executable is listed is safe.
    pub fn classify(&self, command: &str) -> Classification {
        let matched: Vec<String> = self
            .dangerous_patterns
            .iter()
            .filter(|pattern| command.contains(pattern.as_str()))
            .cloned()
            .collect();
        if !matched.is_empty() {
            return Classification::Dangerous { matched };
        }
        match self.safe_executable(command) {
            Some(executable) => Classification::Safe { executable },
            None => Classification::Unclassified,
        }
    }

    fn safe_executable(&self, command: &str) -> Option<String> {
        if has_control_operators(command) {
            return None;
        }
        let executable = leading_executable(command)?;
        if !self.safe_commands.iter().any(|entry| entry == &executable) {
            return None;
        }
        // Wrappers run their arguments as a new command.
        if COMMAND_RUNNERS.contains(&executable.as_str()) && has_arguments(command) {
            return None;
        }
        Some(executable)
    }
}

fn normalize_entries(entries: Vec<String>) -> Vec<String> {
    let mut normalized: Vec<String> = entries
        .into_iter()
        .map(|entry| entry.trim().to_string())
        .filter(|entry| !entry.is_empty())
        .collect();
    normalized.sort();
    normalized.dedup();
    normalized
}

/// True when the command chains, pipes, substitutes or redirects.
pub fn has_control_operators(command: &str) -> bool {
    CONTROL_OPERATORS
        .iter()
        .any(|operator| command.contains(operator))
}

/// File name of the first word. `None` when the command does not tokenize or
/// starts with a `NAME=value` assignment, since assignments such as `PATH=`
/// or `LD_PRELOAD=` change what the executable does.
pub fn leading_executable(command: &str) -> Option<String> {
    let tokens = shell_words::split(command).ok()?;
    let first = tokens.into_iter().next()?;
    if is_shell_assignment(&first) {
        return None;
    }
    Some(
        Path::new(&first)
            .file_name()
            .map(|file_name| file_name.to_string_lossy().to_string())
            .unwrap_or(first),
    )
}

fn has_arguments(command: &str) -> bool {
    shell_words::split(command)
        .map(|tokens| tokens.len() > 1)
        .unwrap_or(true)
}

fn is_shell_assignment(token: &str) -> bool {
    let Some((name, _value)) = token.split_once('=') else {
        return false;
    };

    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(first == '_' || first.is_ascii_alphabetic()) {
        return false;
    }

    chars.all(|ch| ch == '_' || ch.is_ascii_alphanumeric())
}
