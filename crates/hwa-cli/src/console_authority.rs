use std::io::{BufRead, BufReader, Write};
use std::sync::Mutex;

use anyhow::{bail, Context, Result};
use hwa_core::lock_unpoisoned;
use hwa_access::{AuthorityVerdict, DecisionAuthority, DecisionPrompt, DenialReason, PermissionKind};

/// Interactive authority: describes the request on `output` and reads a
/// `y/N` answer from `input`. A closed or unreadable input is a fault.
pub struct ConsoleDecisionAuthority {
    input: Mutex<Box<dyn BufRead + Send>>,
    output: Mutex<Box<dyn Write + Send>>,
}

impl ConsoleDecisionAuthority {
    pub fn new(input: Box<dyn BufRead + Send>, output: Box<dyn Write + Send>) -> Self {
        Self {
            input: Mutex::new(input),
            output: Mutex::new(output),
        }
    }

    /// Prompts on stderr so stdout stays reserved for JSON payloads.
    pub fn stdio() -> Self {
        Self::new(
            Box::new(BufReader::new(std::io::stdin())),
            Box::new(std::io::stderr()),
        )
    }

    fn render(prompt: &DecisionPrompt) -> String {
        let request = &prompt.request;
        let mut text = format!(
            "Permission request\n  type: {}\n  session: {}...\n",
            request.kind,
            request.session_label()
        );
        let question = match &request.kind {
            PermissionKind::Shell => {
                text.push_str(&format!("  command: {}\n", request.payload));
                "Allow this command?".to_string()
            }
            PermissionKind::Write => {
                text.push_str(&format!("  file: {}\n", request.payload));
                "Allow file write?".to_string()
            }
            PermissionKind::Read => {
                text.push_str(&format!("  file: {}\n", request.payload));
                "Allow file read?".to_string()
            }
            PermissionKind::Other(name) => {
                if !request.payload.is_empty() {
                    text.push_str(&format!("  detail: {}\n", request.payload));
                }
                format!("Allow {name} operation?")
            }
        };
        if let Some(warning) = &prompt.warning {
            text.push_str(&format!("  WARNING: {warning}\n"));
        }
        text.push_str(&format!("{question} [y/N] "));
        text
    }
}

impl DecisionAuthority for ConsoleDecisionAuthority {
    fn decide(&self, prompt: &DecisionPrompt) -> Result<AuthorityVerdict> {
        {
            let mut output = lock_unpoisoned(&self.output);
            output
                .write_all(Self::render(prompt).as_bytes())
                .and_then(|()| output.flush())
                .context("failed to write permission prompt")?;
        }

        let mut answer = String::new();
        let read = lock_unpoisoned(&self.input)
            .read_line(&mut answer)
            .context("failed to read permission answer")?;
        if read == 0 {
            bail!("no answer: input closed");
        }
        match answer.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => Ok(AuthorityVerdict::Approved),
            _ => Ok(AuthorityVerdict::Denied(DenialReason::InteractivelyByUser)),
        }
    }
}
