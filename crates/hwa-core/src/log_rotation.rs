use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub const LOG_ROTATION_MAX_BYTES_ENV: &str = "HWA_LOG_ROTATION_MAX_BYTES";
pub const LOG_ROTATION_MAX_FILES_ENV: &str = "HWA_LOG_ROTATION_MAX_FILES";
const DEFAULT_LOG_ROTATION_MAX_BYTES: u64 = 10 * 1024 * 1024;
const DEFAULT_LOG_ROTATION_MAX_FILES: usize = 5;

/// Size-based rotation settings for append-only JSONL logs.
///
/// `max_files` counts the active file, so `max_files = 3` keeps `log`,
/// `log.1` and `log.2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogRotationPolicy {
    pub max_bytes: u64,
    pub max_files: usize,
}

impl Default for LogRotationPolicy {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_LOG_ROTATION_MAX_BYTES,
            max_files: DEFAULT_LOG_ROTATION_MAX_FILES,
        }
    }
}

impl LogRotationPolicy {
    /// Reads overrides from the environment; invalid or zero values keep the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_bytes: positive_env_value(LOG_ROTATION_MAX_BYTES_ENV).unwrap_or(defaults.max_bytes),
            max_files: positive_env_value(LOG_ROTATION_MAX_FILES_ENV)
                .unwrap_or(defaults.max_files),
        }
    }

    pub fn is_enabled(self) -> bool {
        self.max_bytes > 0 && self.max_files > 0
    }
}

fn positive_env_value<T>(key: &str) -> Option<T>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.trim().parse::<T>().ok())
        .filter(|value| *value > T::default())
}

/// Appends `line` plus a newline to `path`, rotating first when the write would
/// push the active file past `policy.max_bytes`.
pub fn append_line_with_rotation(path: &Path, line: &str, policy: LogRotationPolicy) -> Result<()> {
    if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    if policy.is_enabled() {
        if let Ok(metadata) = std::fs::metadata(path) {
            let incoming = u64::try_from(line.len().saturating_add(1)).unwrap_or(u64::MAX);
            if metadata.len().saturating_add(incoming) > policy.max_bytes {
                rotate_log_file(path, policy.max_files)?;
            }
        }
    }

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    writeln!(file, "{line}").with_context(|| format!("failed to append {}", path.display()))?;
    file.flush()
        .with_context(|| format!("failed to flush {}", path.display()))
}

fn rotated_backup_path(path: &Path, index: usize) -> PathBuf {
    PathBuf::from(format!("{}.{index}", path.display()))
}

fn rotate_log_file(path: &Path, max_files: usize) -> Result<()> {
    if max_files <= 1 {
        return std::fs::remove_file(path)
            .with_context(|| format!("failed to truncate {}", path.display()));
    }

    let oldest = rotated_backup_path(path, max_files - 1);
    if oldest.exists() {
        std::fs::remove_file(&oldest)
            .with_context(|| format!("failed to prune {}", oldest.display()))?;
    }
    for index in (1..max_files - 1).rev() {
        let source = rotated_backup_path(path, index);
        if source.exists() {
            let destination = rotated_backup_path(path, index + 1);
            std::fs::rename(&source, &destination).with_context(|| {
                format!(
                    "failed to shift {} to {}",
                    source.display(),
                    destination.display()
                )
            })?;
        }
    }
    let first_backup = rotated_backup_path(path, 1);
    std::fs::rename(path, &first_backup).with_context(|| {
        format!(
            "failed to rotate {} to {}",
            path.display(),
            first_backup.display()
        )
    })
}
