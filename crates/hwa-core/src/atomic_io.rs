use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{bail, Context, Result};

use crate::time_utils::current_unix_timestamp_ms;

static TEMP_FILE_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Replaces `path` with `content` through a synced temp file and a rename.
///
/// Readers observe either the previous file or the complete new one, never a
/// prefix. The temp file lives in the destination directory so the rename
/// stays on one filesystem.
pub fn write_text_atomic(path: &Path, content: &str) -> Result<()> {
    if path.as_os_str().is_empty() {
        bail!("destination path cannot be empty");
    }
    if path.is_dir() {
        bail!("destination path '{}' is a directory", path.display());
    }

    let parent_dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent_dir)
        .with_context(|| format!("failed to create {}", parent_dir.display()))?;

    let temp_path = temp_sibling_path(parent_dir, path);
    if let Err(error) = write_and_sync(&temp_path, content) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(error);
    }
    if let Err(error) = std::fs::rename(&temp_path, path) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(error).with_context(|| {
            format!(
                "failed to rename {} to {}",
                temp_path.display(),
                path.display()
            )
        });
    }
    Ok(())
}

fn temp_sibling_path(parent_dir: &Path, path: &Path) -> PathBuf {
    let sequence = TEMP_FILE_COUNTER.fetch_add(1, Ordering::Relaxed);
    let temp_name = format!(
        ".{}.tmp-{}-{}-{sequence}",
        path.file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("ledger"),
        std::process::id(),
        current_unix_timestamp_ms(),
    );
    parent_dir.join(temp_name)
}

fn write_and_sync(temp_path: &Path, content: &str) -> Result<()> {
    let mut file = std::fs::File::create(temp_path)
        .with_context(|| format!("failed to create temporary file {}", temp_path.display()))?;
    file.write_all(content.as_bytes())
        .with_context(|| format!("failed to write temporary file {}", temp_path.display()))?;
    file.sync_all()
        .with_context(|| format!("failed to sync temporary file {}", temp_path.display()))?;
    Ok(())
}
