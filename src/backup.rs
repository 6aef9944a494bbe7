use anyhow::{Context, Result, anyhow};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const BACKUP_SUFFIX: &str = "bak";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupStatus {
    Created,
    Existing,
}

/// `quest.snbt` -> `quest.snbt.bak`, next to the source.
pub fn backup_path(src: &Path) -> PathBuf {
    let mut name = src.as_os_str().to_os_string();
    name.push(".");
    name.push(BACKUP_SUFFIX);
    PathBuf::from(name)
}

/// Copies `src` to its sibling backup unless one already exists. An existing
/// backup is the first snapshot ever taken and is never overwritten.
pub fn ensure_backup(src: &Path) -> Result<BackupStatus> {
    let backup = backup_path(src);
    if backup.exists() {
        debug!("backup already exists: {}", display_name(&backup));
        return Ok(BackupStatus::Existing);
    }

    let metadata = fs::metadata(src)
        .with_context(|| format!("failed to read file metadata: {}", src.display()))?;
    if !metadata.is_file() {
        return Err(anyhow!("backup source is not a file: {}", src.display()));
    }

    fs::copy(src, &backup).with_context(|| {
        format!(
            "failed to copy backup from {} to {}",
            src.display(),
            backup.display()
        )
    })?;
    info!("created backup {}", display_name(&backup));
    Ok(BackupStatus::Created)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
