use crate::util::ensure_dir;
use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Retrying copy of a file or directory tree. One retry unit covers the whole
/// tree; partially written destinations are removed before the next attempt so
/// the caller never observes a half-copy.
pub struct Copier {
    pub backoff: Duration,
}

impl Default for Copier {
    fn default() -> Self {
        Self {
            backoff: Duration::from_secs(2),
        }
    }
}

impl Copier {
    pub fn with_backoff(backoff: Duration) -> Self {
        Self { backoff }
    }

    /// Copies `source` to `destination`, making at most `max_retries + 1`
    /// attempts (negative retry counts are clamped to zero). Returns `false`
    /// only after every attempt has failed.
    pub fn copy(
        &self,
        source: &Path,
        destination: &Path,
        overwrite: bool,
        max_retries: i32,
        backup_existing_destination: bool,
    ) -> bool {
        let attempts = max_retries.max(0) as u32 + 1;

        if destination.exists() {
            if !overwrite {
                warn!(
                    "destination exists and overwrite=false: {}",
                    destination.display()
                );
                return false;
            }
            if backup_existing_destination {
                if let Err(err) = backup_destination(destination) {
                    warn!("could not back up existing destination: {err:#}");
                    return false;
                }
            }
        }

        for attempt in 1..=attempts {
            match copy_once(source, destination) {
                Ok(()) => return true,
                Err(err) => {
                    warn!(
                        "copy attempt {attempt}/{attempts} failed: {} -> {}: {err:#}",
                        source.display(),
                        destination.display()
                    );
                    remove_any(destination);
                    if attempt < attempts {
                        std::thread::sleep(self.backoff);
                    }
                }
            }
        }
        false
    }
}

/// Renames an existing destination to `<name>_Old1` (`_Old2`, ... on collision)
/// so a failed overwrite never destroys the only good copy.
fn backup_destination(destination: &Path) -> Result<()> {
    let backup = numbered_backup_path(destination)?;
    std::fs::rename(destination, &backup)
        .with_context(|| format!("rename to backup {}", backup.display()))?;
    info!(
        "backed up existing destination to {}",
        backup.display()
    );
    Ok(())
}

fn numbered_backup_path(destination: &Path) -> Result<PathBuf> {
    let name = destination
        .file_name()
        .and_then(|s| s.to_str())
        .ok_or_else(|| anyhow!("destination has no file name: {}", destination.display()))?;
    let parent = destination.parent().unwrap_or_else(|| Path::new("."));
    for n in 1..=999u32 {
        let candidate = parent.join(format!("{name}_Old{n}"));
        if !candidate.exists() {
            return Ok(candidate);
        }
    }
    Err(anyhow!("no free backup name for {}", destination.display()))
}

fn copy_once(source: &Path, destination: &Path) -> Result<()> {
    if source.is_dir() {
        copy_dir_recursive(source, destination)
    } else {
        if let Some(parent) = destination.parent() {
            ensure_dir(parent)?;
        }
        std::fs::copy(source, destination)
            .map(|_| ())
            .with_context(|| format!("copy {} -> {}", source.display(), destination.display()))
    }
}

fn copy_dir_recursive(source: &Path, destination: &Path) -> Result<()> {
    ensure_dir(destination)?;
    for entry in std::fs::read_dir(source)
        .with_context(|| format!("read_dir {}", source.display()))?
    {
        let entry = entry?;
        let target = destination.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target).with_context(|| {
                format!("copy {} -> {}", entry.path().display(), target.display())
            })?;
        }
    }
    Ok(())
}

fn remove_any(path: &Path) {
    if path.is_dir() {
        let _ = std::fs::remove_dir_all(path);
    } else {
        let _ = std::fs::remove_file(path);
    }
}

/// Deletes everything inside `dir`, retrying each entry up to `retries` times
/// with a short sleep, since a just-exited external process can hold a lock
/// briefly. Returns false if anything survived all attempts.
pub fn clean_dir_with_retries(dir: &Path, retries: u32, pause: Duration) -> bool {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(err) => {
            warn!("read_dir {} failed: {err}", dir.display());
            return false;
        }
    };

    let mut all_ok = true;
    for entry in entries.flatten() {
        let path = entry.path();
        let mut removed = false;
        for attempt in 0..=retries {
            let res = if path.is_dir() {
                std::fs::remove_dir_all(&path)
            } else {
                std::fs::remove_file(&path)
            };
            match res {
                Ok(()) => {
                    removed = true;
                    break;
                }
                Err(err) => {
                    if attempt < retries {
                        std::thread::sleep(pause);
                    } else {
                        warn!("could not delete {}: {err}", path.display());
                    }
                }
            }
        }
        all_ok &= removed;
    }
    all_ok
}
