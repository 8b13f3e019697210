use crate::{
    copier::{clean_dir_with_retries, Copier},
    job::{FailureArchiver, Job},
    names,
};
use anyhow::{anyhow, Result};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Success-path reconciliation, in a fixed order so a crash between any two
/// steps leaves the remote store resumable: rename, then checkpoint delete,
/// then copy-back, then local cleanup.
pub fn reconcile_success(job: &Job, copier: &Copier, keep_local_artifacts: bool) -> Result<()> {
    rename_remote_input(job)?;
    delete_remote_checkpoint(job);
    copy_back_decoded(job, copier)?;
    if keep_local_artifacts {
        info!("keeping local artifacts in {}", job.work_dir.display());
    } else {
        cleanup_work_dir(job);
    }
    Ok(())
}

/// Idempotent rename of the remote multiplexed input to its renamed form.
/// A re-run whose input already carries the renamed form skips this step.
fn rename_remote_input(job: &Job) -> Result<()> {
    let renamed = names::renamed_input(&job.dataset, job.kind);
    let renamed_path = job.remote_dir.join(&renamed);
    if renamed_path.exists() {
        info!("remote input already renamed to {renamed}; skipping rename");
        return Ok(());
    }

    let staged = job.remote_dir.join(job.staged_input_name());
    if !staged.exists() {
        // Neither form present: a prior run renamed and something else moved
        // it, or the layout is unexpected. Copy-back still decides the job.
        warn!("remote input missing under both names; skipping rename");
        return Ok(());
    }

    std::fs::rename(&staged, &renamed_path).map_err(|err| {
        anyhow!(
            "renaming remote input {} -> {}: {err}",
            staged.display(),
            renamed_path.display()
        )
    })?;
    info!("renamed remote input to {renamed}");
    Ok(())
}

/// Best effort: a leftover checkpoint only costs disk space, never blocks a
/// subsequent run.
fn delete_remote_checkpoint(job: &Job) {
    let checkpoint = job
        .remote_dir
        .join(names::checkpoint_name(&job.dataset, job.kind));
    if !checkpoint.exists() {
        return;
    }
    match std::fs::remove_file(&checkpoint) {
        Ok(()) => info!("deleted remote checkpoint {}", checkpoint.display()),
        Err(err) => warn!("could not delete remote checkpoint {}: {err}", checkpoint.display()),
    }
}

fn copy_back_decoded(job: &Job, copier: &Copier) -> Result<()> {
    let local = job.local_decoded_output();
    let remote = job.remote_dir.join(job.decoded_output_name());
    if !copier.copy(&local, &remote, true, 3, false) {
        return Err(anyhow!(
            "copying decoded output back to remote store failed: {} -> {}",
            local.display(),
            remote.display()
        ));
    }
    info!("copied decoded output to {}", remote.display());
    Ok(())
}

fn cleanup_work_dir(job: &Job) {
    // The just-exited tool can hold file locks briefly.
    if !clean_dir_with_retries(&job.work_dir, 3, Duration::from_millis(500)) {
        warn!("working directory not fully cleaned: {}", job.work_dir.display());
    }
}

/// Failure path: the staged local copy is multiplexed and worthless, drop it;
/// everything else in the working directory is preserved for inspection.
pub fn reconcile_failure(job: &Job, archiver: &dyn FailureArchiver) {
    let staged = job.local_staged_input();
    if staged.exists() {
        let res = if staged.is_dir() {
            std::fs::remove_dir_all(&staged)
        } else {
            std::fs::remove_file(&staged)
        };
        if let Err(err) = res {
            warn!("could not delete staged copy {}: {err}", staged.display());
        }
    }

    if let Err(err) = archiver.archive(&job.work_dir, &job.dataset) {
        warn!("failure archival failed: {err:#}");
    }
}

/// Calibrate-only runs also return the tool's calibration log when present.
pub fn copy_back_calibration_log(job: &Job, copier: &Copier) {
    let local = job.work_dir.join(names::CALIBRATION_LOG_NAME);
    if !local.exists() {
        return;
    }
    let remote = job.remote_dir.join(names::CALIBRATION_LOG_NAME);
    if !copier.copy(&local, &remote, true, 3, false) {
        warn!("could not copy {} to remote store", names::CALIBRATION_LOG_NAME);
    }
}

pub fn work_dir_is_empty(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false)
}
