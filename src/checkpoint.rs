use crate::{copier::Copier, embedded_log, names, names::DatasetKind};
use std::path::Path;
use tracing::{info, warn};

/// Outcome of checkpoint resolution. When resume is not requested the run
/// proceeds from the start; resolution failures are never fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResumeDecision {
    pub resume_requested: bool,
    pub resume_frame: u64,
}

impl ResumeDecision {
    pub fn full_run() -> Self {
        Self {
            resume_requested: false,
            resume_frame: 0,
        }
    }

    pub fn at_frame(frame: u64) -> Self {
        Self {
            resume_requested: true,
            resume_frame: frame,
        }
    }
}

/// Looks for a checkpoint artifact from a prior interrupted run on the remote
/// store and, if usable, determines the frame to resume at. The local copy is
/// a single attempt; a failed copy just disables resume for this run.
pub fn resolve(
    remote_dir: &Path,
    work_dir: &Path,
    dataset: &str,
    kind: DatasetKind,
) -> ResumeDecision {
    let checkpoint = names::checkpoint_name(dataset, kind);
    let remote = remote_dir.join(&checkpoint);
    if !remote.exists() {
        return ResumeDecision::full_run();
    }

    info!("found remote checkpoint {}", remote.display());
    let local = work_dir.join(&checkpoint);
    let copier = Copier::default();
    if !copier.copy(&remote, &local, true, 0, false) {
        warn!("checkpoint copy failed; running from the start");
        return ResumeDecision::full_run();
    }

    let entries = match embedded_log::read_entries(&local) {
        Ok(e) => e,
        Err(err) => {
            warn!("checkpoint log unreadable; running from the start: {err:#}");
            return ResumeDecision::full_run();
        }
    };

    match embedded_log::max_completed_frame(&entries) {
        Some(n) if n > 0 => {
            info!("checkpoint reports frame {n} complete; resuming at frame {}", n + 1);
            ResumeDecision::at_frame(n + 1)
        }
        _ => {
            warn!("checkpoint has no usable completed-frame entry; running from the start");
            ResumeDecision::full_run()
        }
    }
}
