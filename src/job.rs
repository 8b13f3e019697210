use crate::{config::Config, names, names::DatasetKind, progress::ProgressState};
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::info;

/// One dataset's worth of orchestration state. Created per run, never
/// persisted; everything durable lives on the remote store or in the
/// working directory.
pub struct Job {
    pub dataset: String,
    pub kind: DatasetKind,
    pub remote_dir: PathBuf,
    pub work_dir: PathBuf,
    pub bit_depth: u32,
    pub frames_to_sum: u32,
    pub min_pulse_coverage: f32,
    pub out_of_memory: bool,
    /// Console-output error/warning lines already reported, to avoid
    /// duplicate log spam across polling passes.
    pub reported_lines: BTreeSet<String>,
    /// First error line seen, kept separately since the set is unordered.
    pub first_error: Option<String>,
    pub progress: ProgressState,
}

impl Job {
    pub fn new(cfg: &Config, dataset: &str, remote_dir: PathBuf) -> Result<Self> {
        let kind = DatasetKind::from_config(&cfg.global.dataset_kind)
            .ok_or_else(|| anyhow!("unknown dataset_kind: {}", cfg.global.dataset_kind))?;
        Ok(Self {
            dataset: dataset.to_string(),
            kind,
            remote_dir,
            work_dir: PathBuf::from(&cfg.paths.work_dir),
            bit_depth: cfg.tool.bit_depth,
            frames_to_sum: cfg.tool.frames_to_sum,
            min_pulse_coverage: cfg.tool.min_pulse_coverage,
            out_of_memory: false,
            reported_lines: BTreeSet::new(),
            first_error: None,
            progress: ProgressState::default(),
        })
    }

    pub fn staged_input_name(&self) -> String {
        names::staged_input(&self.dataset, self.kind)
    }

    pub fn decoded_output_name(&self) -> String {
        names::decoded_output(&self.dataset, self.kind)
    }

    pub fn local_staged_input(&self) -> PathBuf {
        self.work_dir.join(self.staged_input_name())
    }

    pub fn local_decoded_output(&self) -> PathBuf {
        self.work_dir.join(self.decoded_output_name())
    }

    /// The most specific failure message available from console output: the
    /// out-of-memory condition outranks the first logged error line.
    pub fn console_failure_message(&self) -> Option<String> {
        if self.out_of_memory {
            return Some(format!("tool ran out of memory ({})", crate::progress::OOM_MARKER));
        }
        self.first_error.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Success,
    Failure,
    Skipped,
}

/// Terminal result of one job. Every stage converts its failure into one of
/// these before returning to the caller; nothing throws past the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    pub outcome: Outcome,
    pub message: String,
    pub evaluation: String,
}

impl JobResult {
    pub fn success(message: impl Into<String>, evaluation: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Success,
            message: message.into(),
            evaluation: evaluation.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Failure,
            message: message.into(),
            evaluation: String::new(),
        }
    }

    pub fn skipped(message: impl Into<String>, evaluation: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Skipped,
            message: message.into(),
            evaluation: evaluation.into(),
        }
    }
}

/// Answer to "is this dataset still multiplexed?". Parsing the proprietary
/// metadata that answers it authoritatively lives outside this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MuxState {
    Multiplexed,
    NonMultiplexed,
    Unknown,
}

pub trait MuxProbe {
    fn mux_state(&self, remote_dir: &Path, dataset: &str, kind: DatasetKind) -> MuxState;
}

/// Infers the state from which remote artifacts exist: a decoded output with
/// no multiplexed input (plain or renamed) means a prior run already finished.
pub struct NameBasedProbe;

impl MuxProbe for NameBasedProbe {
    fn mux_state(&self, remote_dir: &Path, dataset: &str, kind: DatasetKind) -> MuxState {
        let staged = remote_dir.join(names::staged_input(dataset, kind));
        let renamed = remote_dir.join(names::renamed_input(dataset, kind));
        let decoded = remote_dir.join(names::decoded_output(dataset, kind));
        if staged.exists() || renamed.exists() {
            MuxState::Multiplexed
        } else if decoded.exists() {
            MuxState::NonMultiplexed
        } else {
            MuxState::Unknown
        }
    }
}

/// Receives the working directory of a failed job for preservation. The real
/// pipeline hands this to the capture framework's archiver; the default moves
/// it under a local failure directory.
pub trait FailureArchiver {
    fn archive(&self, work_dir: &Path, dataset: &str) -> Result<()>;
}

pub struct DirArchiver {
    pub archive_root: PathBuf,
}

impl FailureArchiver for DirArchiver {
    fn archive(&self, work_dir: &Path, dataset: &str) -> Result<()> {
        crate::util::ensure_dir(&self.archive_root)?;
        let stamp = crate::util::now_rfc3339().replace(':', "-");
        let target = self.archive_root.join(format!("{dataset}_{stamp}"));
        let copier = crate::copier::Copier::default();
        if !copier.copy(work_dir, &target, true, 1, false) {
            return Err(anyhow!(
                "archiving work dir failed: {} -> {}",
                work_dir.display(),
                target.display()
            ));
        }
        info!("archived failed work dir to {}", target.display());
        Ok(())
    }
}

/// Progress delivery is synchronous on the supervisor's polling tick, never
/// from the external process itself.
pub trait ProgressObserver {
    fn on_percent(&self, percent: f32);
    fn on_status(&self, message: &str);
}

pub struct LogObserver;

impl ProgressObserver for LogObserver {
    fn on_percent(&self, _percent: f32) {}

    fn on_status(&self, message: &str) {
        info!("{message}");
    }
}
