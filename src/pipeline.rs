use crate::{
    checkpoint::{self, ResumeDecision},
    config::Config,
    copier::Copier,
    job::{FailureArchiver, Job, JobResult, MuxProbe, MuxState, ProgressObserver},
    names, reconcile,
    supervisor::{Supervisor, ToolCommand, ToolMode},
    util::ensure_dir,
    validate,
};
use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Top-level state machine for one dataset:
/// `StageInput → {CheckResume} → Invoke → ValidateOutput → Reconcile`,
/// with every failure converted to a `JobResult` before returning. A stage
/// failure from `Invoke` onward routes through the failure branch (staged-copy
/// delete + work-dir archival); a `StageInput` failure is immediately terminal
/// since nothing local exists yet.
pub struct Pipeline<A: FailureArchiver> {
    cfg: Config,
    copier: Copier,
    archiver: A,
}

impl<A: FailureArchiver> Pipeline<A> {
    pub fn new(cfg: &Config, archiver: A) -> Self {
        let copier = Copier::with_backoff(Duration::from_secs(cfg.copy.retry_backoff_seconds));
        Self {
            cfg: cfg.clone(),
            copier,
            archiver,
        }
    }

    pub fn run_job(
        &self,
        dataset: &str,
        remote_dir: &Path,
        probe: &dyn MuxProbe,
        observer: &dyn ProgressObserver,
    ) -> JobResult {
        let mut job = match Job::new(&self.cfg, dataset, remote_dir.to_path_buf()) {
            Ok(j) => j,
            Err(err) => return JobResult::failure(format!("{err:#}")),
        };

        match probe.mux_state(remote_dir, dataset, job.kind) {
            MuxState::NonMultiplexed => {
                info!("dataset {dataset} is not multiplexed; nothing to do");
                return JobResult::skipped("dataset is not multiplexed", "Non-Multiplexed");
            }
            MuxState::Multiplexed | MuxState::Unknown => {}
        }

        // StageInput: terminal on failure, no archival needed.
        let already_renamed = match self.stage_input(&job) {
            Ok(flag) => flag,
            Err(err) => return JobResult::failure(format!("staging input failed: {err:#}")),
        };

        // A prior run's calibration log ending in the failure phrase means
        // that calibration must be redone, not trusted.
        let prior_calibration_failed = self.mode() == Some(ToolMode::CalibrateOnly)
            && validate::calibration_log_failed(&remote_dir.join(names::CALIBRATION_LOG_NAME));
        if prior_calibration_failed {
            warn!("remote calibration log reports a prior failure; re-calibrating");
        }

        let resume = checkpoint::resolve(remote_dir, &job.work_dir, dataset, job.kind);

        if let Err(err) = self.invoke(&mut job, &resume, observer) {
            return self.fail(&job, format!("{err:#}"));
        }

        let decoded = job.local_decoded_output();
        if !decoded.exists() {
            return self.fail(
                &job,
                format!("tool exited cleanly but produced no output: {}", decoded.display()),
            );
        }
        match validate::validate(&decoded, self.cfg.validation.freshness_window_minutes) {
            Ok(v) if v.valid => info!("completion validated: {}", v.message),
            Ok(v) => return self.fail(&job, format!("completion not validated: {}", v.message)),
            Err(err) => return self.fail(&job, format!("completion validation failed: {err:#}")),
        }

        if self.mode() == Some(ToolMode::CalibrateOnly) {
            let local_log = job.work_dir.join(names::CALIBRATION_LOG_NAME);
            if validate::calibration_log_failed(&local_log) {
                return self.fail(
                    &job,
                    format!(
                        "calibration log ends with '{}'",
                        validate::CALIBRATION_FAILURE_PHRASE
                    ),
                );
            }
            reconcile::copy_back_calibration_log(&job, &self.copier);
        }
        if let Err(err) = reconcile::reconcile_success(
            &job,
            &self.copier,
            self.cfg.global.keep_local_artifacts,
        ) {
            // The tool succeeded but the remote store is not reconciled; the
            // job still fails so the next run can pick up the pieces.
            return self.fail(&job, format!("reconciliation failed: {err:#}"));
        }

        let mut evaluation = "De-multiplexed".to_string();
        if resume.resume_requested {
            evaluation = format!("{evaluation}; resumed at frame {}", resume.resume_frame);
        }
        if already_renamed {
            evaluation = format!("{evaluation}; re-run of renamed input");
        }
        if prior_calibration_failed {
            evaluation = format!("{evaluation}; re-calibrated after prior failure");
        }
        JobResult::success("De-multiplexed", evaluation)
    }

    /// Copies the remote multiplexed input into the empty working directory.
    /// A re-run finds the input already under its renamed form; the local copy
    /// always gets the canonical staged name. Returns whether the remote input
    /// was already renamed.
    fn stage_input(&self, job: &Job) -> Result<bool> {
        ensure_dir(&job.work_dir)?;
        if !reconcile::work_dir_is_empty(&job.work_dir) {
            return Err(anyhow!(
                "working directory is not empty: {}",
                job.work_dir.display()
            ));
        }

        let plain = job.remote_dir.join(job.staged_input_name());
        let renamed = job
            .remote_dir
            .join(names::renamed_input(&job.dataset, job.kind));
        let source = if plain.exists() {
            plain
        } else if renamed.exists() {
            renamed
        } else {
            return Err(anyhow!(
                "no multiplexed input found in {}",
                job.remote_dir.display()
            ));
        };
        let already_renamed = source
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| names::is_renamed_form(n, &job.dataset, job.kind));
        if already_renamed {
            info!("remote input already carries its renamed form; staging from it");
        }

        let local = job.local_staged_input();
        if !self.copier.copy(
            &source,
            &local,
            true,
            self.cfg.copy.max_retries,
            self.cfg.copy.backup_existing_destination,
        ) {
            return Err(anyhow!(
                "copy exhausted retries: {} -> {}",
                source.display(),
                local.display()
            ));
        }
        Ok(already_renamed)
    }

    fn invoke(
        &self,
        job: &mut Job,
        resume: &ResumeDecision,
        observer: &dyn ProgressObserver,
    ) -> Result<()> {
        let mode = self
            .mode()
            .ok_or_else(|| anyhow!("unknown tool.mode: {}", self.cfg.tool.mode))?;

        let cmd = ToolCommand {
            exe: PathBuf::from(&self.cfg.tool.exe),
            input: job.local_staged_input(),
            output_dir: None,
            mode,
            frames_to_sum: job.frames_to_sum,
            bit_depth: job.bit_depth,
            min_pulse_coverage: job.min_pulse_coverage,
            checkpoint_dir: job.work_dir.clone(),
            skip_calibration: self.cfg.tool.skip_calibration,
            resume_frame: resume.resume_requested.then_some(resume.resume_frame),
        };

        let supervisor = Supervisor {
            poll_interval: Duration::from_secs(self.cfg.timeouts.poll_interval_seconds),
            status_interval: Duration::from_secs(self.cfg.timeouts.status_interval_seconds),
            max_runtime: Duration::from_secs(self.max_runtime_minutes(mode) * 60),
        };

        job.progress.reset();
        let work_dir = job.work_dir.clone();
        let outcome = supervisor.run(&cmd, &work_dir, job, observer)?;

        if outcome.timed_out {
            return Err(anyhow!(
                "tool exceeded max runtime of {} minutes",
                self.max_runtime_minutes(mode)
            ));
        }
        if !outcome.exit_success {
            let msg = job
                .console_failure_message()
                .unwrap_or_else(|| format!("tool exited with code {}", outcome.exit_code));
            return Err(anyhow!("{msg}"));
        }
        Ok(())
    }

    fn fail(&self, job: &Job, message: String) -> JobResult {
        warn!("job {} failed: {message}", job.dataset);
        reconcile::reconcile_failure(job, &self.archiver);
        JobResult::failure(message)
    }

    fn mode(&self) -> Option<ToolMode> {
        ToolMode::from_config(&self.cfg.tool.mode)
    }

    fn max_runtime_minutes(&self, mode: ToolMode) -> u64 {
        match mode {
            ToolMode::Demux => self.cfg.timeouts.demux_max_runtime_minutes,
            ToolMode::CalibrateOnly => self.cfg.timeouts.calibrate_max_runtime_minutes,
            ToolMode::Convert => self.cfg.timeouts.convert_max_runtime_minutes,
        }
    }
}
