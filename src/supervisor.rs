use crate::{job::Job, job::ProgressObserver, progress};
use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use tracing::{info, warn};

pub const CONSOLE_OUTPUT_NAME: &str = "demux_console_output.txt";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolMode {
    Demux,
    CalibrateOnly,
    Convert,
}

impl ToolMode {
    pub fn from_config(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "demux" => Some(Self::Demux),
            "calibrate_only" => Some(Self::CalibrateOnly),
            "convert" => Some(Self::Convert),
            _ => None,
        }
    }
}

/// Immutable description of one external-tool invocation, validated at
/// construction. All argument assembly lives here so the orchestrator never
/// touches raw flag strings.
#[derive(Debug, Clone)]
pub struct ToolCommand {
    pub exe: PathBuf,
    pub input: PathBuf,
    pub output_dir: Option<PathBuf>,
    pub mode: ToolMode,
    pub frames_to_sum: u32,
    pub bit_depth: u32,
    pub min_pulse_coverage: f32,
    pub checkpoint_dir: PathBuf,
    pub skip_calibration: bool,
    pub resume_frame: Option<u64>,
}

impl ToolCommand {
    pub fn validate(&self) -> Result<()> {
        if !self.exe.exists() {
            return Err(anyhow!("tool executable not found: {}", self.exe.display()));
        }
        if self.bit_depth == 0 {
            return Err(anyhow!("bit_depth must be positive"));
        }
        if self.frames_to_sum == 0 {
            return Err(anyhow!("frames_to_sum must be positive"));
        }
        if self.mode == ToolMode::Demux
            && !(0.0..=1.0).contains(&self.min_pulse_coverage)
        {
            return Err(anyhow!("min_pulse_coverage must be within 0..=1"));
        }
        Ok(())
    }

    pub fn args(&self) -> Vec<String> {
        let mut args = vec![self.input.display().to_string()];
        if let Some(out) = &self.output_dir {
            args.push("-outDir".into());
            args.push(out.display().to_string());
        }
        match self.mode {
            ToolMode::Demux => {
                args.push("-demux".into());
                args.push("-minPulseCoverage".into());
                args.push(format!("{}", self.min_pulse_coverage));
            }
            ToolMode::CalibrateOnly => args.push("-calibrateOnly".into()),
            ToolMode::Convert => args.push("-convert".into()),
        }
        args.push("-framesToSum".into());
        args.push(self.frames_to_sum.to_string());
        args.push("-bitDepth".into());
        args.push(self.bit_depth.to_string());
        args.push("-checkpointDir".into());
        args.push(self.checkpoint_dir.display().to_string());
        if self.skip_calibration {
            args.push("-skipCalibration".into());
        }
        if let Some(frame) = self.resume_frame {
            args.push("-resumeFrame".into());
            args.push(frame.to_string());
        }
        args
    }
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub exit_success: bool,
    pub exit_code: i32,
    pub timed_out: bool,
}

pub struct Supervisor {
    pub poll_interval: Duration,
    pub status_interval: Duration,
    pub max_runtime: Duration,
}

impl Supervisor {
    /// Launches the tool bound to the working directory with console output
    /// redirected to a file, then polls it to completion: each tick re-parses
    /// the console output and notifies the observer; a status line goes out at
    /// most once per status interval; the wall-clock cap kills the process.
    ///
    /// Exit code alone is not trusted: a clean exit with logged errors or the
    /// out-of-memory flag set still reports failure.
    pub fn run(
        &self,
        cmd: &ToolCommand,
        work_dir: &Path,
        job: &mut Job,
        observer: &dyn ProgressObserver,
    ) -> Result<RunOutcome> {
        cmd.validate()?;
        let console_path = work_dir.join(CONSOLE_OUTPUT_NAME);
        let console_file = std::fs::File::create(&console_path)
            .with_context(|| format!("create console output: {}", console_path.display()))?;
        let console_err = console_file
            .try_clone()
            .with_context(|| "clone console output handle")?;

        let tool_name = cmd
            .exe
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| cmd.exe.display().to_string());

        info!("launching {tool_name} {:?}", cmd.args());
        let mut child = Command::new(&cmd.exe)
            .args(cmd.args())
            .current_dir(work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::from(console_file))
            .stderr(Stdio::from(console_err))
            .spawn()
            .with_context(|| format!("spawning {}", cmd.exe.display()))?;

        let started = Instant::now();
        let mut last_poll = Instant::now();
        let mut last_status = Instant::now();
        let slice = Duration::from_millis(100);

        let status = loop {
            if let Some(status) = child.try_wait().with_context(|| "try_wait")? {
                break status;
            }

            if started.elapsed() > self.max_runtime {
                warn!("{tool_name} exceeded max runtime {:?}; killing", self.max_runtime);
                let _ = child.kill();
                let _ = child.wait();
                progress::parse(job, &console_path);
                return Ok(RunOutcome {
                    exit_success: false,
                    exit_code: -1,
                    timed_out: true,
                });
            }

            if last_poll.elapsed() >= self.poll_interval {
                last_poll = Instant::now();
                progress::parse(job, &console_path);
                observer.on_percent(job.progress.percent);

                if last_status.elapsed() >= self.status_interval {
                    last_status = Instant::now();
                    job.progress.last_status = Some(time::OffsetDateTime::now_utc());
                    let minutes = started.elapsed().as_secs() / 60;
                    observer.on_status(&format!(
                        "{tool_name} running; {minutes} minutes elapsed, {:.0}% complete",
                        job.progress.percent
                    ));
                }
            }

            std::thread::sleep(slice);
        };

        // Final pass picks up whatever the tool wrote on its way out.
        progress::parse(job, &console_path);
        observer.on_percent(job.progress.percent);

        let exit_code = status.code().unwrap_or(-1);
        let mut exit_success = status.success();
        if exit_success && (job.out_of_memory || job.console_failure_message().is_some()) {
            warn!("{tool_name} exited 0 but console output reported errors");
            exit_success = false;
        }

        Ok(RunOutcome {
            exit_success,
            exit_code,
            timed_out: false,
        })
    }
}
