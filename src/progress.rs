use crate::job::Job;
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;
use time::OffsetDateTime;
use tracing::{error, warn};

pub const OOM_MARKER: &str = "OutOfMemoryException";

/// Per-job progress snapshot. Mutated only by `parse` during polling; reset at
/// job start. The displayed percentage is the greater of the tool's explicit
/// "N%" marker and the computed frames ratio, so it never moves backward
/// within a polling pass.
#[derive(Debug, Clone, Default)]
pub struct ProgressState {
    pub percent: f32,
    pub total_frames: Option<u64>,
    pub current_frame: Option<u64>,
    pub last_update: Option<OffsetDateTime>,
    pub last_status: Option<OffsetDateTime>,
}

impl ProgressState {
    pub fn reset(&mut self) {
        *self = ProgressState::default();
    }
}

fn percent_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d{1,3})%").unwrap())
}

fn total_frames_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)total frames to process:\s*(\d+)").unwrap())
}

fn current_frame_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)demultiplexing frame\s*(\d+)").unwrap())
}

/// Re-reads the tool's console-output file and folds any new information into
/// the job. Parsing is advisory: any failure is logged once and treated as "no
/// new progress this pass", never raised.
pub fn parse(job: &mut Job, console_output: &Path) {
    let text = match std::fs::read(console_output) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(err) => {
            let msg = format!("console output unreadable: {err}");
            if job.reported_lines.insert(msg.clone()) {
                warn!("{msg}");
            }
            return;
        }
    };

    let mut explicit_percent: Option<f32> = None;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if line.starts_with("Error") || line.starts_with("Exception") {
            if job.reported_lines.insert(line.to_string()) {
                error!("tool error: {line}");
                if job.first_error.is_none() {
                    job.first_error = Some(line.to_string());
                }
            }
            if line.contains(OOM_MARKER) {
                job.out_of_memory = true;
            }
            continue;
        }

        if line.starts_with("Warning") {
            if job.reported_lines.insert(line.to_string()) {
                warn!("tool warning: {line}");
            }
            continue;
        }

        if let Some(cap) = percent_re().captures(line) {
            if let Ok(p) = cap[1].parse::<f32>() {
                explicit_percent = Some(p.min(100.0));
            }
        }
        if let Some(cap) = total_frames_re().captures(line) {
            if let Ok(n) = cap[1].parse::<u64>() {
                job.progress.total_frames = Some(n);
            }
        }
        if let Some(cap) = current_frame_re().captures(line) {
            if let Ok(n) = cap[1].parse::<u64>() {
                job.progress.current_frame = Some(n);
            }
        }
    }

    let ratio = match (job.progress.current_frame, job.progress.total_frames) {
        (Some(cur), Some(total)) if total > 0 => Some(cur as f32 / total as f32 * 100.0),
        _ => None,
    };

    let mut percent = job.progress.percent;
    if let Some(p) = explicit_percent {
        percent = percent.max(p);
    }
    if let Some(r) = ratio {
        percent = percent.max(r.min(100.0));
    }

    if percent > job.progress.percent {
        job.progress.percent = percent;
        job.progress.last_update = Some(OffsetDateTime::now_utc());
    }
}
