use crate::{embedded_log, util::mtime_utc};
use anyhow::Result;
use std::path::Path;
use time::{Duration, OffsetDateTime};

pub const FINISH_MARKER: &str = "De-multiplexing complete";

#[derive(Debug, Clone)]
pub struct Validation {
    pub valid: bool,
    pub timestamp: Option<OffsetDateTime>,
    pub message: String,
}

/// Confirms the artifact's embedded log carries a finish marker that is still
/// inside the freshness window. A stale marker is indistinguishable from a
/// failed or hung prior run and must not be trusted, so "marker absent" and
/// "marker stale" are reported as distinct failures.
pub fn validate(artifact: &Path, freshness_window_minutes: u64) -> Result<Validation> {
    validate_at(artifact, freshness_window_minutes, OffsetDateTime::now_utc())
}

pub fn validate_at(
    artifact: &Path,
    freshness_window_minutes: u64,
    now: OffsetDateTime,
) -> Result<Validation> {
    let entries = embedded_log::read_entries(artifact)?;

    let marker_index = entries
        .iter()
        .rposition(|e| e.message.contains(FINISH_MARKER));
    let Some(idx) = marker_index else {
        return Ok(Validation {
            valid: false,
            timestamp: None,
            message: format!("no '{FINISH_MARKER}' entry in {}", artifact.display()),
        });
    };

    // Timestamp resolution: the marker entry's own stamp, else the first
    // stamped entry after it, else the artifact's mtime.
    let timestamp = entries[idx]
        .timestamp
        .or_else(|| entries[idx + 1..].iter().find_map(|e| e.timestamp))
        .or_else(|| mtime_utc(artifact));

    let Some(ts) = timestamp else {
        return Ok(Validation {
            valid: false,
            timestamp: None,
            message: format!(
                "finish marker present but no timestamp could be determined for {}",
                artifact.display()
            ),
        });
    };

    let age = now - ts;
    let window = Duration::minutes(freshness_window_minutes as i64);
    if age < window {
        Ok(Validation {
            valid: true,
            timestamp: Some(ts),
            message: format!("finish marker at {ts} is within {freshness_window_minutes} min"),
        })
    } else {
        Ok(Validation {
            valid: false,
            timestamp: Some(ts),
            message: format!(
                "finish marker at {ts} is stale (older than {freshness_window_minutes} min); \
                 not trusting a prior run"
            ),
        })
    }
}

pub const CALIBRATION_FAILURE_PHRASE: &str = "Calibration failed";

/// A calibration is treated as failed when the failure phrase is the last
/// non-blank line of its log. Earlier occurrences do not count; a log that
/// once failed and then continued is not poisoned forever.
pub fn calibration_failed(log_text: &str, failure_phrase: &str) -> bool {
    log_text
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .map(|l| l.contains(failure_phrase))
        .unwrap_or(false)
}

/// Reads a calibration log from disk and applies the last-non-blank-line
/// rule. A missing or unreadable log is not a failure.
pub fn calibration_log_failed(log_path: &Path) -> bool {
    match std::fs::read_to_string(log_path) {
        Ok(text) => calibration_failed(&text, CALIBRATION_FAILURE_PHRASE),
        Err(_) => false,
    }
}
