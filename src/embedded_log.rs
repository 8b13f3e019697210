use crate::util::parse_rfc3339;
use anyhow::{Context, Result};
use std::path::Path;
use time::OffsetDateTime;

/// One entry of the append-only log the external tool embeds in its output
/// artifacts. Entries are `RFC3339<TAB>message` lines; anything else in the
/// artifact is ignored.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: Option<OffsetDateTime>,
    pub message: String,
}

/// Scans an artifact for well-formed log entries, in file order. The artifact
/// may contain binary data around the log region; non-matching lines are
/// skipped. Lines whose timestamp fails to parse are kept with no timestamp so
/// marker detection still works.
pub fn read_entries(artifact: &Path) -> Result<Vec<LogEntry>> {
    let bytes = std::fs::read(artifact)
        .with_context(|| format!("reading artifact log: {}", artifact.display()))?;
    let text = String::from_utf8_lossy(&bytes);

    let mut entries = Vec::new();
    for line in text.lines() {
        let Some((stamp, message)) = line.split_once('\t') else {
            continue;
        };
        let message = message.trim();
        if message.is_empty() {
            continue;
        }
        // Only lines that at least look like a timestamped entry count;
        // a leading date digit keeps binary noise out.
        if !stamp.trim().starts_with(|c: char| c.is_ascii_digit()) {
            continue;
        }
        entries.push(LogEntry {
            timestamp: parse_rfc3339(stamp),
            message: message.to_string(),
        });
    }
    Ok(entries)
}

/// Highest `N` among "Demultiplexed frame N" entries, if any.
pub fn max_completed_frame(entries: &[LogEntry]) -> Option<u64> {
    const PREFIX: &str = "Demultiplexed frame ";
    entries
        .iter()
        .filter_map(|e| e.message.strip_prefix(PREFIX))
        .filter_map(|rest| rest.trim().parse::<u64>().ok())
        .max()
}
