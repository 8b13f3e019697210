use anyhow::{Context, Result};
use std::path::Path;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

pub fn ensure_dir(p: &Path) -> Result<()> {
    std::fs::create_dir_all(p).with_context(|| format!("create_dir_all {}", p.display()))
}

pub fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

pub fn parse_rfc3339(s: &str) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(s.trim(), &Rfc3339).ok()
}

/// Last-modified time of a path as UTC, or `None` if the file is missing or
/// the platform reports no mtime.
pub fn mtime_utc(p: &Path) -> Option<OffsetDateTime> {
    let meta = std::fs::metadata(p).ok()?;
    let mtime = meta.modified().ok()?;
    Some(OffsetDateTime::from(mtime))
}
