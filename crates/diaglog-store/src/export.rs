//! Export of the log buffer as a downloadable JSON artifact.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use diaglog_types::{LogEntry, format_timestamp};

use crate::error::Result;

/// Serialize entries as a JSON array with 2-space indentation
pub fn export_json<'a, I>(entries: I) -> Result<String>
where
    I: IntoIterator<Item = &'a LogEntry>,
{
    let entries: Vec<&LogEntry> = entries.into_iter().collect();
    Ok(serde_json::to_string_pretty(&entries)?)
}

/// Parse an artifact produced by [`export_json`]
pub fn parse_export(text: &str) -> Result<Vec<LogEntry>> {
    Ok(serde_json::from_str(text)?)
}

/// Artifact file name: `logs-<ISO8601>.json`, with `-` in place of `:`
/// so the name is valid on every platform
pub fn artifact_name(now: DateTime<Utc>) -> String {
    format!("logs-{}.json", format_timestamp(&now).replace(':', "-"))
}

/// Write the export into `dir`, creating it if needed
pub fn write_artifact<'a, I>(dir: &Path, entries: I, now: DateTime<Utc>) -> Result<PathBuf>
where
    I: IntoIterator<Item = &'a LogEntry>,
{
    let content = export_json(entries)?;
    fs::create_dir_all(dir)?;
    let path = dir.join(artifact_name(now));
    fs::write(&path, content)?;
    Ok(path)
}

/// Load an artifact from disk
pub fn read_artifact(path: &Path) -> Result<Vec<LogEntry>> {
    let text = fs::read_to_string(path)?;
    parse_export(&text)
}
