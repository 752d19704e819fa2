//! Append-only activity log for sync runs.
//!
//! One line per event: `[<RFC 3339 timestamp>] LEVEL: message`. Every entry
//! is mirrored as a `tracing` event at the matching level, so operators get
//! a durable per-run history while `RUST_LOG` still controls console output.
//! A failed append is reported through `tracing` and otherwise ignored.

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityLevel {
    Info,
    Warning,
    Error,
}

impl fmt::Display for ActivityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ActivityLevel::Info => "INFO",
            ActivityLevel::Warning => "WARNING",
            ActivityLevel::Error => "ERROR",
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct ActivityLog {
    path: Option<PathBuf>,
}

impl ActivityLog {
    /// Log appending to `path`; parent directories are created on first write.
    pub fn to_file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// Log that only emits `tracing` events.
    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.record(ActivityLevel::Info, message.as_ref());
    }

    pub fn warning(&self, message: impl AsRef<str>) {
        self.record(ActivityLevel::Warning, message.as_ref());
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.record(ActivityLevel::Error, message.as_ref());
    }

    pub fn record(&self, level: ActivityLevel, message: &str) {
        match level {
            ActivityLevel::Info => info!(target: "docsync::activity", "{}", message),
            ActivityLevel::Warning => warn!(target: "docsync::activity", "{}", message),
            ActivityLevel::Error => error!(target: "docsync::activity", "{}", message),
        }

        let Some(path) = &self.path else {
            return;
        };
        if let Err(e) = append_line(path, &format_line(level, message)) {
            warn!(path = %path.display(), error = %e, "failed to append to activity log");
        }
    }
}

fn format_line(level: ActivityLevel, message: &str) -> String {
    let ts = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    format!("[{}] {}: {}\n", ts, level, message)
}

fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(line.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn lines_are_appended_in_documented_format() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("logs").join("sync.log");
        let log = ActivityLog::to_file(&path);

        log.info("Starting sync of 2 documents");
        log.error("Failed to download a.pdf");

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with('['));
        assert!(lines[0].ends_with("] INFO: Starting sync of 2 documents"));
        assert!(lines[1].ends_with("] ERROR: Failed to download a.pdf"));

        let ts = &lines[0][1..lines[0].find(']').unwrap()];
        assert!(chrono::DateTime::parse_from_rfc3339(ts).is_ok());
    }

    #[test]
    fn existing_content_is_preserved() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("sync.log");
        std::fs::write(&path, "[2024-01-01T00:00:00.000Z] INFO: earlier run\n").unwrap();

        ActivityLog::to_file(&path).warning("folder listing truncated");

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("[2024-01-01T00:00:00.000Z] INFO: earlier run\n"));
        assert!(content.contains("WARNING: folder listing truncated"));
    }

    #[test]
    fn disabled_log_writes_nothing() {
        let log = ActivityLog::disabled();
        assert!(log.path().is_none());
        log.info("nothing to see");
    }
}
