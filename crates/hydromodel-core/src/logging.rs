//! Export log file.
//!
//! Every export appends its report to `runs/Log/export.log` so the operator
//! can see what was written (and what was not) long after the terminal is gone.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use chrono::Utc;

/// Format current UTC time as ISO 8601 with milliseconds (e.g. 2026-02-04T10:15:30.123Z).
fn utc_timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Append-only log file. Writes are dropped when the file could not be opened.
#[derive(Debug)]
pub struct ExportLog {
    file: Option<File>,
}

impl ExportLog {
    /// Open (or create) the log at `path`, creating its directory.
    ///
    /// Failure to open is logged and yields a log that discards lines.
    pub fn open(path: &Path) -> Self {
        let file = path
            .parent()
            .map_or(Ok(()), std::fs::create_dir_all)
            .and_then(|_| OpenOptions::new().create(true).append(true).open(path));

        match file {
            Ok(file) => Self { file: Some(file) },
            Err(err) => {
                log::warn!("Could not open export log {}: {err}", path.display());
                Self::disabled()
            }
        }
    }

    pub fn disabled() -> Self {
        Self { file: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.file.is_some()
    }

    /// Write a timestamped line.
    pub fn line(&mut self, level: &str, message: &str) {
        if let Some(ref mut file) = self.file {
            let ts = utc_timestamp();
            let _ = writeln!(file, "[{}] {}: {}", ts, level, message);
            let _ = file.flush();
        }
    }
}
