//! Append-only log of failed focus attempts.
//!
//! One JSON object per line so the file can be grepped or fed to `jq`.

use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Serialize)]
struct Entry<'a> {
    timestamp: String,
    project: &'a str,
    outcome: &'a str,
    detail: &'a str,
}

/// Writer for the focus error log
#[derive(Debug, Clone)]
pub struct ErrorLog {
    path: Option<PathBuf>,
}

impl ErrorLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// Log that only goes to tracing.
    pub fn disabled() -> Self {
        Self { path: None }
    }

    /// `~/.local/state/hook-notifier/focus-errors.log`
    pub fn default_path() -> Option<PathBuf> {
        dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .map(|dir| dir.join("hook-notifier").join("focus-errors.log"))
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append one entry. Write failures are logged and otherwise ignored.
    pub fn record(&self, project: &str, outcome: &str, detail: &str) {
        let Some(path) = &self.path else {
            return;
        };
        let entry = Entry {
            timestamp: chrono::Local::now().to_rfc3339(),
            project,
            outcome,
            detail,
        };
        if let Err(e) = append(path, &entry) {
            warn!(path = %path.display(), error = %e, "Failed to write focus error log");
        }
    }
}

fn append(path: &Path, entry: &Entry<'_>) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let line = serde_json::to_string(entry)?;
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{line}")?;
    Ok(())
}
