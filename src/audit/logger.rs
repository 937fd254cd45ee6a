//! Audit log writer: append-only JSONL files.
//!
//! Writes to `~/.callgate/logs/{meeting_id}.jsonl`, one JSON object per line.
//! Flushes after every write for crash safety.

use crate::audit::types::LogEntry;
use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Append-only audit logger that writes JSONL files.
pub struct AuditLogger {
    log_path: PathBuf,
    file: File,
    entry_count: usize,
}

impl AuditLogger {
    /// Create a logger for a meeting in the default log directory.
    pub fn new(meeting_id: &str) -> Result<Self> {
        let log_dir = Self::log_directory()?;
        Self::with_path(log_dir.join(format!("{}.jsonl", sanitize(meeting_id))))
    }

    /// Create a logger writing to a specific path.
    pub fn with_path(path: impl AsRef<Path>) -> Result<Self> {
        let log_path = path.as_ref().to_path_buf();
        if let Some(parent) = log_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create log directory: {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .with_context(|| format!("Failed to open log file: {}", log_path.display()))?;

        Ok(Self {
            log_path,
            file,
            entry_count: 0,
        })
    }

    /// Append an entry and flush.
    pub fn log(&mut self, entry: &LogEntry) -> Result<()> {
        let json = serde_json::to_string(entry).context("Failed to serialize log entry")?;
        writeln!(self.file, "{}", json).context("Failed to write log entry")?;
        self.file.flush().context("Failed to flush log file")?;
        self.entry_count += 1;
        Ok(())
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Entries written by this logger (not counting earlier runs).
    pub fn entry_count(&self) -> usize {
        self.entry_count
    }

    /// Default log directory (~/.callgate/logs/).
    pub fn log_directory() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".callgate").join("logs"))
    }
}

/// Meeting IDs come from config; keep them from escaping the log directory.
pub(crate) fn sanitize(meeting_id: &str) -> String {
    meeting_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
