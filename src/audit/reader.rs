//! Audit log reader: filter and display meeting logs for `callgate log`.

use crate::approval::types::OutcomeKind;
use crate::audit::logger::sanitize;
use crate::audit::types::*;
use anyhow::{Context, Result};
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};

/// Reads and queries audit log files.
pub struct AuditReader {
    log_dir: PathBuf,
}

impl AuditReader {
    /// Create a reader using the default log directory.
    pub fn new() -> Result<Self> {
        let log_dir = crate::audit::logger::AuditLogger::log_directory()?;
        Ok(Self { log_dir })
    }

    /// Create a reader for a specific directory.
    pub fn with_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            log_dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Read all entries for a meeting.
    pub fn read_meeting(&self, meeting_id: &str) -> Result<Vec<LogEntry>> {
        let path = self.log_dir.join(format!("{}.jsonl", sanitize(meeting_id)));
        Self::read_file(&path)
    }

    /// Read entries from a specific log file.
    pub fn read_file(path: &Path) -> Result<Vec<LogEntry>> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read log file: {}", path.display()))?;

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .enumerate()
            .map(|(i, line)| {
                serde_json::from_str(line)
                    .with_context(|| format!("Failed to parse log entry at line {}", i + 1))
            })
            .collect()
    }

    /// Read entries from the most recently written meeting log.
    pub fn read_latest_meeting(&self) -> Result<Vec<LogEntry>> {
        if !self.log_dir.exists() {
            return Ok(Vec::new());
        }

        let mut paths: Vec<PathBuf> = fs::read_dir(&self.log_dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|e| e == "jsonl"))
            .collect();

        paths.sort_by(|a, b| {
            let a_time = fs::metadata(a).and_then(|m| m.modified()).ok();
            let b_time = fs::metadata(b).and_then(|m| m.modified()).ok();
            b_time.cmp(&a_time)
        });

        match paths.first() {
            Some(path) => Self::read_file(path),
            None => Ok(Vec::new()),
        }
    }

    /// List meetings that have a log.
    pub fn list_meetings(&self) -> Result<Vec<String>> {
        if !self.log_dir.exists() {
            return Ok(Vec::new());
        }

        let mut meetings: Vec<String> = fs::read_dir(&self.log_dir)?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "jsonl"))
            .filter_map(|e| {
                e.path()
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
            })
            .collect();

        meetings.sort();
        Ok(meetings)
    }

    pub fn filter_entries(entries: &[LogEntry], filter: &LogFilter) -> Vec<LogEntry> {
        entries
            .iter()
            .filter(|e| filter.outcome.map_or(true, |o| e.outcome == o))
            .filter(|e| {
                filter.target.as_deref().map_or(true, |t| {
                    e.target.eq_ignore_ascii_case(t)
                        || e.resolved_identity.as_deref() == Some(t)
                })
            })
            .take(filter.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    pub fn summarize(entries: &[LogEntry]) -> MeetingSummary {
        let mut summary = MeetingSummary::default();

        if let Some(first) = entries.first() {
            summary.meeting_id = first.meeting_id.clone();
            summary.start_time = Some(first.timestamp);
        }
        if let Some(last) = entries.last() {
            summary.end_time = Some(last.timestamp);
        }

        summary.total = entries.len();
        for entry in entries {
            match entry.outcome {
                OutcomeKind::Approved => summary.approved += 1,
                OutcomeKind::Rejected => summary.rejected += 1,
                OutcomeKind::TimedOut => summary.timed_out += 1,
                OutcomeKind::Failed => summary.failed += 1,
            }
        }

        summary
    }

    /// Pretty-print a log entry for terminal display.
    pub fn format_entry(entry: &LogEntry) -> String {
        let timestamp = entry.timestamp.format("%H:%M:%S").to_string();
        let outcome = match entry.outcome {
            OutcomeKind::Approved => "APPROVED".green().to_string(),
            OutcomeKind::Rejected => "REJECTED".red().to_string(),
            OutcomeKind::TimedOut => "TIMED OUT".yellow().to_string(),
            OutcomeKind::Failed => "FAILED".red().dimmed().to_string(),
        };

        let mut line = format!(
            "[{}] {} \"{}\" @ {} -> {}",
            timestamp.dimmed(),
            outcome,
            entry.title.bold(),
            entry.start_time,
            entry.resolved_identity.as_deref().unwrap_or(&entry.target)
        );

        if entry.modified {
            line.push_str(&format!(" {}", "(edited)".cyan()));
        }
        if let Some(ref reason) = entry.reason {
            line.push_str(&format!(" ({})", reason.dimmed()));
        }

        line
    }
}
