//! `callgate log`: browse the outcome audit log.
//!
//! Shows every proposal the agent made in a meeting and how it ended.

use crate::approval::types::OutcomeKind;
use crate::audit::{AuditReader, LogFilter};
use anyhow::{bail, Context, Result};
use colored::Colorize;

/// Run the `callgate log` command.
pub fn run_log(
    meeting_id: Option<&str>,
    outcome_filter: Option<&str>,
    target_filter: Option<&str>,
    limit: Option<usize>,
    summary_only: bool,
) -> Result<()> {
    let reader = AuditReader::new().context("Failed to initialize log reader")?;

    let entries = if let Some(id) = meeting_id {
        reader
            .read_meeting(id)
            .with_context(|| format!("Failed to read meeting log: {}", id))?
    } else {
        let entries = reader.read_latest_meeting()?;
        if entries.is_empty() {
            println!();
            println!("  {} No audit logs found.", "ℹ".blue());
            println!("  Host a meeting first:");
            println!("    {}", "callgate serve --config .callgate.yaml".dimmed());
            println!();
            return Ok(());
        }
        entries
    };

    let outcome = match outcome_filter {
        Some(raw) => match OutcomeKind::from_str_loose(raw) {
            Some(kind) => Some(kind),
            None => bail!(
                "Unknown outcome '{}' (expected approved, rejected, timed_out or failed)",
                raw
            ),
        },
        None => None,
    };

    let filter = LogFilter {
        outcome,
        target: target_filter.map(|t| t.to_string()),
        limit,
    };
    let filtered = AuditReader::filter_entries(&entries, &filter);
    let summary = AuditReader::summarize(&entries);

    println!();
    if summary_only {
        println!("  Meeting: {}", summary.meeting_id.cyan());
        println!();
        println!(
            "  {} total | {} approved | {} rejected | {} timed out | {} failed",
            summary.total.to_string().bold(),
            summary.approved.to_string().green().bold(),
            summary.rejected.to_string().red().bold(),
            summary.timed_out.to_string().yellow().bold(),
            summary.failed.to_string().red(),
        );
        if let (Some(start), Some(end)) = (summary.start_time, summary.end_time) {
            println!(
                "  Duration: {}",
                format_duration((end - start).num_seconds())
            );
        }
    } else {
        println!("  Meeting: {}", summary.meeting_id.cyan());
        println!();
        for entry in &filtered {
            println!("  {}", AuditReader::format_entry(entry));
        }
        println!();
        println!(
            "  {} {}",
            "─".repeat(40).dimmed(),
            summary.one_line().dimmed()
        );
    }
    println!();

    Ok(())
}

/// List meetings that have a log.
pub fn run_log_list() -> Result<()> {
    let reader = AuditReader::new()?;
    let meetings = reader.list_meetings()?;

    println!();
    if meetings.is_empty() {
        println!("  {} No meetings found.", "ℹ".blue());
    } else {
        println!("  {} Meetings with logs:", "📋".to_string().bold());
        println!();
        for meeting in &meetings {
            println!("  • {}", meeting);
        }
        println!();
        println!("  View one: {}", "callgate log --meeting <id>".dimmed());
    }
    println!();

    Ok(())
}

fn format_duration(seconds: i64) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    }
}
