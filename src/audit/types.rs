//! Types for the outcome audit log.
//!
//! One entry per dispatched approval outcome, approved or not.

use crate::approval::types::{ApprovalRequest, OutcomeKind, ResolvedOutcome};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single entry in the audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// When the outcome was dispatched
    pub timestamp: DateTime<Utc>,

    pub meeting_id: String,

    /// Request ID the agent saw in its tool result
    pub request_id: String,

    /// Who the model asked for
    pub target: String,

    /// Identity the request actually went to (absent when resolution failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_identity: Option<String>,

    pub title: String,

    pub start_time: String,

    pub outcome: OutcomeKind,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Whether the approver edited the event before approving
    #[serde(default)]
    pub modified: bool,
}

impl LogEntry {
    pub fn from_outcome(
        meeting_id: &str,
        request: &ApprovalRequest,
        outcome: &ResolvedOutcome,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let event = outcome.modified_payload.as_ref().unwrap_or(&request.payload);
        Self {
            timestamp,
            meeting_id: meeting_id.to_string(),
            request_id: request.request_id.clone(),
            target: request.target_descriptor.clone(),
            resolved_identity: outcome.resolved_target_identity.clone(),
            title: event.title.clone(),
            start_time: event.start_time.clone(),
            outcome: outcome.kind,
            reason: outcome.reason.clone(),
            modified: outcome.modified_payload.is_some(),
        }
    }
}

/// Summary statistics for a meeting's audit log.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeetingSummary {
    pub meeting_id: String,
    pub total: usize,
    pub approved: usize,
    pub rejected: usize,
    pub timed_out: usize,
    pub failed: usize,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl MeetingSummary {
    /// Format as a human-readable one-liner for terminal output.
    pub fn one_line(&self) -> String {
        format!(
            "{} proposals | {} approved | {} rejected | {} timed out | {} failed",
            self.total, self.approved, self.rejected, self.timed_out, self.failed
        )
    }
}

/// Filter criteria for querying audit logs.
#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    pub outcome: Option<OutcomeKind>,
    pub target: Option<String>,
    pub limit: Option<usize>,
}

impl OutcomeKind {
    /// Parse an outcome filter from the command line.
    pub fn from_str_loose(s: &str) -> Option<OutcomeKind> {
        match s.to_lowercase().trim() {
            "approved" | "approve" | "yes" => Some(OutcomeKind::Approved),
            "rejected" | "reject" | "declined" | "denied" | "no" => Some(OutcomeKind::Rejected),
            "timed_out" | "timeout" | "timed-out" => Some(OutcomeKind::TimedOut),
            "failed" | "error" => Some(OutcomeKind::Failed),
            _ => None,
        }
    }
}
