//! Types for the approval flow.
//!
//! `ApprovalRequest` is what the agent proposes, `RemoteApprovalRequest` and
//! `ApprovalReply` are what crosses the wire to the approving participant,
//! and `ResolvedOutcome` is the one terminal result every request ends in.

use crate::participants::Participant;
use serde::{Deserialize, Serialize};
use std::fmt;

/// RPC method the approving participant's client answers.
pub const APPROVAL_RPC_METHOD: &str = "requestApproval";

/// `type` field of the remote request for calendar proposals.
pub const CALENDAR_EVENT_REQUEST_TYPE: &str = "create_calendar_event";

pub const REASON_TIMED_OUT: &str = "User did not respond in time";
pub const REASON_UNREACHABLE: &str = "Failed to reach user for approval";
pub const REASON_NOT_CONNECTED: &str =
    "Agent is not connected to the meeting yet; reconnect and try again";

/// The calendar event the agent wants to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// RFC 3339, as supplied by the model
    pub start_time: String,
    /// RFC 3339, as supplied by the model
    pub end_time: String,
    #[serde(default)]
    pub attendees: Vec<String>,
}

/// Deterministic key identifying "the same proposal".
/// Built from meeting, normalized target, title and start time, never from
/// the request ID, so interrupted-and-repeated tool calls collapse together.
/// Each field is length-prefixed, so no field content can shift into a
/// neighbouring field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn new(meeting_id: &str, target_descriptor: &str, event: &CalendarEvent) -> Self {
        let target = target_descriptor.trim().to_lowercase();
        let key = [meeting_id, target.as_str(), event.title.trim(), event.start_time.trim()]
            .iter()
            .map(|field| format!("{}:{}", field.len(), field))
            .collect::<Vec<_>>()
            .join("|");
        Self(key)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One proposed action awaiting human sign-off. Lives only in memory.
#[derive(Debug, Clone)]
pub struct ApprovalRequest {
    /// Fresh per invocation, used to correlate logs and instructions
    pub request_id: String,
    /// Dedup key
    pub fingerprint: Fingerprint,
    /// Who the model asked to approve, verbatim
    pub target_descriptor: String,
    /// The proposed event. Approvers return a modified copy, never edit this.
    pub payload: CalendarEvent,
}

impl ApprovalRequest {
    pub fn new(meeting_id: &str, target_descriptor: impl Into<String>, payload: CalendarEvent) -> Self {
        let target_descriptor = target_descriptor.into();
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            fingerprint: Fingerprint::new(meeting_id, &target_descriptor, &payload),
            target_descriptor,
            payload,
        }
    }
}

/// Sent to the approving participant's client.
/// `invoked_at` + `timeout_ms` let the client show an accurate countdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteApprovalRequest {
    pub meeting_id: String,
    pub agent_id: String,
    #[serde(rename = "type")]
    pub request_type: String,
    pub target_participant: String,
    pub payload: CalendarEvent,
    /// Epoch milliseconds, stamped right before dispatch
    pub invoked_at: i64,
    pub timeout_ms: u64,
}

/// What the approving participant's client replies with.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalReply {
    pub approved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_payload: Option<CalendarEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Which terminal state produced an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Approved,
    Rejected,
    TimedOut,
    Failed,
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeKind::Approved => write!(f, "approved"),
            OutcomeKind::Rejected => write!(f, "rejected"),
            OutcomeKind::TimedOut => write!(f, "timed_out"),
            OutcomeKind::Failed => write!(f, "failed"),
        }
    }
}

/// Terminal result of one `ApprovalRequest`. Exactly one per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedOutcome {
    pub kind: OutcomeKind,
    pub approved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_payload: Option<CalendarEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_target_identity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_target_name: Option<String>,
}

impl ResolvedOutcome {
    /// Take a well-formed reply verbatim.
    pub fn from_reply(reply: ApprovalReply, target: &Participant) -> Self {
        Self {
            kind: if reply.approved {
                OutcomeKind::Approved
            } else {
                OutcomeKind::Rejected
            },
            approved: reply.approved,
            modified_payload: reply.modified_payload,
            reason: reply.reason,
            resolved_target_identity: None,
            resolved_target_name: None,
        }
        .for_target(target)
    }

    pub fn timed_out(target: &Participant) -> Self {
        Self::unresolved(OutcomeKind::TimedOut, Some(REASON_TIMED_OUT)).for_target(target)
    }

    pub fn unreachable(target: &Participant) -> Self {
        Self::unresolved(OutcomeKind::Failed, Some(REASON_UNREACHABLE)).for_target(target)
    }

    pub fn not_connected(target: &Participant) -> Self {
        Self::unresolved(OutcomeKind::Failed, Some(REASON_NOT_CONNECTED)).for_target(target)
    }

    /// A failure before any participant was resolved.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
            ..Self::unresolved(OutcomeKind::Failed, None)
        }
    }

    fn unresolved(kind: OutcomeKind, reason: Option<&str>) -> Self {
        Self {
            kind,
            approved: false,
            modified_payload: None,
            reason: reason.map(str::to_string),
            resolved_target_identity: None,
            resolved_target_name: None,
        }
    }

    fn for_target(mut self, target: &Participant) -> Self {
        self.resolved_target_identity = Some(target.identity.clone());
        self.resolved_target_name = Some(target.display_name().to_string());
        self
    }
}
