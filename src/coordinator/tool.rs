//! `create_calendar_event`: the tool the AI model calls.
//!
//! Returns a pending acknowledgment immediately. The real answer arrives
//! later as an injected instruction, once a human has approved or declined.

use crate::approval::types::{ApprovalRequest, CalendarEvent};
use crate::coordinator::{ApprovalCoordinator, Submission};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const TOOL_NAME: &str = "create_calendar_event";

/// Arguments the model supplies.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolArgs {
    /// Who must approve, as the model heard it ("Alice", "the PM")
    pub target_descriptor: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub start_time: String,
    pub end_time: String,
    #[serde(default)]
    pub attendees: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Pending,
    /// An identical proposal is already awaiting approval; its answer covers this call
    Duplicate,
    /// Arguments were not valid JSON for this tool; nothing was started
    Invalid,
}

/// What the model sees as the tool result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolAck {
    pub call_id: String,
    pub status: ToolStatus,
    pub target: String,
    pub message: String,
}

pub struct CalendarEventTool {
    coordinator: Arc<ApprovalCoordinator>,
}

impl CalendarEventTool {
    pub fn new(coordinator: Arc<ApprovalCoordinator>) -> Self {
        Self { coordinator }
    }

    /// Propose an event. Never waits on the approver and never refuses:
    /// a target nobody matches comes back later as a rejection.
    pub fn execute(&self, args: ToolArgs) -> ToolAck {
        let target = args.target_descriptor.trim().to_string();
        let request = ApprovalRequest::new(
            self.coordinator.meeting_id(),
            target.clone(),
            CalendarEvent {
                title: args.title,
                description: args.description,
                start_time: args.start_time,
                end_time: args.end_time,
                attendees: args.attendees,
            },
        );
        let call_id = request.request_id.clone();
        let title = request.payload.title.clone();

        match self.coordinator.submit(request) {
            Submission::Started => ToolAck {
                call_id,
                status: ToolStatus::Pending,
                message: format!(
                    "Asked {} to approve \"{}\". Their answer will come in a follow-up message; tell the user you're waiting on {} and do not call this tool again for the same event.",
                    target, title, target
                ),
                target,
            },
            Submission::Duplicate => ToolAck {
                call_id,
                status: ToolStatus::Duplicate,
                message: format!(
                    "An identical request for \"{}\" is already waiting on {}. No new request was sent; the answer will come in a follow-up message.",
                    title, target
                ),
                target,
            },
        }
    }

    /// Same as `execute`, for raw JSON arguments. Always returns a JSON ack.
    pub fn execute_json(&self, arguments: &str) -> String {
        let ack = match serde_json::from_str::<ToolArgs>(arguments) {
            Ok(args) => self.execute(args),
            Err(e) => invalid(format!("Invalid arguments: {}", e)),
        };
        serde_json::to_string(&ack).unwrap_or_else(|e| {
            tracing::error!("Failed to encode tool ack: {}", e);
            format!(r#"{{"callId":"{}","status":"pending","target":"","message":""}}"#, ack.call_id)
        })
    }
}

fn invalid(message: impl Into<String>) -> ToolAck {
    ToolAck {
        call_id: uuid::Uuid::new_v4().to_string(),
        status: ToolStatus::Invalid,
        target: String::new(),
        message: message.into(),
    }
}
