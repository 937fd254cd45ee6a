//! Outcome dispatcher: turns a resolved approval into a new agent turn.
//!
//! The model never waits on the human. Once an approval resolves, we inject
//! an instruction describing the result and the agent speaks it. Every
//! instruction carries the request ID so several concurrent proposals stay
//! distinguishable in the conversation history.

use crate::approval::types::{ApprovalRequest, ResolvedOutcome};
use crate::audit::{AuditLogger, LogEntry};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;

/// The conversational engine that speaks on the agent's behalf.
#[async_trait]
pub trait ConversationEngine {
    /// Start a new agent turn driven by `text`. Fire-and-forget.
    async fn inject_instruction(&self, text: &str) -> Result<()>;
}

pub struct OutcomeDispatcher {
    engine: Arc<dyn ConversationEngine + Send + Sync>,
    meeting_id: String,
    audit: Option<Arc<Mutex<AuditLogger>>>,
}

impl OutcomeDispatcher {
    pub fn new(engine: Arc<dyn ConversationEngine + Send + Sync>, meeting_id: impl Into<String>) -> Self {
        Self {
            engine,
            meeting_id: meeting_id.into(),
            audit: None,
        }
    }

    /// Also record every dispatched outcome in an audit log.
    pub fn with_audit(mut self, logger: AuditLogger) -> Self {
        self.audit = Some(Arc::new(Mutex::new(logger)));
        self
    }

    /// Inform the agent of `outcome`. Failures are logged, never returned:
    /// the outcome is already settled and the queue must keep moving.
    pub async fn dispatch(&self, outcome: &ResolvedOutcome, request: &ApprovalRequest) {
        let instruction = format_instruction(outcome, request);

        if let Err(e) = self.engine.inject_instruction(&instruction).await {
            tracing::error!(request_id = %request.request_id, "Failed to inject outcome instruction: {}", e);
        } else {
            tracing::info!(request_id = %request.request_id, outcome = %outcome.kind, "Outcome dispatched");
        }

        if let Some(ref audit) = self.audit {
            let entry = LogEntry::from_outcome(&self.meeting_id, request, outcome, Utc::now());
            if let Err(e) = audit.lock().await.log(&entry) {
                tracing::error!("Failed to write audit log: {}", e);
            }
        }
    }
}

/// Build the instruction the agent will speak for `outcome`.
pub fn format_instruction(outcome: &ResolvedOutcome, request: &ApprovalRequest) -> String {
    let who = outcome
        .resolved_target_name
        .as_deref()
        .unwrap_or(request.target_descriptor.as_str());

    if outcome.approved {
        let event = outcome.modified_payload.as_ref().unwrap_or(&request.payload);
        format!(
            "[request {}] Tell the user that {} approved the calendar event \"{}\" and it is scheduled for {}.",
            request.request_id,
            who,
            event.title,
            format_when(&event.start_time)
        )
    } else {
        let because = match outcome.reason.as_deref() {
            Some(reason) if !reason.trim().is_empty() => format!(" (reason: {})", reason.trim()),
            _ => String::new(),
        };
        format!(
            "[request {}] Tell the user that the calendar event \"{}\" was not approved by {}{}, and ask whether they would like to change anything and try again.",
            request.request_id, request.payload.title, who, because
        )
    }
}

/// "Tuesday, October 20 at 3:00 PM UTC" for RFC 3339 input, the raw string
/// otherwise. The time stays in the offset it was given in, which is named.
fn format_when(start_time: &str) -> String {
    match DateTime::parse_from_rfc3339(start_time.trim()) {
        Ok(dt) if dt.offset().local_minus_utc() == 0 => {
            dt.format("%A, %B %-d at %-I:%M %p UTC").to_string()
        }
        Ok(dt) => dt.format("%A, %B %-d at %-I:%M %p (UTC%:z)").to_string(),
        Err(_) => start_time.to_string(),
    }
}
