//! The approval coordinator: owns the dedup registry and approval queue for
//! one meeting session and runs the background approval sequence.
//!
//! Per request: `CREATED → QUEUED → IN_FLIGHT → {APPROVED | REJECTED |
//! TIMED_OUT | FAILED} → DISPATCHED`. Every request reaches `DISPATCHED`,
//! including failures and panics inside the sequence.

pub mod dedup;
pub mod dispatcher;
pub mod queue;
pub mod tool;

use crate::approval::types::{ApprovalRequest, ResolvedOutcome};
use crate::approval::{ApprovalInvoker, RpcTransport};
use crate::audit::AuditLogger;
use crate::config::Config;
use crate::participants::{resolve, ParticipantDirectory, ResolveError};
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

pub use dedup::{DedupRegistry, PendingOutcome, Registration, SharedOutcome};
pub use dispatcher::{format_instruction, ConversationEngine, OutcomeDispatcher};
pub use queue::{ApprovalQueue, QueueTicket, QueueToken};
pub use tool::{CalendarEventTool, ToolAck, ToolArgs, ToolStatus};

const REASON_INTERNAL: &str = "Something went wrong while asking for approval";

/// What `submit` did with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// A new approval sequence was started in the background.
    Started,
    /// An identical request is already in flight; nothing new was started.
    Duplicate,
}

/// Per-session approval engine. Create one at session start and share it.
pub struct ApprovalCoordinator {
    meeting_id: String,
    agent_identity_prefix: String,
    timeout: Duration,
    registry: Arc<DedupRegistry>,
    queue: ApprovalQueue,
    directory: Arc<dyn ParticipantDirectory + Send + Sync>,
    invoker: ApprovalInvoker,
    dispatcher: OutcomeDispatcher,
}

impl ApprovalCoordinator {
    pub fn new(
        config: &Config,
        directory: Arc<dyn ParticipantDirectory + Send + Sync>,
        transport: Arc<dyn RpcTransport + Send + Sync>,
        engine: Arc<dyn ConversationEngine + Send + Sync>,
        audit: Option<AuditLogger>,
    ) -> Arc<Self> {
        let mut dispatcher = OutcomeDispatcher::new(engine, &config.meeting_id);
        if let Some(logger) = audit {
            dispatcher = dispatcher.with_audit(logger);
        }

        Arc::new(Self {
            meeting_id: config.meeting_id.clone(),
            agent_identity_prefix: config.agent_identity_prefix.clone(),
            timeout: config.approval_timeout(),
            registry: DedupRegistry::new(),
            queue: ApprovalQueue::new(),
            directory,
            invoker: ApprovalInvoker::new(transport, &config.meeting_id),
            dispatcher,
        })
    }

    pub fn meeting_id(&self) -> &str {
        &self.meeting_id
    }

    /// Number of distinct proposals currently awaiting an outcome.
    pub fn in_flight(&self) -> usize {
        self.registry.in_flight()
    }

    /// Start (or join) the approval sequence for `request` without waiting on it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit(self: &Arc<Self>, request: ApprovalRequest) -> Submission {
        let pending = match self.registry.register_or_join(&request.fingerprint) {
            Registration::Joined(_) => {
                tracing::info!(
                    request_id = %request.request_id,
                    fingerprint = %request.fingerprint,
                    "Identical approval already in flight, joining"
                );
                return Submission::Duplicate;
            }
            Registration::New(pending) => pending,
        };

        // Take the place in line now so order follows arrival, not task scheduling.
        let ticket = self.queue.enqueue();
        tracing::debug!(request_id = %request.request_id, position = ticket.position(), "Approval queued");

        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            coordinator.run(request, pending, ticket).await;
        });

        Submission::Started
    }

    async fn run(&self, request: ApprovalRequest, pending: PendingOutcome, ticket: QueueTicket) {
        let token = ticket.acquire().await;
        tracing::info!(
            request_id = %request.request_id,
            approver = %request.target_descriptor,
            "Approval in flight"
        );

        let outcome = match AssertUnwindSafe(self.request_approval(&request))
            .catch_unwind()
            .await
        {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::error!(request_id = %request.request_id, "Approval sequence panicked");
                ResolvedOutcome::failed(REASON_INTERNAL)
            }
        };
        tracing::info!(request_id = %request.request_id, outcome = %outcome.kind, "Approval resolved");

        pending.settle(outcome.clone());

        if AssertUnwindSafe(self.dispatcher.dispatch(&outcome, &request))
            .catch_unwind()
            .await
            .is_err()
        {
            tracing::error!(request_id = %request.request_id, "Outcome dispatch panicked");
        }

        token.release();
    }

    /// Resolve the approver against a fresh roster, then ask them.
    async fn request_approval(&self, request: &ApprovalRequest) -> ResolvedOutcome {
        let roster = self.directory.participants().await;

        let target = match resolve(&request.target_descriptor, &roster, &self.agent_identity_prefix) {
            Ok(target) => target,
            Err(e) => {
                tracing::warn!(request_id = %request.request_id, "Could not resolve approver: {}", e);
                return ResolvedOutcome::failed(resolve_failure_reason(&e));
            }
        };

        self.invoker
            .invoke(&target, &request.payload, self.timeout)
            .await
    }
}

fn resolve_failure_reason(error: &ResolveError) -> String {
    match error {
        ResolveError::NotFound(descriptor) if descriptor.is_empty() => {
            "No approver was named; ask the user who should approve".to_string()
        }
        ResolveError::NotFound(descriptor) => {
            format!("Could not find anyone called \"{}\" in the meeting", descriptor)
        }
        ResolveError::Ambiguous { descriptor, .. } => format!(
            "More than one participant matches \"{}\"; ask for their full name",
            descriptor
        ),
    }
}
