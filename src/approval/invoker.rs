//! Remote approval invoker: one bounded-time exchange with the approver.
//!
//! Every exit path is a `ResolvedOutcome`. Timeouts, unreachable clients and
//! garbage replies all become rejections with a reason; the caller never
//! has to handle an error.

use crate::approval::types::{
    ApprovalReply, CalendarEvent, RemoteApprovalRequest, ResolvedOutcome, APPROVAL_RPC_METHOD,
    CALENDAR_EVENT_REQUEST_TYPE,
};
use crate::approval::{RpcError, RpcTransport};
use crate::participants::Participant;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

pub struct ApprovalInvoker {
    transport: Arc<dyn RpcTransport + Send + Sync>,
    meeting_id: String,
}

impl ApprovalInvoker {
    pub fn new(transport: Arc<dyn RpcTransport + Send + Sync>, meeting_id: impl Into<String>) -> Self {
        Self {
            transport,
            meeting_id: meeting_id.into(),
        }
    }

    /// Ask `target` to approve `payload`, waiting at most `timeout`.
    ///
    /// The same `timeout` is sent to the client as `timeoutMs` so its
    /// countdown and our deadline agree.
    pub async fn invoke(
        &self,
        target: &Participant,
        payload: &CalendarEvent,
        timeout: Duration,
    ) -> ResolvedOutcome {
        let Some(agent_id) = self.transport.local_identity() else {
            tracing::warn!(participant = %target.identity, "Local identity not established, skipping approval rpc");
            return ResolvedOutcome::not_connected(target);
        };

        let request = RemoteApprovalRequest {
            meeting_id: self.meeting_id.clone(),
            agent_id,
            request_type: CALENDAR_EVENT_REQUEST_TYPE.to_string(),
            target_participant: target.identity.clone(),
            payload: payload.clone(),
            invoked_at: Utc::now().timestamp_millis(),
            timeout_ms: timeout.as_millis() as u64,
        };

        let body = match serde_json::to_string(&request) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!("Failed to encode approval request: {}", e);
                return ResolvedOutcome::unreachable(target);
            }
        };

        tracing::debug!(participant = %target.identity, timeout_ms = request.timeout_ms, "Sending approval rpc");

        let call = self
            .transport
            .perform_rpc(&target.identity, APPROVAL_RPC_METHOD, body, timeout);

        let raw = match tokio::time::timeout(timeout, call).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(RpcError::Timeout(_))) | Err(_) => {
                tracing::info!(participant = %target.identity, "Approval rpc timed out");
                return ResolvedOutcome::timed_out(target);
            }
            Ok(Err(e)) => {
                tracing::warn!(participant = %target.identity, error = %e, "Approval rpc failed");
                return ResolvedOutcome::unreachable(target);
            }
        };

        match serde_json::from_str::<ApprovalReply>(&raw) {
            Ok(reply) => ResolvedOutcome::from_reply(reply, target),
            Err(e) => {
                tracing::warn!(participant = %target.identity, error = %e, "Malformed approval reply");
                ResolvedOutcome::unreachable(target)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approval::types::{OutcomeKind, REASON_NOT_CONNECTED, REASON_TIMED_OUT, REASON_UNREACHABLE};
    use async_trait::async_trait;
    use std::sync::Mutex;

    enum Behaviour {
        Reply(&'static str),
        Fail,
        Hang,
    }

    struct FakeTransport {
        identity: Option<String>,
        behaviour: Behaviour,
        seen: Mutex<Vec<String>>,
    }

    impl FakeTransport {
        fn new(behaviour: Behaviour) -> Arc<Self> {
            Arc::new(Self {
                identity: Some("agent-1".to_string()),
                behaviour,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl RpcTransport for FakeTransport {
        fn local_identity(&self) -> Option<String> {
            self.identity.clone()
        }

        async fn perform_rpc(
            &self,
            _destination: &str,
            _method: &str,
            payload: String,
            _response_timeout: Duration,
        ) -> Result<String, RpcError> {
            self.seen.lock().unwrap().push(payload);
            match self.behaviour {
                Behaviour::Reply(raw) => Ok(raw.to_string()),
                Behaviour::Fail => Err(RpcError::Unreachable("user-1".to_string())),
                Behaviour::Hang => std::future::pending().await,
            }
        }
    }

    fn event() -> CalendarEvent {
        CalendarEvent {
            title: "Review".to_string(),
            description: None,
            start_time: "2026-10-20T15:00:00Z".to_string(),
            end_time: "2026-10-20T16:00:00Z".to_string(),
            attendees: vec![],
        }
    }

    fn alice() -> Participant {
        Participant::new("user-1", "Alice")
    }

    #[tokio::test]
    async fn test_reply_is_returned_verbatim() {
        let transport = FakeTransport::new(Behaviour::Reply(r#"{"approved":false,"reason":"busy"}"#));
        let invoker = ApprovalInvoker::new(transport.clone(), "m1");
        let outcome = invoker.invoke(&alice(), &event(), Duration::from_secs(5)).await;
        assert_eq!(outcome.kind, OutcomeKind::Rejected);
        assert_eq!(outcome.reason.as_deref(), Some("busy"));

        let sent: serde_json::Value =
            serde_json::from_str(&transport.seen.lock().unwrap()[0]).unwrap();
        assert_eq!(sent["timeoutMs"], 5000);
        assert_eq!(sent["agentId"], "agent-1");
        assert_eq!(sent["targetParticipant"], "user-1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_becomes_rejection() {
        let invoker = ApprovalInvoker::new(FakeTransport::new(Behaviour::Hang), "m1");
        let outcome = invoker.invoke(&alice(), &event(), Duration::from_secs(30)).await;
        assert_eq!(outcome.kind, OutcomeKind::TimedOut);
        assert!(!outcome.approved);
        assert_eq!(outcome.reason.as_deref(), Some(REASON_TIMED_OUT));
    }

    #[tokio::test]
    async fn test_transport_failure_becomes_rejection() {
        let invoker = ApprovalInvoker::new(FakeTransport::new(Behaviour::Fail), "m1");
        let outcome = invoker.invoke(&alice(), &event(), Duration::from_secs(5)).await;
        assert_eq!(outcome.kind, OutcomeKind::Failed);
        assert_eq!(outcome.reason.as_deref(), Some(REASON_UNREACHABLE));
    }

    #[tokio::test]
    async fn test_malformed_reply_becomes_rejection() {
        let invoker = ApprovalInvoker::new(FakeTransport::new(Behaviour::Reply("yes please")), "m1");
        let outcome = invoker.invoke(&alice(), &event(), Duration::from_secs(5)).await;
        assert_eq!(outcome.reason.as_deref(), Some(REASON_UNREACHABLE));
    }

    #[tokio::test]
    async fn test_no_local_identity_fails_fast() {
        let transport = Arc::new(FakeTransport {
            identity: None,
            behaviour: Behaviour::Hang,
            seen: Mutex::new(Vec::new()),
        });
        let invoker = ApprovalInvoker::new(transport.clone(), "m1");
        let outcome = invoker.invoke(&alice(), &event(), Duration::from_secs(5)).await;
        assert_eq!(outcome.reason.as_deref(), Some(REASON_NOT_CONNECTED));
        assert!(transport.seen.lock().unwrap().is_empty());
    }
}
