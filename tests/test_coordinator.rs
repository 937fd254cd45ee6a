//! Integration tests for the approval coordinator.
//!
//! Drives the tool entry point against in-memory collaborators and checks
//! dedup, queue ordering, timeouts and that every request ends in exactly
//! one injected instruction.

use async_trait::async_trait;
use callgate::approval::{
    ApprovalReply, OutcomeKind, RpcError, RpcTransport, REASON_NOT_CONNECTED, REASON_TIMED_OUT,
    REASON_UNREACHABLE,
};
use callgate::audit::{AuditLogger, AuditReader};
use callgate::config::Config;
use callgate::coordinator::{
    ApprovalCoordinator, CalendarEventTool, ConversationEngine, ToolArgs, ToolStatus,
};
use callgate::participants::{Participant, ParticipantDirectory};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

// ---- fakes ----

struct FakeDirectory {
    roster: Vec<Participant>,
}

#[async_trait]
impl ParticipantDirectory for FakeDirectory {
    async fn participants(&self) -> Vec<Participant> {
        self.roster.clone()
    }
}

#[derive(Clone, Copy)]
enum Mode {
    /// Reply after `delay`
    Approve { delay: Duration },
    Deny,
    /// Never answer
    Hang,
    /// Panic on the first call, approve afterwards
    PanicOnce,
    Garbage,
}

struct FakeTransport {
    identity: Option<String>,
    mode: Mode,
    calls: Mutex<Vec<String>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
    panicked: AtomicUsize,
}

impl FakeTransport {
    fn new(mode: Mode) -> Arc<Self> {
        Self::build(Some("agent-scheduler"), mode)
    }

    /// Agent has not joined the meeting yet.
    fn disconnected() -> Arc<Self> {
        Self::build(None, Mode::Deny)
    }

    fn build(identity: Option<&str>, mode: Mode) -> Arc<Self> {
        Arc::new(Self {
            identity: identity.map(str::to_string),
            mode,
            calls: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            panicked: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RpcTransport for FakeTransport {
    fn local_identity(&self) -> Option<String> {
        self.identity.clone()
    }

    async fn perform_rpc(
        &self,
        destination: &str,
        _method: &str,
        _payload: String,
        _response_timeout: Duration,
    ) -> Result<String, RpcError> {
        self.calls.lock().unwrap().push(destination.to_string());
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);

        let reply = match self.mode {
            Mode::Approve { delay } => {
                tokio::time::sleep(delay).await;
                Ok(r#"{"approved":true}"#.to_string())
            }
            Mode::Deny => Ok(r#"{"approved":false,"reason":"busy that day"}"#.to_string()),
            Mode::Hang => std::future::pending().await,
            Mode::PanicOnce => {
                if self.panicked.fetch_add(1, Ordering::SeqCst) == 0 {
                    self.active.fetch_sub(1, Ordering::SeqCst);
                    panic!("transport blew up");
                }
                Ok(r#"{"approved":true}"#.to_string())
            }
            Mode::Garbage => Ok("not json".to_string()),
        };

        self.active.fetch_sub(1, Ordering::SeqCst);
        reply
    }
}

struct FakeEngine {
    tx: mpsc::UnboundedSender<String>,
}

#[async_trait]
impl ConversationEngine for FakeEngine {
    async fn inject_instruction(&self, text: &str) -> anyhow::Result<()> {
        let _ = self.tx.send(text.to_string());
        Ok(())
    }
}

/// Engine whose every injection fails.
struct BrokenEngine {
    attempts: Arc<AtomicUsize>,
}

#[async_trait]
impl ConversationEngine for BrokenEngine {
    async fn inject_instruction(&self, _text: &str) -> anyhow::Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        anyhow::bail!("conversation engine is down")
    }
}

struct Harness {
    tool: CalendarEventTool,
    coordinator: Arc<ApprovalCoordinator>,
    transport: Arc<FakeTransport>,
    instructions: mpsc::UnboundedReceiver<String>,
}

impl Harness {
    fn new(roster: Vec<Participant>, transport: Arc<FakeTransport>) -> Self {
        Self::with_audit(roster, transport, None)
    }

    fn with_audit(
        roster: Vec<Participant>,
        transport: Arc<FakeTransport>,
        audit: Option<AuditLogger>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let config = Config::new("standup-42", "agent-scheduler").with_timeout_ms(30_000);
        let coordinator = ApprovalCoordinator::new(
            &config,
            Arc::new(FakeDirectory { roster }),
            transport.clone(),
            Arc::new(FakeEngine { tx }),
            audit,
        );
        Self {
            tool: CalendarEventTool::new(coordinator.clone()),
            coordinator,
            transport,
            instructions: rx,
        }
    }

    async fn next_instruction(&mut self) -> String {
        tokio::time::timeout(Duration::from_secs(120), self.instructions.recv())
            .await
            .expect("no instruction arrived")
            .expect("engine channel closed")
    }

    /// True when no further instruction arrives within a generous window.
    async fn quiet(&mut self) -> bool {
        tokio::time::timeout(Duration::from_secs(300), self.instructions.recv())
            .await
            .is_err()
    }
}

fn roster() -> Vec<Participant> {
    vec![
        Participant::new("agent-scheduler", "Scheduler"),
        Participant::new("user-1", "alice smith"),
        Participant::new("user-2", "Bob Jones"),
    ]
}

fn args(target: &str, title: &str) -> ToolArgs {
    ToolArgs {
        target_descriptor: target.to_string(),
        title: title.to_string(),
        description: None,
        start_time: "2026-10-20T15:00:00Z".to_string(),
        end_time: "2026-10-20T16:00:00Z".to_string(),
        attendees: vec!["bob@example.com".to_string()],
    }
}

// ---- dedup ----

#[tokio::test(start_paused = true)]
async fn test_identical_calls_share_one_exchange() {
    let mut h = Harness::new(
        roster(),
        FakeTransport::new(Mode::Approve {
            delay: Duration::from_secs(5),
        }),
    );

    let first = h.tool.execute(args("alice", "Design review"));
    let second = h.tool.execute(args("Alice ", "Design review"));

    assert_eq!(first.status, ToolStatus::Pending);
    assert_eq!(second.status, ToolStatus::Duplicate);
    assert_ne!(first.call_id, second.call_id);
    assert_eq!(h.coordinator.in_flight(), 1);

    let text = h.next_instruction().await;
    assert!(text.contains(&first.call_id));
    assert!(text.contains("alice smith approved"));

    assert!(h.quiet().await);
    assert_eq!(h.transport.calls(), vec!["user-1"]);
    assert_eq!(h.coordinator.in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_same_call_after_settlement_starts_fresh() {
    let mut h = Harness::new(roster(), FakeTransport::new(Mode::Deny));

    let first = h.tool.execute(args("alice", "Design review"));
    h.next_instruction().await;

    let again = h.tool.execute(args("alice", "Design review"));
    assert_eq!(again.status, ToolStatus::Pending);
    let text = h.next_instruction().await;
    assert!(text.contains(&again.call_id));
    assert!(!text.contains(&first.call_id));
    assert_eq!(h.transport.calls().len(), 2);
}

// ---- queue ----

#[tokio::test(start_paused = true)]
async fn test_one_dialog_at_a_time_in_arrival_order() {
    let mut h = Harness::new(
        roster(),
        FakeTransport::new(Mode::Approve {
            delay: Duration::from_secs(3),
        }),
    );

    let a = h.tool.execute(args("alice", "Design review"));
    let b = h.tool.execute(args("bob", "Budget sync"));
    let c = h.tool.execute(args("alice", "Retro"));

    for expected in [&a.call_id, &b.call_id, &c.call_id] {
        let text = h.next_instruction().await;
        assert!(text.contains(expected.as_str()), "out of order: {}", text);
    }

    assert_eq!(h.transport.calls(), vec!["user-1", "user-2", "user-1"]);
    assert_eq!(h.transport.max_active.load(Ordering::SeqCst), 1);
}

// ---- never blocks / always resolves ----

#[tokio::test(start_paused = true)]
async fn test_tool_returns_before_the_human_answers() {
    let mut h = Harness::new(roster(), FakeTransport::new(Mode::Hang));

    let ack = h.tool.execute(args("bob", "Budget sync"));
    assert_eq!(ack.status, ToolStatus::Pending);
    assert_eq!(ack.target, "bob");
    assert_eq!(h.coordinator.in_flight(), 1);

    // The coordinator's 30s timeout ends the exchange.
    let text = h.next_instruction().await;
    assert!(text.contains(&ack.call_id));
    assert!(text.contains("was not approved by Bob Jones"));
    assert!(text.contains(REASON_TIMED_OUT));
    assert_eq!(h.coordinator.in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_does_not_stall_the_queue() {
    let mut h = Harness::new(roster(), FakeTransport::new(Mode::Hang));

    h.tool.execute(args("bob", "Budget sync"));
    h.tool.execute(args("alice", "Design review"));

    assert!(h.next_instruction().await.contains("Budget sync"));
    assert!(h.next_instruction().await.contains("Design review"));
    assert_eq!(h.transport.calls(), vec!["user-2", "user-1"]);
}

#[tokio::test(start_paused = true)]
async fn test_panic_still_dispatches_and_releases() {
    let mut h = Harness::new(roster(), FakeTransport::new(Mode::PanicOnce));

    let first = h.tool.execute(args("alice", "Design review"));
    let text = h.next_instruction().await;
    assert!(text.contains(&first.call_id));
    assert!(text.contains("was not approved"));
    assert_eq!(h.coordinator.in_flight(), 0);

    // Same proposal again: not a duplicate, and the queue is free.
    let again = h.tool.execute(args("alice", "Design review"));
    assert_eq!(again.status, ToolStatus::Pending);
    let text = h.next_instruction().await;
    assert!(text.contains("alice smith approved"));
}

#[tokio::test(start_paused = true)]
async fn test_garbage_reply_is_unreachable() {
    let mut h = Harness::new(roster(), FakeTransport::new(Mode::Garbage));
    h.tool.execute(args("alice", "Design review"));
    assert!(h.next_instruction().await.contains(REASON_UNREACHABLE));
}

#[tokio::test(start_paused = true)]
async fn test_not_connected_fails_fast() {
    let mut h = Harness::new(roster(), FakeTransport::disconnected());
    h.tool.execute(args("alice", "Design review"));
    assert!(h.next_instruction().await.contains(REASON_NOT_CONNECTED));
    assert!(h.transport.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_denial_reason_reaches_the_agent() {
    let mut h = Harness::new(roster(), FakeTransport::new(Mode::Deny));
    h.tool.execute(args("bob", "Budget sync"));
    let text = h.next_instruction().await;
    assert!(text.contains("reason: busy that day"));
    assert!(text.contains("change anything"));
}

#[tokio::test(start_paused = true)]
async fn test_failed_injection_does_not_hold_the_queue() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let transport = FakeTransport::new(Mode::Approve {
        delay: Duration::from_secs(1),
    });
    let config = Config::new("standup-42", "agent-scheduler");
    let coordinator = ApprovalCoordinator::new(
        &config,
        Arc::new(FakeDirectory { roster: roster() }),
        transport.clone(),
        Arc::new(BrokenEngine {
            attempts: attempts.clone(),
        }),
        None,
    );
    let tool = CalendarEventTool::new(coordinator.clone());

    tool.execute(args("alice", "Design review"));
    tool.execute(args("bob", "Budget sync"));

    // Let both exchanges and both failed dispatches run.
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert_eq!(transport.calls(), vec!["user-1", "user-2"]);
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    assert_eq!(coordinator.in_flight(), 0);
}

// ---- resolution ----

#[tokio::test(start_paused = true)]
async fn test_exact_name_beats_longer_match() {
    let mut people = roster();
    people.push(Participant::new("user-3", "Alice"));
    let mut h = Harness::new(
        people,
        FakeTransport::new(Mode::Approve {
            delay: Duration::ZERO,
        }),
    );

    h.tool.execute(args("Alice", "Design review"));
    h.next_instruction().await;
    assert_eq!(h.transport.calls(), vec!["user-3"]);
}

#[tokio::test(start_paused = true)]
async fn test_ambiguous_target_is_never_asked() {
    let mut people = roster();
    people.push(Participant::new("user-4", "Ann Smithers"));
    let mut h = Harness::new(
        people,
        FakeTransport::new(Mode::Approve {
            delay: Duration::ZERO,
        }),
    );

    h.tool.execute(args("smi", "Design review"));
    let text = h.next_instruction().await;
    assert!(text.contains("More than one participant matches \"smi\""));
    assert!(h.transport.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_unique_substring_resolves() {
    let mut h = Harness::new(
        roster(),
        FakeTransport::new(Mode::Approve {
            delay: Duration::ZERO,
        }),
    );

    h.tool.execute(args("smi", "Design review"));
    h.next_instruction().await;
    assert_eq!(h.transport.calls(), vec!["user-1"]);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_target() {
    let mut h = Harness::new(roster(), FakeTransport::new(Mode::Deny));
    h.tool.execute(args("Carol", "Design review"));
    assert!(h
        .next_instruction()
        .await
        .contains("Could not find anyone called \"Carol\""));
}

// ---- raw tool arguments ----

#[tokio::test]
async fn test_malformed_arguments_are_acknowledged_as_invalid() {
    let mut h = Harness::new(roster(), FakeTransport::new(Mode::Deny));

    let reply = h.tool.execute_json(r#"{"title":"Design review"}"#);
    let ack: serde_json::Value = serde_json::from_str(&reply).unwrap();
    assert_eq!(ack["status"], "invalid");
    assert!(ack["message"].as_str().unwrap().contains("Invalid arguments"));

    let reply = h.tool.execute_json("not even json");
    let ack: serde_json::Value = serde_json::from_str(&reply).unwrap();
    assert_eq!(ack["status"], "invalid");

    assert_eq!(h.coordinator.in_flight(), 0);
    assert!(h.instructions.try_recv().is_err());
}

#[tokio::test]
async fn test_json_ack_shape() {
    let h = Harness::new(roster(), FakeTransport::new(Mode::Hang));

    let reply = h.tool.execute_json(
        r#"{"targetDescriptor":"bob","title":"Budget sync","startTime":"2026-10-20T15:00:00Z","endTime":"2026-10-20T16:00:00Z"}"#,
    );
    let ack: serde_json::Value = serde_json::from_str(&reply).unwrap();
    assert_eq!(ack["status"], "pending");
    assert_eq!(ack["target"], "bob");
    assert!(ack["callId"].as_str().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_blank_target_is_pending_then_rejected() {
    let mut h = Harness::new(roster(), FakeTransport::new(Mode::Deny));

    let ack = h.tool.execute(args("   ", "Sync"));
    assert_eq!(ack.status, ToolStatus::Pending);

    let text = h.next_instruction().await;
    assert!(text.contains(&ack.call_id));
    assert!(text.contains("No approver was named"));
    assert!(h.transport.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_separator_in_fields_does_not_fake_a_duplicate() {
    let mut people = roster();
    people.push(Participant::new("user-5", "Bob Jones|sync"));
    let mut h = Harness::new(
        people,
        FakeTransport::new(Mode::Approve {
            delay: Duration::from_secs(5),
        }),
    );

    let first = h.tool.execute(args("Bob Jones|sync", "q3"));
    let second = h.tool.execute(args("Bob Jones", "sync|q3"));
    assert_eq!(first.status, ToolStatus::Pending);
    assert_eq!(second.status, ToolStatus::Pending);

    h.next_instruction().await;
    h.next_instruction().await;
    assert_eq!(h.transport.calls(), vec!["user-5", "user-2"]);
}

// ---- audit ----

#[tokio::test(start_paused = true)]
async fn test_dispatched_outcomes_are_audited() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("standup-42.jsonl");
    let logger = AuditLogger::with_path(&path).unwrap();

    let mut h = Harness::with_audit(roster(), FakeTransport::new(Mode::Deny), Some(logger));
    let ack = h.tool.execute(args("bob", "Budget sync"));
    h.next_instruction().await;
    assert!(h.quiet().await);

    let entries = AuditReader::read_file(&path).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].request_id, ack.call_id);
    assert_eq!(entries[0].outcome, OutcomeKind::Rejected);
    assert_eq!(entries[0].resolved_identity.as_deref(), Some("user-2"));
    assert_eq!(entries[0].reason.as_deref(), Some("busy that day"));
}

#[test]
fn test_reply_wire_format() {
    let reply: ApprovalReply = serde_json::from_str(r#"{"approved":false}"#).unwrap();
    assert!(!reply.approved);
    assert!(reply.modified_payload.is_none());
}
