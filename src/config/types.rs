//! Gateway configuration.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;
pub const DEFAULT_AGENT_PREFIX: &str = "agent-";
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/callgate.sock";

/// Settings for one meeting session.
#[derive(Debug, Clone)]
pub struct Config {
    /// Meeting the agent is attached to (part of every fingerprint)
    pub meeting_id: String,
    /// Identity the agent connects with; approval RPCs are sent from it
    pub agent_identity: String,
    /// Identities starting with this are never asked to approve
    pub agent_identity_prefix: String,
    /// How long a participant has to answer. Also sent to their client.
    pub approval_timeout_ms: u64,
    /// Unix socket the gateway listens on
    pub socket_path: PathBuf,
    /// Audit log override (default: ~/.callgate/logs/{meeting_id}.jsonl)
    pub audit_log: Option<PathBuf>,
}

impl Config {
    pub fn new(meeting_id: impl Into<String>, agent_identity: impl Into<String>) -> Self {
        Self {
            meeting_id: meeting_id.into(),
            agent_identity: agent_identity.into(),
            agent_identity_prefix: DEFAULT_AGENT_PREFIX.to_string(),
            approval_timeout_ms: DEFAULT_TIMEOUT_MS,
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            audit_log: None,
        }
    }

    pub fn approval_timeout(&self) -> Duration {
        Duration::from_millis(self.approval_timeout_ms)
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.approval_timeout_ms = timeout_ms;
        self
    }

    pub fn with_socket_path(mut self, socket_path: impl Into<PathBuf>) -> Self {
        self.socket_path = socket_path.into();
        self
    }
}
