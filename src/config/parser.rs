//! YAML config parser.
//!
//! # Example config file:
//! ```yaml
//! meeting: weekly-planning
//! agent: agent-scheduler
//! timeout_ms: 45000
//! socket: /tmp/callgate.sock
//! ```

use crate::config::types::*;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Config as it appears in the YAML file, before defaults and validation.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    meeting: String,
    agent: String,
    #[serde(default)]
    agent_prefix: Option<String>,
    #[serde(default)]
    timeout_ms: Option<u64>,
    #[serde(default)]
    socket: Option<PathBuf>,
    #[serde(default)]
    audit_log: Option<PathBuf>,
}

/// Parse a YAML config file from a file path.
pub fn parse_config_file(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config_str(&content).with_context(|| format!("Invalid config file: {}", path.display()))
}

/// Parse a YAML config from a string.
pub fn parse_config_str(yaml: &str) -> Result<Config> {
    let raw: RawConfig = serde_yaml::from_str(yaml).context("Failed to parse YAML")?;

    let meeting_id = raw.meeting.trim().to_string();
    if meeting_id.is_empty() {
        bail!("'meeting' must not be empty");
    }

    let agent_identity = raw.agent.trim().to_string();
    if agent_identity.is_empty() {
        bail!("'agent' must not be empty");
    }

    let agent_identity_prefix = raw
        .agent_prefix
        .unwrap_or_else(|| DEFAULT_AGENT_PREFIX.to_string());
    if !agent_identity_prefix.is_empty() && !agent_identity.starts_with(&agent_identity_prefix) {
        bail!(
            "agent identity '{}' must start with the agent prefix '{}', otherwise the agent could be asked to approve its own proposals",
            agent_identity,
            agent_identity_prefix
        );
    }

    let approval_timeout_ms = raw.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS);
    if approval_timeout_ms == 0 {
        bail!("'timeout_ms' must be greater than zero");
    }

    Ok(Config {
        meeting_id,
        agent_identity,
        agent_identity_prefix,
        approval_timeout_ms,
        socket_path: raw
            .socket
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SOCKET_PATH)),
        audit_log: raw.audit_log,
    })
}
