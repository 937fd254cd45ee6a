//! Gateway wire protocol.
//!
//! Newline-delimited JSON frames over a Unix domain socket, tagged by `type`.
//! Agents send tool calls and receive injected instructions; participants
//! receive approval RPCs and send replies.

use serde::{Deserialize, Serialize};

/// What a connection speaks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerRole {
    Agent,
    Participant,
}

/// Client → gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Must be the first frame on every connection.
    Hello {
        identity: String,
        #[serde(default)]
        name: String,
        role: PeerRole,
    },

    /// A tool invocation from the model. `arguments` may be a JSON object or
    /// a string containing one, the way most model APIs deliver them.
    ToolCall {
        id: String,
        tool: String,
        arguments: serde_json::Value,
    },

    /// Answer to an `rpc_request`.
    RpcReply { rpc_id: String, payload: String },
}

/// Gateway → client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    Welcome { identity: String, meeting_id: String },

    /// Result of a `tool_call`, matched by `id`. `content` is the JSON string
    /// handed back to the model.
    ToolResult { id: String, content: String },

    RpcRequest {
        rpc_id: String,
        caller: String,
        method: String,
        payload: String,
        timeout_ms: u64,
    },

    /// A new turn for the agent to speak.
    Instruction { text: String },

    Error { message: String },
}

impl ServerFrame {
    pub fn error(message: impl Into<String>) -> Self {
        ServerFrame::Error {
            message: message.into(),
        }
    }
}

/// Tool arguments as the JSON text the tool parses.
pub fn arguments_text(arguments: &serde_json::Value) -> String {
    match arguments {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
