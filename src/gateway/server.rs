//! Gateway server: hosts one meeting's approval coordinator on a Unix socket.
//!
//! Agents and participant clients connect, say `hello`, and then:
//! - agents send `tool_call` frames and get `tool_result` back at once;
//!   outcomes arrive later as `instruction` frames
//! - participants receive `rpc_request` frames and answer with `rpc_reply`

use crate::audit::AuditLogger;
use crate::config::Config;
use crate::coordinator::tool::TOOL_NAME;
use crate::coordinator::{ApprovalCoordinator, CalendarEventTool};
use crate::gateway::hub::SessionHub;
use crate::gateway::protocol::{arguments_text, ClientFrame, PeerRole, ServerFrame};
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;

pub struct GatewayServer {
    socket_path: PathBuf,
    hub: Arc<SessionHub>,
    tool: Arc<CalendarEventTool>,
}

impl GatewayServer {
    pub fn new(config: &Config, audit: Option<AuditLogger>) -> Self {
        let hub = Arc::new(SessionHub::new(&config.meeting_id, &config.agent_identity));
        let coordinator =
            ApprovalCoordinator::new(config, hub.clone(), hub.clone(), hub.clone(), audit);

        Self {
            socket_path: config.socket_path.clone(),
            hub,
            tool: Arc::new(CalendarEventTool::new(coordinator)),
        }
    }

    /// Listen for connections until the task is aborted.
    pub async fn run(&self) -> Result<()> {
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path).with_context(|| {
                format!("Failed to remove stale socket: {}", self.socket_path.display())
            })?;
        }

        let listener = UnixListener::bind(&self.socket_path)
            .with_context(|| format!("Failed to bind socket: {}", self.socket_path.display()))?;

        tracing::info!(
            meeting = %self.hub.meeting_id(),
            "Gateway listening on {}",
            self.socket_path.display()
        );

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    let hub = self.hub.clone();
                    let tool = self.tool.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, hub, tool).await {
                            tracing::error!("Connection handler error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    tracing::error!("Failed to accept connection: {}", e);
                }
            }
        }
    }
}

/// Who is on the other end, once they've said hello.
struct Session {
    identity: String,
    role: PeerRole,
    connection_id: u64,
}

async fn handle_connection(
    stream: UnixStream,
    hub: Arc<SessionHub>,
    tool: Arc<CalendarEventTool>,
) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    // All outbound frames go through one channel so RPCs and instructions
    // from background tasks interleave cleanly with direct replies.
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerFrame>();
    let writer_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let json = match serde_json::to_string(&frame) {
                Ok(json) => json,
                Err(e) => {
                    tracing::error!("Failed to encode frame: {}", e);
                    continue;
                }
            };
            if writer.write_all(json.as_bytes()).await.is_err()
                || writer.write_all(b"\n").await.is_err()
                || writer.flush().await.is_err()
            {
                break;
            }
        }
    });

    let mut session: Option<Session> = None;
    let mut line = String::new();

    let result = loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => break Ok(()),
            Ok(_) => {}
            Err(e) => break Err(e.into()),
        }

        let frame: ClientFrame = match serde_json::from_str(line.trim()) {
            Ok(frame) => frame,
            Err(e) => {
                let _ = tx.send(ServerFrame::error(format!("Invalid frame JSON: {}", e)));
                continue;
            }
        };

        if session.is_none() {
            match frame {
                ClientFrame::Hello { identity, name, role } => {
                    if identity.trim().is_empty() {
                        let _ = tx.send(ServerFrame::error("identity must not be empty"));
                        continue;
                    }
                    let _ = tx.send(ServerFrame::Welcome {
                        identity: identity.clone(),
                        meeting_id: hub.meeting_id().to_string(),
                    });
                    let connection_id = hub.register(&identity, &name, role, tx.clone());
                    tracing::debug!(
                        agents = hub.connected(PeerRole::Agent).len(),
                        participants = hub.connected(PeerRole::Participant).len(),
                        "Roster updated"
                    );
                    session = Some(Session {
                        identity,
                        role,
                        connection_id,
                    });
                }
                _ => {
                    let _ = tx.send(ServerFrame::error("send hello first"));
                }
            }
            continue;
        }
        let Some(s) = session.as_ref() else {
            continue;
        };

        match frame {
            ClientFrame::Hello { .. } => {
                let _ = tx.send(ServerFrame::error("already said hello on this connection"));
            }
            ClientFrame::ToolCall { id, tool: name, arguments } => {
                if s.role != PeerRole::Agent {
                    let _ = tx.send(ServerFrame::error("only agents may call tools"));
                    continue;
                }
                if name != TOOL_NAME {
                    let _ = tx.send(ServerFrame::error(format!("unknown tool: {}", name)));
                    continue;
                }
                tracing::debug!(identity = %s.identity, call = %id, "Tool call received");
                let content = tool.execute_json(&arguments_text(&arguments));
                let _ = tx.send(ServerFrame::ToolResult { id, content });
            }
            ClientFrame::RpcReply { rpc_id, payload } => {
                hub.complete_rpc(&rpc_id, &s.identity, payload);
            }
        }
    };

    if let Some(s) = session {
        hub.unregister(&s.identity, s.connection_id);
    }
    drop(tx);
    let _ = writer_task.await;

    result
}
