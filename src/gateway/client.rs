//! Gateway client: connects to a running gateway over its Unix socket.
//!
//! Used by:
//! 1. `callgate join` to answer approvals on behalf of a participant
//! 2. Agent bridges that forward the model's tool calls
//! 3. Integration/E2E tests

use crate::approval::types::{ApprovalReply, RemoteApprovalRequest, APPROVAL_RPC_METHOD};
use crate::approval::ApprovalResponder;
use crate::coordinator::tool::{ToolAck, TOOL_NAME};
use crate::gateway::protocol::{ClientFrame, PeerRole, ServerFrame};
use anyhow::{bail, Context, Result};
use std::collections::VecDeque;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use uuid::Uuid;

pub struct GatewayClient {
    identity: String,
    meeting_id: String,
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
    /// Frames read while waiting for something else
    backlog: VecDeque<ServerFrame>,
}

impl GatewayClient {
    /// Connect and introduce ourselves. Returns once the gateway has welcomed us.
    pub async fn connect(
        socket_path: impl AsRef<Path>,
        identity: &str,
        name: &str,
        role: PeerRole,
    ) -> Result<Self> {
        let socket_path = socket_path.as_ref();
        let stream = UnixStream::connect(socket_path).await.with_context(|| {
            format!(
                "Failed to connect to callgate gateway at {}. Is `callgate serve` running?",
                socket_path.display()
            )
        })?;
        let (reader, writer) = stream.into_split();

        let mut client = Self {
            identity: identity.to_string(),
            meeting_id: String::new(),
            lines: BufReader::new(reader).lines(),
            writer,
            backlog: VecDeque::new(),
        };

        client
            .send(&ClientFrame::Hello {
                identity: identity.to_string(),
                name: name.to_string(),
                role,
            })
            .await?;

        loop {
            match client.read_frame().await? {
                ServerFrame::Welcome { meeting_id, .. } => {
                    client.meeting_id = meeting_id;
                    return Ok(client);
                }
                ServerFrame::Error { message } => bail!("Gateway refused hello: {}", message),
                other => client.backlog.push_back(other),
            }
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn meeting_id(&self) -> &str {
        &self.meeting_id
    }

    pub async fn send(&mut self, frame: &ClientFrame) -> Result<()> {
        let json = serde_json::to_string(frame)?;
        self.writer.write_all(json.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Next frame, backlog first. Errors when the gateway hangs up.
    pub async fn next_frame(&mut self) -> Result<ServerFrame> {
        if let Some(frame) = self.backlog.pop_front() {
            return Ok(frame);
        }
        self.read_frame().await
    }

    async fn read_frame(&mut self) -> Result<ServerFrame> {
        let line = self
            .lines
            .next_line()
            .await?
            .context("Gateway closed the connection")?;
        serde_json::from_str(line.trim()).context("Failed to parse gateway frame")
    }

    /// Call the calendar tool as an agent. Returns the immediate acknowledgment.
    pub async fn create_calendar_event(&mut self, arguments: serde_json::Value) -> Result<ToolAck> {
        let id = Uuid::new_v4().to_string();
        self.send(&ClientFrame::ToolCall {
            id: id.clone(),
            tool: TOOL_NAME.to_string(),
            arguments,
        })
        .await?;

        loop {
            match self.read_frame().await? {
                ServerFrame::ToolResult { id: result_id, content } if result_id == id => {
                    return serde_json::from_str(&content).context("Failed to parse tool result");
                }
                ServerFrame::Error { message } => bail!("Gateway error: {}", message),
                other => self.backlog.push_back(other),
            }
        }
    }

    /// Wait for the next injected instruction, as an agent.
    pub async fn next_instruction(&mut self) -> Result<String> {
        if let Some(pos) = self
            .backlog
            .iter()
            .position(|f| matches!(f, ServerFrame::Instruction { .. }))
        {
            if let Some(ServerFrame::Instruction { text }) = self.backlog.remove(pos) {
                return Ok(text);
            }
        }
        loop {
            match self.read_frame().await? {
                ServerFrame::Instruction { text } => return Ok(text),
                other => self.backlog.push_back(other),
            }
        }
    }

    /// Wait for one approval request and answer it with `responder`.
    /// Returns the request that was answered.
    pub async fn answer_next(
        &mut self,
        responder: &(dyn ApprovalResponder + Send + Sync),
    ) -> Result<RemoteApprovalRequest> {
        loop {
            let ServerFrame::RpcRequest { rpc_id, method, payload, .. } = self.next_frame().await? else {
                continue;
            };

            if method != APPROVAL_RPC_METHOD {
                tracing::warn!(method = %method, "Ignoring unsupported rpc");
                continue;
            }

            let request: RemoteApprovalRequest = match serde_json::from_str(&payload) {
                Ok(request) => request,
                Err(e) => {
                    tracing::warn!("Malformed approval request: {}", e);
                    continue;
                }
            };

            let reply = match responder.respond(&request).await {
                Ok(reply) => reply,
                Err(e) => ApprovalReply {
                    approved: false,
                    modified_payload: None,
                    reason: Some(format!("Approval client error: {}", e)),
                },
            };

            self.send(&ClientFrame::RpcReply {
                rpc_id,
                payload: serde_json::to_string(&reply)?,
            })
            .await?;
            return Ok(request);
        }
    }

    /// Answer approval requests until the gateway hangs up.
    pub async fn serve_approvals(
        mut self,
        responder: &(dyn ApprovalResponder + Send + Sync),
    ) -> Result<()> {
        loop {
            let request = self.answer_next(responder).await?;
            tracing::info!(
                title = %request.payload.title,
                start = %request.payload.start_time,
                "Answered approval request"
            );
        }
    }
}
