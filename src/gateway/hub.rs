//! Session hub: the live state of one meeting behind the gateway.
//!
//! Tracks who is connected and routes frames between them. The hub is the
//! in-tree implementation of the three collaborators the coordinator needs:
//! the participant directory, the RPC transport and the conversational
//! engine.

use crate::approval::{RpcError, RpcTransport};
use crate::coordinator::ConversationEngine;
use crate::gateway::protocol::{PeerRole, ServerFrame};
use crate::participants::{Participant, ParticipantDirectory};
use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// One live connection.
struct Peer {
    connection_id: u64,
    name: String,
    role: PeerRole,
    tx: mpsc::UnboundedSender<ServerFrame>,
}

/// An RPC waiting for its reply.
struct PendingRpc {
    destination: String,
    tx: oneshot::Sender<Result<String, RpcError>>,
}

pub struct SessionHub {
    meeting_id: String,
    agent_identity: String,
    peers: RwLock<HashMap<String, Peer>>,
    pending: Mutex<HashMap<String, PendingRpc>>,
    next_connection: AtomicU64,
}

impl SessionHub {
    pub fn new(meeting_id: impl Into<String>, agent_identity: impl Into<String>) -> Self {
        Self {
            meeting_id: meeting_id.into(),
            agent_identity: agent_identity.into(),
            peers: RwLock::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
            next_connection: AtomicU64::new(1),
        }
    }

    pub fn meeting_id(&self) -> &str {
        &self.meeting_id
    }

    /// Register a connection. A reconnect under the same identity replaces
    /// the old connection. Returns the connection ID to unregister with.
    pub fn register(
        &self,
        identity: &str,
        name: &str,
        role: PeerRole,
        tx: mpsc::UnboundedSender<ServerFrame>,
    ) -> u64 {
        let connection_id = self.next_connection.fetch_add(1, Ordering::Relaxed);
        let previous = self.peers_mut().insert(
            identity.to_string(),
            Peer {
                connection_id,
                name: name.to_string(),
                role,
                tx,
            },
        );
        if previous.is_some() {
            tracing::info!(identity, "Peer reconnected, replacing previous connection");
        } else {
            tracing::info!(identity, ?role, "Peer joined");
        }
        connection_id
    }

    /// Drop a connection and fail every RPC still waiting on it.
    pub fn unregister(&self, identity: &str, connection_id: u64) {
        {
            let mut peers = self.peers_mut();
            match peers.get(identity) {
                Some(peer) if peer.connection_id == connection_id => {
                    peers.remove(identity);
                }
                // Already replaced by a newer connection.
                _ => return,
            }
        }
        tracing::info!(identity, "Peer left");

        let orphaned: Vec<PendingRpc> = {
            let mut pending = self.pending_mut();
            let ids: Vec<String> = pending
                .iter()
                .filter(|(_, rpc)| rpc.destination == identity)
                .map(|(id, _)| id.clone())
                .collect();
            ids.iter().filter_map(|id| pending.remove(id)).collect()
        };
        for rpc in orphaned {
            let _ = rpc.tx.send(Err(RpcError::ConnectionClosed));
        }
    }

    /// Deliver a reply from `replier` to the RPC it answers. Only the peer the
    /// RPC was sent to can complete it; late or foreign replies are dropped.
    /// Returns whether the reply was delivered.
    pub fn complete_rpc(&self, rpc_id: &str, replier: &str, payload: String) -> bool {
        let rpc = {
            let mut pending = self.pending_mut();
            let destination = pending.get(rpc_id).map(|rpc| rpc.destination.clone());
            match destination {
                Some(destination) if destination == replier => pending.remove(rpc_id),
                Some(destination) => {
                    tracing::warn!(
                        rpc_id,
                        replier,
                        destination = %destination,
                        "Reply from a peer the rpc was not sent to, ignored"
                    );
                    return false;
                }
                None => None,
            }
        };
        match rpc {
            Some(rpc) => rpc.tx.send(Ok(payload)).is_ok(),
            None => {
                tracing::debug!(rpc_id, "Reply for unknown or expired rpc ignored");
                false
            }
        }
    }

    /// Connected peers with the given role.
    pub fn connected(&self, role: PeerRole) -> Vec<String> {
        self.peers()
            .iter()
            .filter(|(_, peer)| peer.role == role)
            .map(|(identity, _)| identity.clone())
            .collect()
    }

    fn peers(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Peer>> {
        self.peers.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn peers_mut(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Peer>> {
        self.peers.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn pending_mut(&self) -> std::sync::MutexGuard<'_, HashMap<String, PendingRpc>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ParticipantDirectory for SessionHub {
    async fn participants(&self) -> Vec<Participant> {
        self.peers()
            .iter()
            .filter(|(_, peer)| peer.role == PeerRole::Participant)
            .map(|(identity, peer)| Participant::new(identity.clone(), peer.name.clone()))
            .collect()
    }
}

#[async_trait]
impl RpcTransport for SessionHub {
    fn local_identity(&self) -> Option<String> {
        self.peers()
            .get(&self.agent_identity)
            .filter(|peer| peer.role == PeerRole::Agent)
            .map(|_| self.agent_identity.clone())
    }

    async fn perform_rpc(
        &self,
        destination: &str,
        method: &str,
        payload: String,
        response_timeout: Duration,
    ) -> Result<String, RpcError> {
        let rpc_id = uuid::Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();

        let frame = ServerFrame::RpcRequest {
            rpc_id: rpc_id.clone(),
            caller: self.agent_identity.clone(),
            method: method.to_string(),
            payload,
            timeout_ms: response_timeout.as_millis() as u64,
        };

        {
            // Register before sending so a fast reply can't miss us.
            let peers = self.peers();
            let Some(peer) = peers.get(destination) else {
                return Err(RpcError::Unreachable(destination.to_string()));
            };
            self.pending_mut().insert(
                rpc_id.clone(),
                PendingRpc {
                    destination: destination.to_string(),
                    tx,
                },
            );
            if peer.tx.send(frame).is_err() {
                self.pending_mut().remove(&rpc_id);
                return Err(RpcError::Unreachable(destination.to_string()));
            }
        }

        match tokio::time::timeout(response_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(RpcError::ConnectionClosed),
            Err(_) => {
                self.pending_mut().remove(&rpc_id);
                Err(RpcError::Timeout(response_timeout))
            }
        }
    }
}

#[async_trait]
impl ConversationEngine for SessionHub {
    async fn inject_instruction(&self, text: &str) -> Result<()> {
        let peers = self.peers();
        let agents: Vec<&Peer> = peers
            .values()
            .filter(|peer| peer.role == PeerRole::Agent)
            .collect();
        if agents.is_empty() {
            bail!("no agent connected to receive the instruction");
        }
        for agent in agents {
            let _ = agent.tx.send(ServerFrame::Instruction {
                text: text.to_string(),
            });
        }
        Ok(())
    }
}
