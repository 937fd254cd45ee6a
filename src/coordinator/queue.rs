//! Sequential approval queue: one visible approval dialog at a time.
//!
//! Each `enqueue` appends a link to a chain: the new ticket holds the
//! receiver of the previous link and the sender of its own. A ticket becomes
//! a token once the previous link is released; releasing (or dropping) a
//! token wakes the next link. Links are captured at enqueue time, so order
//! is arrival order regardless of how the waiting tasks get scheduled.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use tokio::sync::oneshot;

#[derive(Default)]
pub struct ApprovalQueue {
    tail: Mutex<Option<oneshot::Receiver<()>>>,
    next_position: AtomicU64,
}

/// A place in line. Call `acquire` to wait for the turn.
pub struct QueueTicket {
    position: u64,
    previous: Option<oneshot::Receiver<()>>,
    release: Option<oneshot::Sender<()>>,
}

/// The right to run the next approval exchange. Released on drop.
pub struct QueueToken {
    position: u64,
    release: Option<oneshot::Sender<()>>,
}

impl ApprovalQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a place in line. Never waits.
    pub fn enqueue(&self) -> QueueTicket {
        let (tx, rx) = oneshot::channel();
        let previous = self
            .tail
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(rx);

        QueueTicket {
            position: self.next_position.fetch_add(1, Ordering::Relaxed),
            previous,
            release: Some(tx),
        }
    }

    /// Take a place in line and wait for the turn.
    pub async fn acquire(&self) -> QueueToken {
        self.enqueue().acquire().await
    }
}

impl QueueTicket {
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Wait until every earlier ticket has been released.
    pub async fn acquire(mut self) -> QueueToken {
        if let Some(previous) = self.previous.take() {
            // Err means the sender was dropped, which is also a release.
            let _ = previous.await;
        }
        QueueToken {
            position: self.position,
            release: self.release.take(),
        }
    }
}

impl Drop for QueueTicket {
    fn drop(&mut self) {
        let Some(release) = self.release.take() else {
            return;
        };
        // Abandoned before its turn: pass the turn on only after our
        // predecessor finishes, otherwise the next ticket would jump ahead.
        match (self.previous.take(), tokio::runtime::Handle::try_current()) {
            (Some(previous), Ok(handle)) => {
                handle.spawn(async move {
                    let _ = previous.await;
                    drop(release);
                });
            }
            _ => drop(release),
        }
    }
}

impl QueueToken {
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Hand the turn to the next ticket. Same as dropping the token.
    pub fn release(mut self) {
        if let Some(tx) = self.release.take() {
            let _ = tx.send(());
        }
        tracing::debug!(position = self.position, "Approval queue token released");
    }
}
