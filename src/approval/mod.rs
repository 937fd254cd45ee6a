pub mod invoker;
pub mod responder;
pub mod types;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

pub use invoker::ApprovalInvoker;
pub use responder::{ApprovalResponder, AutoApprove, AutoDeny};
pub use types::*;

/// Failure modes of one request/response exchange with a remote endpoint.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("no response within {0:?}")]
    Timeout(Duration),

    #[error("destination {0} is not connected")]
    Unreachable(String),

    #[error("connection closed before a reply arrived")]
    ConnectionClosed,
}

/// Transport that delivers a request to one remote participant and returns
/// its reply. Implementations must enforce `response_timeout` themselves.
#[async_trait]
pub trait RpcTransport {
    /// The identity requests are sent from, once the connection is established.
    fn local_identity(&self) -> Option<String>;

    async fn perform_rpc(
        &self,
        destination: &str,
        method: &str,
        payload: String,
        response_timeout: Duration,
    ) -> Result<String, RpcError>;
}
