//! Participant-side approval responders.
//!
//! A responder answers `requestApproval` RPCs on behalf of a participant's
//! client. The interactive dialog lives in the meeting UI; these are the
//! unattended versions used by `callgate join` and tests.

use crate::approval::types::{ApprovalReply, RemoteApprovalRequest};
use anyhow::Result;
use async_trait::async_trait;

/// Answers approval requests addressed to one participant.
#[async_trait]
pub trait ApprovalResponder {
    async fn respond(&self, request: &RemoteApprovalRequest) -> Result<ApprovalReply>;
}

/// Approves everything without prompting (demos and CI).
pub struct AutoApprove;

#[async_trait]
impl ApprovalResponder for AutoApprove {
    async fn respond(&self, _request: &RemoteApprovalRequest) -> Result<ApprovalReply> {
        Ok(ApprovalReply {
            approved: true,
            modified_payload: None,
            reason: None,
        })
    }
}

/// Declines everything, optionally with a fixed reason.
#[derive(Default)]
pub struct AutoDeny {
    pub reason: Option<String>,
}

#[async_trait]
impl ApprovalResponder for AutoDeny {
    async fn respond(&self, _request: &RemoteApprovalRequest) -> Result<ApprovalReply> {
        Ok(ApprovalReply {
            approved: false,
            modified_payload: None,
            reason: self.reason.clone(),
        })
    }
}
