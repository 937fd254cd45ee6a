//! `callgate join`: join a meeting as a participant that answers approvals
//! unattended. Handy for demos and for exercising an agent end to end.

use crate::approval::{ApprovalResponder, AutoApprove, AutoDeny};
use crate::gateway::protocol::PeerRole;
use crate::gateway::GatewayClient;
use anyhow::{bail, Result};
use colored::Colorize;
use std::path::Path;

pub async fn run_join(
    socket_path: &Path,
    identity: &str,
    name: &str,
    respond: &str,
    reason: Option<String>,
) -> Result<()> {
    let responder: Box<dyn ApprovalResponder + Send + Sync> = match respond.to_lowercase().as_str() {
        "approve" | "auto-approve" | "yes" => Box::new(AutoApprove),
        "deny" | "auto-deny" | "no" => Box::new(AutoDeny { reason }),
        other => bail!("Unknown --respond mode '{}' (expected approve or deny)", other),
    };

    let client = GatewayClient::connect(socket_path, identity, name, PeerRole::Participant).await?;

    println!();
    println!(
        "  {} Joined {} as {} ({})",
        "✓".green().bold(),
        client.meeting_id().cyan(),
        name.bold(),
        identity.dimmed()
    );
    println!("  Answering approval requests with: {}", respond.bold());
    println!();

    client.serve_approvals(responder.as_ref()).await
}
