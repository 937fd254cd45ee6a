//! `callgate serve`: host a meeting's approval gateway.
//!
//! 1. Load the config file
//! 2. Open the audit log
//! 3. Listen on the Unix socket until Ctrl-C

use crate::audit::AuditLogger;
use crate::config::{parse_config_file, Config};
use crate::gateway::GatewayServer;
use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;

/// Options for the `callgate serve` command.
#[derive(Debug)]
pub struct ServeOptions {
    pub config_path: PathBuf,
    /// Overrides the config file's socket
    pub socket: Option<PathBuf>,
    /// Overrides the config file's timeout
    pub timeout_ms: Option<u64>,
    pub audit: bool,
}

pub async fn run_serve(options: ServeOptions) -> Result<()> {
    let config = load_config(&options)?;

    let audit = if options.audit {
        let logger = match config.audit_log {
            Some(ref path) => AuditLogger::with_path(path)?,
            None => AuditLogger::new(&config.meeting_id)?,
        };
        Some(logger)
    } else {
        None
    };

    println!();
    println!(
        "  {} callgate v{}",
        "☎".to_string().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!("  Meeting: {}", config.meeting_id.cyan());
    println!("  Agent:   {}", config.agent_identity.cyan());
    println!("  Timeout: {}s", config.approval_timeout().as_secs_f32());
    println!(
        "  Socket:  {}",
        config.socket_path.display().to_string().dimmed()
    );
    if let Some(ref logger) = audit {
        println!(
            "  Log:     {}",
            logger.log_path().display().to_string().dimmed()
        );
    }
    println!();

    let server = GatewayServer::new(&config, audit);

    tokio::select! {
        result = server.run() => result?,
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl-C")?;
            println!();
            println!("  {} Shutting down", "→".blue());
        }
    }

    if config.socket_path.exists() {
        let _ = std::fs::remove_file(&config.socket_path);
    }

    Ok(())
}

fn load_config(options: &ServeOptions) -> Result<Config> {
    let mut config = parse_config_file(&options.config_path)?;
    if let Some(ref socket) = options.socket {
        config.socket_path = socket.clone();
    }
    if let Some(timeout_ms) = options.timeout_ms {
        anyhow::ensure!(timeout_ms > 0, "--timeout-ms must be greater than zero");
        config.approval_timeout_ms = timeout_ms;
    }
    Ok(config)
}
