//! callgate: approval gateway for voice meeting assistants
//!
//! Quick start:
//!   callgate serve                         # host the gateway for .callgate.yaml
//!   callgate join --identity u1 --name Ann # answer approvals as a participant
//!   callgate log                           # see what was proposed and decided

use callgate::{cli, config};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing_subscriber::filter::{Directive, LevelFilter};

#[derive(Parser)]
#[command(
    name = "callgate",
    version,
    about = "Human approval for things your meeting agent wants to do"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Host the approval gateway for a meeting
    Serve {
        /// Path to config file
        #[arg(short, long, env = "CALLGATE_CONFIG", default_value = ".callgate.yaml")]
        config: PathBuf,

        /// Socket to listen on (overrides config)
        #[arg(short, long, env = "CALLGATE_SOCKET")]
        socket: Option<PathBuf>,

        /// Approval timeout in milliseconds (overrides config)
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Don't write an audit log
        #[arg(long)]
        no_audit: bool,
    },

    /// Join a meeting as a participant that answers approvals unattended
    Join {
        #[arg(short, long, env = "CALLGATE_SOCKET", default_value = "/tmp/callgate.sock")]
        socket: PathBuf,

        /// Participant identity (must not start with the agent prefix)
        #[arg(short, long)]
        identity: String,

        /// Display name
        #[arg(short, long)]
        name: String,

        /// How to answer: approve, deny
        #[arg(short, long, default_value = "approve")]
        respond: String,

        /// Reason sent with denials
        #[arg(long)]
        reason: Option<String>,
    },

    /// Validate a config file
    Check {
        #[arg(default_value = ".callgate.yaml")]
        config: PathBuf,
    },

    /// See what the agent proposed and how it ended
    Log {
        /// Meeting to show (default: most recent)
        #[arg(short, long)]
        meeting: Option<String>,

        /// Filter: approved, rejected, timed_out, failed
        #[arg(short, long)]
        outcome: Option<String>,

        /// Filter by approver
        #[arg(short, long)]
        target: Option<String>,

        /// Max entries to show
        #[arg(short, long)]
        limit: Option<usize>,

        /// Show only the summary
        #[arg(long)]
        summary: bool,

        /// List all meetings with logs
        #[arg(long)]
        list: bool,
    },
}

#[tokio::main]
async fn main() {
    let default_level: Directive = "callgate=info"
        .parse()
        .unwrap_or_else(|_| LevelFilter::INFO.into());
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(default_level)
                .from_env_lossy(),
        )
        .with_target(false)
        .init();

    let args = Cli::parse();

    let result = match args.command {
        Commands::Serve {
            config,
            socket,
            timeout_ms,
            no_audit,
        } => {
            cli::serve::run_serve(cli::serve::ServeOptions {
                config_path: config,
                socket,
                timeout_ms,
                audit: !no_audit,
            })
            .await
        }

        Commands::Join {
            socket,
            identity,
            name,
            respond,
            reason,
        } => cli::join::run_join(&socket, &identity, &name, &respond, reason).await,

        Commands::Check { config } => run_check(&config),

        Commands::Log {
            meeting,
            outcome,
            target,
            limit,
            summary,
            list,
        } => {
            if list {
                cli::log::run_log_list()
            } else {
                cli::log::run_log(
                    meeting.as_deref(),
                    outcome.as_deref(),
                    target.as_deref(),
                    limit,
                    summary,
                )
            }
        }
    };

    if let Err(e) = result {
        eprintln!();
        eprintln!("  {} {}", "✗".red().bold(), e);
        for cause in e.chain().skip(1) {
            eprintln!("  {} {}", "caused by:".dimmed(), cause);
        }
        eprintln!();
        std::process::exit(1);
    }
}

/// Run the `callgate check` command.
fn run_check(path: &Path) -> anyhow::Result<()> {
    let config = config::parse_config_file(path)?;

    println!();
    println!("  {} Config is valid!", "✓".green().bold());
    println!("  Meeting: {}", config.meeting_id.cyan());
    println!("  Agent:   {}", config.agent_identity);
    println!(
        "  Never asks identities starting with: {}",
        config.agent_identity_prefix
    );
    println!("  Approval timeout: {} ms", config.approval_timeout_ms);
    println!("  Socket: {}", config.socket_path.display());
    println!();

    Ok(())
}
