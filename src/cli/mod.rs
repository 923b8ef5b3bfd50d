//! CLI module for metergate
//!
//! Provides commands:
//! - `serve`: Start the HTTP gateway
//! - `usage`: Per-model token totals for a user
//! - `recent`: A user's most recent usage events

use clap::{Parser, Subcommand};

pub mod usage;

/// Metergate usage-metering gateway CLI
#[derive(Parser, Debug)]
#[command(name = "metergate")]
#[command(about = "Token usage metering gateway")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP gateway
    Serve,
    /// Show per-model token totals for a user
    Usage {
        /// User to report on
        user_id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a user's most recent usage events
    Recent {
        /// User to report on
        user_id: String,
        /// Maximum number of events
        #[arg(short, long, default_value_t = 10)]
        limit: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Run the CLI command
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Some(Commands::Serve) => crate::server::run().await,
        Some(Commands::Usage { user_id, json }) => usage::run_totals(&user_id, json).await,
        Some(Commands::Recent {
            user_id,
            limit,
            json,
        }) => usage::run_recent(&user_id, limit, json).await,
        None => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            cmd.print_help()?;
            println!();
            Ok(())
        }
    }
}
