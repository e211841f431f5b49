//! # Egregore CLI Module
//!
//! ## Available Commands
//!
//! - `start` - Start the daemon (or run attached with `--foreground`)
//! - `stop` - Stop the daemon
//! - `status` - Show whether the daemon is running
//! - `restart` - Stop, then start
//! - `logs` - Show (or follow) the daemon log
//! - `stats` - Print graph statistics

mod commands;

use crate::config::Settings;
use crate::daemon::DEFAULT_TAIL_LINES;
use clap::{Parser, Subcommand};
use egregore_core::EgregoreError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Egregore - shared memory for agents
///
/// Graph-backed memories with semantic recall, served by a single daemon
/// per host.
#[derive(Parser, Debug)]
#[command(name = "egregore")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to a TOML config file (default: ./egregore.toml if present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the daemon
    Start {
        /// Run attached to this terminal instead of detaching
        #[arg(short, long)]
        foreground: bool,
    },

    /// Stop the daemon (SIGTERM, then SIGKILL after 5 seconds)
    Stop,

    /// Show daemon status
    Status,

    /// Restart the daemon
    Restart,

    /// Show the daemon log
    Logs {
        /// Keep printing new lines until interrupted
        #[arg(short, long)]
        follow: bool,

        /// Number of lines to show
        #[arg(short = 'n', long, default_value_t = DEFAULT_TAIL_LINES)]
        lines: usize,
    },

    /// Print graph statistics
    Stats,

    /// Run the server in this process (used by `start`)
    #[command(hide = true)]
    Serve,
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), EgregoreError> {
    let settings = Settings::load(cli.config.as_deref())?;
    let config = cli.config.as_deref();
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Start { foreground: true } | Commands::Serve) => cmd_serve(&settings).await,
        Some(Commands::Start { foreground: false }) => cmd_start(&settings, config).await,
        Some(Commands::Stop) => cmd_stop(&settings).await,
        Some(Commands::Restart) => cmd_restart(&settings, config).await,
        Some(Commands::Logs { follow, lines }) => cmd_logs(&settings, follow, lines).await,
        Some(Commands::Stats) => cmd_stats(&settings, json_mode).await,
        Some(Commands::Status) | None => cmd_status(&settings, json_mode),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_daemon_commands() {
        let cli = Cli::try_parse_from(["egregore", "logs", "-f", "-n", "10"]).expect("parse");
        assert!(matches!(
            cli.command,
            Some(Commands::Logs {
                follow: true,
                lines: 10
            })
        ));

        let cli = Cli::try_parse_from(["egregore", "logs"]).expect("parse");
        assert!(matches!(
            cli.command,
            Some(Commands::Logs {
                follow: false,
                lines: DEFAULT_TAIL_LINES
            })
        ));

        let cli = Cli::try_parse_from(["egregore", "--config", "e.toml", "start", "--foreground"])
            .expect("parse");
        assert_eq!(cli.config, Some(PathBuf::from("e.toml")));
        assert!(matches!(
            cli.command,
            Some(Commands::Start { foreground: true })
        ));
    }

    #[test]
    fn unknown_command_is_rejected() {
        assert!(Cli::try_parse_from(["egregore", "launch"]).is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
