//! # Egregore - Memory Server
//!
//! ## Usage
//!
//! ```bash
//! # Run the daemon
//! egregore start
//! egregore status
//! egregore logs -f
//! egregore stop
//!
//! # Attached, for development
//! egregore start --foreground
//! ```

use clap::Parser;
use egregore::{cli, daemon};
use egregore_core::EgregoreError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // EGREGORE_LOG_FORMAT=json enables machine-parseable output. Logs go to
    // stderr so command output on stdout stays clean.
    let log_format = std::env::var("EGREGORE_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "egregore=info,tower_http=info".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        let code = match e {
            EgregoreError::AlreadyRunning(_) => daemon::EXIT_ALREADY_RUNNING,
            _ => 1,
        };
        std::process::exit(code);
    }
}
