//! # Egregore MCP Server
//!
//! Entry point for the MCP (Model Context Protocol) bridge to Egregore.
//!
//! Reads configuration from environment variables:
//! - `EGREGORE_URL`: Egregore server URL (default: `http://localhost:9000`)
//! - `EGREGORE_API_KEY`: Optional Bearer token for authentication
//!
//! Communicates with AI clients via MCP over stdio and forwards the three
//! memory tools to the Egregore HTTP API.

mod client;
mod server;

use client::EgregoreClient;
use rmcp::{ServiceExt, transport::stdio};
use server::EgregoreMcp;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logging to stderr only; stdout is reserved for MCP stdio transport.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let url = std::env::var("EGREGORE_URL").unwrap_or_else(|_| "http://localhost:9000".into());
    let api_key = std::env::var("EGREGORE_API_KEY")
        .ok()
        .filter(|k| !k.is_empty());

    tracing::info!("Egregore MCP server starting, target: {}", url);

    let client = EgregoreClient::new(url, api_key);
    let mcp = EgregoreMcp::new(client);

    let service = mcp.serve(stdio()).await.inspect_err(|e| {
        tracing::error!("MCP serve error: {:?}", e);
    })?;

    service.waiting().await?;
    Ok(())
}
