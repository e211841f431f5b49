//! # Egregore MCP Server
//!
//! Implements `ServerHandler` with the three memory tools. Each one proxies
//! to the matching `/tools/*` route and returns its JSON payload as text.

use crate::client::EgregoreClient;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    schemars, tool, tool_handler, tool_router,
};
use serde::Deserialize;

// =============================================================================
// MCP SERVER
// =============================================================================

/// MCP server that bridges to an Egregore HTTP API.
#[derive(Clone)]
pub struct EgregoreMcp {
    client: EgregoreClient,
    #[allow(dead_code)]
    tool_router: ToolRouter<Self>,
}

// =============================================================================
// TOOL PARAMETER STRUCTS
// =============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct RecallParams {
    /// What to remember, in natural language.
    #[schemars(description = "What to remember, in natural language")]
    pub query: String,
    /// Maximum number of memories (default: 5).
    #[schemars(description = "Maximum number of memories (default: 5)")]
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct StoreParams {
    /// The memory to store.
    #[schemars(description = "The memory to store")]
    pub data: String,
    /// Where this memory came from (e.g. "bugfix").
    #[schemars(description = "Where this memory came from (e.g. 'bugfix')")]
    #[serde(default)]
    pub context: Option<String>,
    /// Comma-separated tags.
    #[schemars(description = "Comma-separated tags (e.g. 'cors, http')")]
    #[serde(default)]
    pub tags: Option<String>,
}

// =============================================================================
// TOOL IMPLEMENTATIONS
// =============================================================================

#[tool_router]
impl EgregoreMcp {
    pub fn new(client: EgregoreClient) -> Self {
        Self {
            client,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "Recall memories related to a query, ranked by similarity")]
    async fn recall_memory(
        &self,
        params: Parameters<RecallParams>,
    ) -> Result<CallToolResult, McpError> {
        let RecallParams { query, limit } = params.0;
        to_result(self.client.recall(&query, limit).await)
    }

    #[tool(description = "Store a memory so it can be recalled later")]
    async fn store_memory(
        &self,
        params: Parameters<StoreParams>,
    ) -> Result<CallToolResult, McpError> {
        let StoreParams {
            data,
            context,
            tags,
        } = params.0;
        to_result(
            self.client
                .store(
                    &data,
                    context.as_deref().unwrap_or_default(),
                    tags.as_deref().unwrap_or_default(),
                )
                .await,
        )
    }

    #[tool(description = "Check that the memory graph and the similarity index are reachable")]
    async fn health_check(&self) -> Result<CallToolResult, McpError> {
        to_result(self.client.health_check().await)
    }
}

// =============================================================================
// SERVER HANDLER
// =============================================================================

#[tool_handler]
impl ServerHandler for EgregoreMcp {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Egregore shared memory. Use store_memory to remember facts and \
                 recall_memory to find them again."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

// =============================================================================
// RESPONSE FORMATTING
// =============================================================================

/// The tool payload as pretty JSON text. Tool-level errors (`{"error": ..}`)
/// are still successful calls; only transport failures are MCP errors.
fn to_result(
    resp: Result<serde_json::Value, crate::client::ClientError>,
) -> Result<CallToolResult, McpError> {
    match resp {
        Ok(payload) => {
            let text = serde_json::to_string_pretty(&payload).unwrap_or_default();
            Ok(CallToolResult::success(vec![Content::text(text)]))
        }
        Err(e) => Err(McpError::internal_error(format!("{e}"), None)),
    }
}
