//! # API Request/Response Types
//!
//! JSON structures for the HTTP API. Tool routes answer with the tool
//! payloads from [`crate::tools`] as-is; the types here cover the request
//! bodies and the graph management routes.

use egregore_core::{EgregoreError, MemoryRecord, Metadata, RelationType, Relationship};
use serde::{Deserialize, Serialize};

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Liveness response for `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub instance: String,
}

impl HealthResponse {
    pub fn ok(instance: &str) -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            instance: instance.to_string(),
        }
    }
}

// =============================================================================
// TOOL REQUESTS
// =============================================================================

/// Body of `POST /tools/recall`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecallRequest {
    pub query: String,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Body of `POST /tools/store`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreRequest {
    pub data: String,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub tags: String,
}

// =============================================================================
// MEMORY REQUESTS/RESPONSES
// =============================================================================

/// Body of `POST /memories` (direct path, graph only).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMemoryRequest {
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
}

/// Response of `POST /memories`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMemoryResponse {
    pub id: String,
}

/// Response of `GET /memories` and `GET /search`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryListResponse {
    pub count: usize,
    pub memories: Vec<MemoryRecord>,
}

impl MemoryListResponse {
    pub fn new(memories: Vec<MemoryRecord>) -> Self {
        Self {
            count: memories.len(),
            memories,
        }
    }
}

/// Response of `DELETE /memories/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub deleted: bool,
}

/// Query string for list routes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    pub limit: Option<usize>,
}

/// Query string for `GET /search`.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchParams {
    pub q: String,
}

// =============================================================================
// RELATIONSHIP REQUESTS/RESPONSES
// =============================================================================

/// Body of `POST /relationships`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRelationshipRequest {
    pub source_id: String,
    pub target_id: String,
    /// Defaults to `RELATED_TO`.
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub properties: Metadata,
}

impl CreateRelationshipRequest {
    /// Parse ids and fill in the default label.
    pub fn to_relationship(&self) -> Result<Relationship, EgregoreError> {
        let kind = self
            .kind
            .as_deref()
            .map(RelationType::new)
            .unwrap_or_default();
        Ok(
            Relationship::new(self.source_id.parse()?, self.target_id.parse()?, kind)
                .with_properties(self.properties.clone()),
        )
    }
}

/// Response of `POST /relationships`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRelationshipResponse {
    pub created: bool,
}

/// Response of `GET /relationships`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipListResponse {
    pub count: usize,
    pub relationships: Vec<Relationship>,
}

// =============================================================================
// ERROR RESPONSE
// =============================================================================

/// Error body for the management routes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
}

impl From<&EgregoreError> for ErrorResponse {
    fn from(e: &EgregoreError) -> Self {
        Self {
            error: e.to_string(),
            kind: e.kind().to_string(),
        }
    }
}
