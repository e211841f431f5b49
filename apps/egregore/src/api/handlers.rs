//! # API Endpoint Handlers
//!
//! Tool routes always answer `200 OK` with the tool payload, even for a
//! body that does not parse. Management routes map [`EgregoreError`] kinds
//! onto HTTP status codes.

use super::{
    AppState,
    types::{
        CreateMemoryRequest, CreateMemoryResponse, CreateRelationshipRequest,
        CreateRelationshipResponse, DeleteResponse, ErrorResponse, HealthResponse, ListParams,
        MemoryListResponse, RecallRequest, RelationshipListResponse, SearchParams, StoreRequest,
    },
};
use axum::{
    Json,
    extract::{Path, Query as QueryParams, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use egregore_core::{EgregoreError, MemoryId, Query, QueryResult};
use serde_json::{Value, json};

/// Map an error onto a status code and JSON body.
fn error_response(e: &EgregoreError) -> Response {
    let status = match e {
        EgregoreError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        EgregoreError::NodeNotFound(_) => StatusCode::NOT_FOUND,
        EgregoreError::EndpointMissing(_)
        | EgregoreError::SelfLoopRejected(_)
        | EgregoreError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        tracing::error!(kind = e.kind(), error = %e, "request failed");
    }
    (status, Json(ErrorResponse::from(e))).into_response()
}

fn parse_id(raw: &str) -> Result<MemoryId, Response> {
    raw.parse::<MemoryId>().map_err(|e| error_response(&e))
}

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Liveness endpoint. Does not probe the stores; see `/tools/health_check`.
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse::ok(&state.instance))
}

// =============================================================================
// TOOL HANDLERS
// =============================================================================

fn malformed(rejection: &JsonRejection) -> String {
    let reason = rejection.body_text();
    tracing::debug!(status = %rejection.status(), %reason, "malformed tool request");
    format!("Invalid request: {reason}")
}

/// `recall` tool.
pub async fn recall_handler(
    State(state): State<AppState>,
    request: Result<Json<RecallRequest>, JsonRejection>,
) -> Json<Value> {
    match request {
        Ok(Json(request)) => Json(state.tools.recall(&request.query, request.limit).await),
        Err(rejection) => Json(json!({ "error": malformed(&rejection), "query": "" })),
    }
}

/// `store` tool (semantic path).
pub async fn store_handler(
    State(state): State<AppState>,
    request: Result<Json<StoreRequest>, JsonRejection>,
) -> Json<Value> {
    match request {
        Ok(Json(request)) => Json(
            state
                .tools
                .store(&request.data, &request.context, &request.tags)
                .await,
        ),
        Err(rejection) => Json(json!({ "error": malformed(&rejection), "data": "" })),
    }
}

/// `health_check` tool.
pub async fn health_check_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.tools.health_check().await)
}

// =============================================================================
// MEMORY HANDLERS
// =============================================================================

/// Create a memory on the direct path (graph only, not recallable).
pub async fn create_memory_handler(
    State(state): State<AppState>,
    Json(request): Json<CreateMemoryRequest>,
) -> Response {
    match state
        .tools
        .coordinator()
        .store_direct(request.content, request.metadata)
        .await
    {
        Ok(outcome) => (
            StatusCode::CREATED,
            Json(CreateMemoryResponse {
                id: outcome.id.to_string(),
            }),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

/// List memories.
pub async fn list_memories_handler(
    State(state): State<AppState>,
    QueryParams(params): QueryParams<ListParams>,
) -> Response {
    match state.graph.query(Query::list_nodes(params.limit)).await {
        Ok(QueryResult::Nodes(memories)) => Json(MemoryListResponse::new(memories)).into_response(),
        Ok(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        Err(e) => error_response(&e),
    }
}

/// Fetch one memory.
pub async fn get_memory_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match state.graph.get_node(id).await {
        Ok(Some(record)) => Json(record).into_response(),
        Ok(None) => error_response(&EgregoreError::NodeNotFound(id)),
        Err(e) => error_response(&e),
    }
}

/// Delete a memory and every relationship touching it.
pub async fn delete_memory_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match state.graph.delete_node(id).await {
        Ok(true) => {
            tracing::info!(%id, "deleted memory");
            Json(DeleteResponse { deleted: true }).into_response()
        }
        Ok(false) => (StatusCode::NOT_FOUND, Json(DeleteResponse { deleted: false })).into_response(),
        Err(e) => error_response(&e),
    }
}

/// Substring search over memory content.
pub async fn search_handler(
    State(state): State<AppState>,
    QueryParams(params): QueryParams<SearchParams>,
) -> Response {
    match state.graph.query(Query::search(params.q)).await {
        Ok(QueryResult::Nodes(memories)) => Json(MemoryListResponse::new(memories)).into_response(),
        Ok(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        Err(e) => error_response(&e),
    }
}

// =============================================================================
// RELATIONSHIP HANDLERS
// =============================================================================

/// Create a relationship between two existing memories.
pub async fn create_relationship_handler(
    State(state): State<AppState>,
    Json(request): Json<CreateRelationshipRequest>,
) -> Response {
    let relationship = match request.to_relationship() {
        Ok(r) => r,
        Err(e) => return error_response(&e),
    };
    match state.graph.create_relationship(relationship).await {
        Ok(()) => (
            StatusCode::CREATED,
            Json(CreateRelationshipResponse { created: true }),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

/// List relationships.
pub async fn list_relationships_handler(
    State(state): State<AppState>,
    QueryParams(params): QueryParams<ListParams>,
) -> Response {
    match state
        .graph
        .query(Query::list_relationships(params.limit))
        .await
    {
        Ok(QueryResult::Relationships(relationships)) => Json(RelationshipListResponse {
            count: relationships.len(),
            relationships,
        })
        .into_response(),
        Ok(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        Err(e) => error_response(&e),
    }
}

// =============================================================================
// STATS HANDLER
// =============================================================================

/// Graph statistics.
pub async fn stats_handler(State(state): State<AppState>) -> Response {
    match state.graph.snapshot().await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => error_response(&e),
    }
}
