//! # Egregore HTTP API Module
//!
//! This module implements the HTTP server using axum. It hosts both
//! surfaces: the agent tools and graph management.
//!
//! ## Endpoints
//!
//! Tools (always `200 OK` with a JSON payload):
//! - `POST /tools/recall` - Semantic recall (similarity index only)
//! - `POST /tools/store` - Semantic write (graph + index)
//! - `GET|POST /tools/health_check` - Probe both stores
//!
//! Graph management (direct path, never touches the index):
//! - `POST /memories` / `GET /memories` - Create / list memories
//! - `GET /memories/{id}` / `DELETE /memories/{id}` - Fetch / delete one memory
//! - `POST /relationships` / `GET /relationships` - Create / list relationships
//! - `GET /search?q=` - Case-sensitive substring search
//! - `GET /stats` - Graph statistics
//! - `GET /health` - Liveness
//!
//! ## Security Configuration
//!
//! From [`HttpSettings`] (`EGREGORE_CORS_ORIGINS`, `EGREGORE_RATE_LIMIT`,
//! `EGREGORE_API_KEY`).

mod auth;
mod handlers;
mod middleware;
mod types;

pub use auth::ApiKey;
pub use middleware::{GlobalRateLimiter, create_rate_limiter};
pub use types::{
    CreateMemoryRequest, CreateMemoryResponse, CreateRelationshipRequest,
    CreateRelationshipResponse, DeleteResponse, ErrorResponse, HealthResponse, MemoryListResponse,
    RecallRequest, RelationshipListResponse, StoreRequest,
};

use crate::config::HttpSettings;
use crate::store::GraphHandle;
use crate::tools::Tools;
use crate::vector::VectorClient;
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post},
};
use egregore_core::EgregoreError;
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state. Built once per process and cloned into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Agent tool surface (semantic path).
    pub tools: Tools<VectorClient>,
    /// Graph handle for the management routes (direct path).
    pub graph: GraphHandle,
    /// Instance name reported by `/health`.
    pub instance: Arc<str>,
}

impl AppState {
    /// Create app state from a graph handle and an index client.
    #[must_use]
    pub fn new(graph: GraphHandle, index: Arc<VectorClient>, instance: &str) -> Self {
        Self {
            tools: Tools::new(graph.clone(), index),
            graph,
            instance: Arc::from(instance),
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

const CORS_METHODS: [Method; 4] = [Method::GET, Method::POST, Method::DELETE, Method::OPTIONS];

/// Build the CORS layer.
///
/// - `"*"`: allows all origins (development only)
/// - `None`: localhost only
/// - Otherwise: comma-separated list of allowed origins
fn build_cors_layer(origins: Option<&str>) -> CorsLayer {
    match origins {
        Some("*") => {
            tracing::warn!(
                "CORS: Allowing ALL origins (EGREGORE_CORS_ORIGINS=*). This is insecure for production!"
            );
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| {
                    let trimmed = s.trim();
                    match trimmed.parse::<HeaderValue>() {
                        Ok(hv) => {
                            tracing::info!("CORS: Allowing origin: {}", trimmed);
                            Some(hv)
                        }
                        Err(e) => {
                            tracing::warn!("CORS: Invalid origin '{}': {}", trimmed, e);
                            None
                        }
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!("CORS: No valid origins configured, defaulting to localhost only");
                build_localhost_cors()
            } else {
                CorsLayer::new()
                    .allow_origin(allowed_origins)
                    .allow_methods(CORS_METHODS)
                    .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
            }
        }
        None => {
            tracing::info!("CORS: No origins configured, defaulting to localhost only");
            build_localhost_cors()
        }
    }
}

/// Build a restrictive CORS layer that only allows localhost origins.
fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:9000",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:9000",
    ]
    .into_iter()
    .filter_map(|o| o.parse::<HeaderValue>().ok())
    .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(CORS_METHODS)
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing - logs all requests
/// 2. CORS - handles preflight requests
/// 3. Rate Limiting - protects against floods (if enabled)
/// 4. Authentication - validates API key (if configured)
pub fn create_router(state: AppState, http: &HttpSettings) -> Router {
    let cors = build_cors_layer(http.cors_origins.as_deref());

    let rate_limiter = if http.rate_limit > 0 {
        tracing::info!("Rate limiting enabled: {} requests/second", http.rate_limit);
        Some(create_rate_limiter(http.rate_limit))
    } else {
        tracing::info!("Rate limiting disabled");
        None
    };

    let api_key = http
        .api_key
        .as_deref()
        .filter(|k| !k.is_empty())
        .map(ApiKey::new);
    if api_key.is_some() {
        tracing::info!("API key authentication enabled");
    } else {
        tracing::warn!(
            "API key authentication DISABLED - all endpoints are publicly accessible! \
             Set EGREGORE_API_KEY to enable authentication."
        );
    }

    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/tools/recall", post(handlers::recall_handler))
        .route("/tools/store", post(handlers::store_handler))
        .route(
            "/tools/health_check",
            get(handlers::health_check_handler).post(handlers::health_check_handler),
        )
        .route(
            "/memories",
            get(handlers::list_memories_handler).post(handlers::create_memory_handler),
        )
        .route(
            "/memories/{id}",
            get(handlers::get_memory_handler).delete(handlers::delete_memory_handler),
        )
        .route(
            "/relationships",
            get(handlers::list_relationships_handler).post(handlers::create_relationship_handler),
        )
        .route("/search", get(handlers::search_handler))
        .route("/stats", get(handlers::stats_handler));

    // Authentication is innermost: runs last on the request.
    if let Some(key) = api_key {
        router = router.layer(axum_middleware::from_fn_with_state(
            key,
            auth::api_key_auth_middleware,
        ));
    }

    if let Some(limiter) = rate_limiter {
        router = router.layer(axum_middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit_middleware,
        ));
    }

    router
        .layer(axum::extract::DefaultBodyLimit::max(2 * 1024 * 1024))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Bind and serve until `shutdown` resolves.
pub async fn run_server(
    addr: &str,
    state: AppState,
    http: &HttpSettings,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), EgregoreError> {
    let router = create_router(state, http);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| EgregoreError::IoError(format!("Bind failed on {}: {}", addr, e)))?;

    tracing::info!("Egregore HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| EgregoreError::IoError(format!("Server error: {}", e)))
}
