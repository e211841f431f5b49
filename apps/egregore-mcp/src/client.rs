//! # Egregore HTTP Client
//!
//! Calls the `/tools/*` routes of the Egregore server.

use serde_json::{Value, json};

/// Errors from the HTTP client layer.
#[derive(Debug)]
pub enum ClientError {
    /// Cannot reach the Egregore server.
    ConnectionFailed(String),
    /// 401 Unauthorized - invalid or missing API key.
    Unauthorized,
    /// 429 Too Many Requests.
    RateLimited,
    /// Server returned an unexpected status.
    ServerError(u16, String),
    /// Failed to parse response body.
    ParseError(String),
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConnectionFailed(url) => write!(f, "Cannot connect to Egregore at {url}"),
            Self::Unauthorized => write!(f, "Unauthorized: invalid or missing API key"),
            Self::RateLimited => write!(f, "Rate limited: too many requests"),
            Self::ServerError(status, msg) => write!(f, "Server error ({status}): {msg}"),
            Self::ParseError(msg) => write!(f, "Parse error: {msg}"),
        }
    }
}

impl std::error::Error for ClientError {}

/// HTTP client for the Egregore tool surface.
#[derive(Clone)]
pub struct EgregoreClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl EgregoreClient {
    /// Create a new client pointing at the given Egregore server URL.
    pub fn new(base_url: String, api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// Send one tool call and parse the JSON payload.
    async fn call(&self, tool: &str, body: &Value) -> Result<Value, ClientError> {
        let url = format!("{}/tools/{}", self.base_url, tool);
        let mut req = self.http.post(&url).json(body);
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| ClientError::ConnectionFailed(format!("{}: {e}", self.base_url)))?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ClientError::Unauthorized);
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ClientError::RateLimited);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::ServerError(status.as_u16(), body));
        }
        resp.json::<Value>()
            .await
            .map_err(|e| ClientError::ParseError(e.to_string()))
    }

    /// POST /tools/recall
    pub async fn recall(&self, query: &str, limit: Option<usize>) -> Result<Value, ClientError> {
        self.call("recall", &json!({ "query": query, "limit": limit }))
            .await
    }

    /// POST /tools/store
    pub async fn store(&self, data: &str, context: &str, tags: &str) -> Result<Value, ClientError> {
        self.call(
            "store",
            &json!({ "data": data, "context": context, "tags": tags }),
        )
        .await
    }

    /// POST /tools/health_check
    pub async fn health_check(&self) -> Result<Value, ClientError> {
        self.call("health_check", &json!({})).await
    }
}
