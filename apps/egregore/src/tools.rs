//! # Tool Surface
//!
//! The three agent-facing tools: `recall`, `store` and `health_check`.
//!
//! Tool calls never fail at the transport level. Every outcome, including
//! errors, is a JSON payload:
//!
//! | Tool | Success | Failure |
//! |------|---------|---------|
//! | recall | `{query, memories_found, memories}` | `{error, query}` |
//! | store | `{status, memory_ids, context}` (+ `stores` when partial) | `{error, data}` |
//! | health_check | `{status, components}` | `{status: "error", message}` |

use crate::coordinator::WriteCoordinator;
use crate::recall::SearchAggregator;
use crate::store::GraphHandle;
use crate::vector::VectorIndex;
use egregore_core::Metadata;
use serde_json::{Value, json};
use std::sync::Arc;

/// Echoed failed `store` input is cut to this many characters.
const ECHO_DATA_CHARS: usize = 100;

/// Split a comma-separated tag list; entries are trimmed, empties dropped.
#[must_use]
pub fn parse_tags(tags: &str) -> Vec<String> {
    tags.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Metadata for a `store` call. Empty context and tags are omitted.
#[must_use]
pub fn build_metadata(context: &str, tags: &str) -> Metadata {
    let mut metadata = Metadata::new();
    if !context.is_empty() {
        metadata.insert("context".to_string(), Value::String(context.to_string()));
    }
    let tags = parse_tags(tags);
    if !tags.is_empty() {
        metadata.insert("tags".to_string(), json!(tags));
    }
    metadata
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// The tool surface, shared by the HTTP routes and the MCP bridge.
#[derive(Debug)]
pub struct Tools<V> {
    graph: GraphHandle,
    coordinator: WriteCoordinator<V>,
    recall: SearchAggregator<V>,
}

impl<V> Clone for Tools<V> {
    fn clone(&self) -> Self {
        Self {
            graph: self.graph.clone(),
            coordinator: self.coordinator.clone(),
            recall: self.recall.clone(),
        }
    }
}

impl<V: VectorIndex> Tools<V> {
    /// Wire the tools to one graph and one index.
    #[must_use]
    pub fn new(graph: GraphHandle, index: Arc<V>) -> Self {
        let timeout = graph.timeout();
        Self {
            coordinator: WriteCoordinator::new(graph.clone(), Arc::clone(&index)),
            recall: SearchAggregator::new(index, timeout),
            graph,
        }
    }

    /// The write coordinator behind `store`.
    #[must_use]
    pub fn coordinator(&self) -> &WriteCoordinator<V> {
        &self.coordinator
    }

    /// `recall(query, limit = 5)`.
    pub async fn recall(&self, query: &str, limit: Option<usize>) -> Value {
        match self.recall.recall(query, limit).await {
            Ok(result) => json!(result),
            Err(e) => {
                tracing::warn!(error = %e, "recall failed");
                json!({ "error": e.to_string(), "query": query })
            }
        }
    }

    /// `store(data, context = "", tags = "")`, semantic path.
    pub async fn store(&self, data: &str, context: &str, tags: &str) -> Value {
        let metadata = build_metadata(context, tags);
        match self
            .coordinator
            .store_semantic(data.to_string(), metadata)
            .await
        {
            Ok(outcome) if outcome.is_partial() => json!({
                "status": "partial",
                "memory_ids": [outcome.id],
                "context": context,
                "stores": outcome.stores,
                "error": outcome.index_error,
            }),
            Ok(outcome) => json!({
                "status": "stored",
                "memory_ids": [outcome.id],
                "context": context,
            }),
            Err(e) => {
                tracing::warn!(error = %e, "store failed");
                json!({ "error": e.to_string(), "data": truncate_chars(data, ECHO_DATA_CHARS) })
            }
        }
    }

    /// `health_check()`: probes the graph and the index concurrently.
    pub async fn health_check(&self) -> Value {
        let probes = async { tokio::join!(self.graph.ping(), self.recall.ping()) };
        // Probes are bounded individually as well.
        let budget = self.graph.timeout().saturating_mul(2);

        match tokio::time::timeout(budget, probes).await {
            Ok((graph, index)) => {
                if let Err(e) = &graph {
                    tracing::warn!(error = %e, "graph health probe failed");
                }
                if let Err(e) = &index {
                    tracing::warn!(error = %e, "vector index health probe failed");
                }
                let healthy = graph.is_ok() && index.is_ok();
                json!({
                    "status": if healthy { "healthy" } else { "unhealthy" },
                    "components": {
                        "graph": graph.is_ok(),
                        "vector_index": index.is_ok(),
                    },
                })
            }
            Err(_) => json!({
                "status": "error",
                "message": "health probes did not complete in time",
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::MemoryIndex;
    use egregore_core::StorageBackend;
    use std::time::Duration;

    fn tools() -> Tools<MemoryIndex> {
        let graph = GraphHandle::new(StorageBackend::default(), Duration::from_secs(5));
        Tools::new(graph, Arc::new(MemoryIndex::new()))
    }

    #[test]
    fn tags_are_split_trimmed_and_filtered() {
        assert_eq!(parse_tags(" cors , http,, ,auth "), vec!["cors", "http", "auth"]);
        assert!(parse_tags("").is_empty());
        assert!(parse_tags(" , ").is_empty());
    }

    #[test]
    fn empty_context_and_tags_are_omitted() {
        assert!(build_metadata("", "").is_empty());
        let metadata = build_metadata("bugfix", "cors");
        assert_eq!(metadata["context"], "bugfix");
        assert_eq!(metadata["tags"], json!(["cors"]));
    }

    #[test]
    fn echo_truncates_on_char_boundary() {
        let text = "é".repeat(150);
        assert_eq!(truncate_chars(&text, 100).chars().count(), 100);
    }

    #[tokio::test]
    async fn store_then_recall() {
        let tools = tools();
        let stored = tools.store("fix CORS bug", "bugfix", "cors, http").await;
        assert_eq!(stored["status"], "stored");
        assert_eq!(stored["context"], "bugfix");
        let id = stored["memory_ids"][0].as_str().expect("id").to_string();

        let recalled = tools.recall("CORS", Some(5)).await;
        assert_eq!(recalled["memories_found"], 1);
        assert_eq!(recalled["memories"][0]["id"], id);
        assert_eq!(recalled["memories"][0]["metadata"]["tags"], json!(["cors", "http"]));
    }

    #[tokio::test]
    async fn store_failure_echoes_truncated_data() {
        let tools = tools();
        let oversized = "y".repeat(egregore_core::primitives::MAX_CONTENT_LENGTH + 1);
        let payload = tools.store(&oversized, "", "").await;
        assert!(payload["error"].is_string());
        assert_eq!(payload["data"].as_str().expect("data").len(), 100);
    }

    #[tokio::test]
    async fn recall_failure_carries_query() {
        let payload = tools().recall("", None).await;
        assert!(payload["error"].is_string());
        assert_eq!(payload["query"], "");
    }

    #[tokio::test]
    async fn health_reports_components() {
        let payload = tools().health_check().await;
        assert_eq!(payload["status"], "healthy");
        assert_eq!(payload["components"]["graph"], true);
        assert_eq!(payload["components"]["vector_index"], true);
    }
}
