//! # Query Module
//!
//! Structured read queries against the memory graph.
//!
//! - Every read is a typed value, never query text
//! - Caller input (ids, needles, labels) travels as data
//! - Limits are clamped before the backend sees them

use crate::graph::{GraphStore, clamp_limit};
use crate::primitives::MAX_LIST_LIMIT;
use crate::{EgregoreError, MemoryId, MemoryRecord, Relationship};
use serde::Serialize;

/// Read operations supported by the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryType {
    /// Lookup a single memory.
    Get(MemoryId),

    /// List memories, up to a limit.
    ListNodes { limit: usize },

    /// List relationships, up to a limit.
    ListRelationships { limit: usize },

    /// Case-sensitive substring search over content.
    Search(String),
}

/// A structured query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    /// The type of query operation.
    pub query_type: QueryType,
}

/// Result of executing a [`Query`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryResult {
    /// A single memory, or nothing.
    Node(Option<MemoryRecord>),
    /// A list of memories.
    Nodes(Vec<MemoryRecord>),
    /// A list of relationships.
    Relationships(Vec<Relationship>),
}

impl Query {
    /// Create a new query.
    #[must_use]
    pub fn new(query_type: QueryType) -> Self {
        Self { query_type }
    }

    /// Lookup helper.
    #[must_use]
    pub fn get(id: MemoryId) -> Self {
        Self::new(QueryType::Get(id))
    }

    /// List-memories helper. `None` means the hard maximum.
    #[must_use]
    pub fn list_nodes(limit: Option<usize>) -> Self {
        Self::new(QueryType::ListNodes {
            limit: clamp_limit(limit.unwrap_or(MAX_LIST_LIMIT)),
        })
    }

    /// List-relationships helper. `None` means the hard maximum.
    #[must_use]
    pub fn list_relationships(limit: Option<usize>) -> Self {
        Self::new(QueryType::ListRelationships {
            limit: clamp_limit(limit.unwrap_or(MAX_LIST_LIMIT)),
        })
    }

    /// Substring search helper.
    #[must_use]
    pub fn search(needle: impl Into<String>) -> Self {
        Self::new(QueryType::Search(needle.into()))
    }

    /// Run the query against any backend.
    pub fn execute(&self, store: &dyn GraphStore) -> Result<QueryResult, EgregoreError> {
        match &self.query_type {
            QueryType::Get(id) => store.get_node(*id).map(QueryResult::Node),
            QueryType::ListNodes { limit } => store.list_nodes(*limit).map(QueryResult::Nodes),
            QueryType::ListRelationships { limit } => store
                .list_relationships(*limit)
                .map(QueryResult::Relationships),
            QueryType::Search(needle) => store.search_by_content(needle).map(QueryResult::Nodes),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
