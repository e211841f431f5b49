//! # Graph Engine
//!
//! The memory graph for Egregore.
//!
//! This module defines the `GraphStore` trait and its in-memory
//! implementation. The persistent implementation lives in
//! [`crate::storage::RedbGraph`].
//!
//! Every operation is atomic on its own. There are no cross-call
//! transactions: a caller that needs several operations to agree must not
//! assume that nothing happened in between.

use crate::primitives::{
    MAX_CONTENT_LENGTH, MAX_LIST_LIMIT, MAX_NEEDLE_LENGTH, MAX_RELATION_TYPE_LENGTH,
    MAX_SEARCH_RESULTS,
};
use crate::{EgregoreError, MemoryId, MemoryRecord, Metadata, RelationType, Relationship};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// GRAPHSTORE TRAIT
// =============================================================================

/// The GraphStore trait defines the memory graph operations.
///
/// All reads are bounded by the caps in [`crate::primitives`].
///
/// All fallible operations return `Result<T, EgregoreError>` so in-memory
/// and persistent backends are interchangeable. Backend failures surface
/// as `EgregoreError::StoreUnavailable`; nothing is retried internally.
pub trait GraphStore {
    /// Persist a fully built record.
    ///
    /// Fails with `InvalidInput` if a record with the same id already
    /// exists: ids are never reused and records are never updated.
    fn insert_record(&mut self, record: MemoryRecord) -> Result<(), EgregoreError>;

    /// Lookup a memory by id.
    fn get_node(&self, id: MemoryId) -> Result<Option<MemoryRecord>, EgregoreError>;

    /// Check if a memory exists.
    fn contains_node(&self, id: MemoryId) -> Result<bool, EgregoreError>;

    /// Create a directed relationship.
    ///
    /// Fails with `SelfLoopRejected` when source equals target and with
    /// `EndpointMissing` when either endpoint does not exist. Creating an
    /// existing `(source, target, type)` triple replaces its properties.
    fn create_relationship(&mut self, relationship: Relationship) -> Result<(), EgregoreError>;

    /// Up to `limit` memories (capped at `MAX_LIST_LIMIT`).
    /// Ordering is backend-defined.
    fn list_nodes(&self, limit: usize) -> Result<Vec<MemoryRecord>, EgregoreError>;

    /// Up to `limit` relationships (capped at `MAX_LIST_LIMIT`).
    fn list_relationships(&self, limit: usize) -> Result<Vec<Relationship>, EgregoreError>;

    /// Every memory whose content contains `needle` verbatim (case-sensitive),
    /// capped at `MAX_SEARCH_RESULTS`.
    fn search_by_content(&self, needle: &str) -> Result<Vec<MemoryRecord>, EgregoreError>;

    /// Delete a memory and every relationship touching it in one step.
    ///
    /// Returns `false` if the memory did not exist.
    fn delete_node(&mut self, id: MemoryId) -> Result<bool, EgregoreError>;

    /// Total number of memories.
    fn node_count(&self) -> Result<usize, EgregoreError>;

    /// Total number of relationships.
    fn edge_count(&self) -> Result<usize, EgregoreError>;

    /// Number of distinct relationship labels in use.
    fn distinct_relation_types(&self) -> Result<usize, EgregoreError>;

    /// Create a memory from content and metadata. Returns the fresh id.
    fn create_node(&mut self, content: &str, metadata: Metadata) -> Result<MemoryId, EgregoreError> {
        validate_content(content)?;
        let record = MemoryRecord::new(content, metadata);
        let id = record.id;
        self.insert_record(record)?;
        Ok(id)
    }
}

// =============================================================================
// VALIDATION
// =============================================================================

/// Reject content that is too large to store.
pub fn validate_content(content: &str) -> Result<(), EgregoreError> {
    if content.len() > MAX_CONTENT_LENGTH {
        return Err(EgregoreError::InvalidInput(format!(
            "Content length {} exceeds maximum {} bytes",
            content.len(),
            MAX_CONTENT_LENGTH
        )));
    }
    Ok(())
}

/// Structural checks that do not need the backend: self-loops and labels.
pub fn validate_relationship(relationship: &Relationship) -> Result<(), EgregoreError> {
    if relationship.source == relationship.target {
        return Err(EgregoreError::SelfLoopRejected(relationship.source));
    }
    let label = relationship.kind.as_str();
    if label.trim().is_empty() {
        return Err(EgregoreError::InvalidInput(
            "Relationship type must not be empty".to_string(),
        ));
    }
    if label.len() > MAX_RELATION_TYPE_LENGTH {
        return Err(EgregoreError::InvalidInput(format!(
            "Relationship type length {} exceeds maximum {} bytes",
            label.len(),
            MAX_RELATION_TYPE_LENGTH
        )));
    }
    Ok(())
}

/// Reject oversized search needles.
pub fn validate_needle(needle: &str) -> Result<(), EgregoreError> {
    if needle.len() > MAX_NEEDLE_LENGTH {
        return Err(EgregoreError::InvalidInput(format!(
            "Search text length {} exceeds maximum {} bytes",
            needle.len(),
            MAX_NEEDLE_LENGTH
        )));
    }
    Ok(())
}

/// Clamp a caller-supplied list limit to the hard maximum.
#[must_use]
pub fn clamp_limit(limit: usize) -> usize {
    limit.min(MAX_LIST_LIMIT)
}

// =============================================================================
// GRAPH IMPLEMENTATION
// =============================================================================

/// Edge key: (source, target, label).
type EdgeKey = (MemoryId, MemoryId, RelationType);

/// The in-memory Graph.
///
/// Volatile: everything is lost when the value is dropped. Used for tests
/// and for `backend = "memory"` deployments.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    /// Node storage: MemoryId -> record
    nodes: BTreeMap<MemoryId, MemoryRecord>,

    /// Edge storage: (source, target, label) -> properties
    edges: BTreeMap<EdgeKey, Metadata>,
}

impl Graph {
    /// Create a new empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl GraphStore for Graph {
    fn insert_record(&mut self, record: MemoryRecord) -> Result<(), EgregoreError> {
        validate_content(&record.content)?;
        if self.nodes.contains_key(&record.id) {
            return Err(EgregoreError::InvalidInput(format!(
                "Memory {} already exists",
                record.id
            )));
        }
        self.nodes.insert(record.id, record);
        Ok(())
    }

    fn get_node(&self, id: MemoryId) -> Result<Option<MemoryRecord>, EgregoreError> {
        Ok(self.nodes.get(&id).cloned())
    }

    fn contains_node(&self, id: MemoryId) -> Result<bool, EgregoreError> {
        Ok(self.nodes.contains_key(&id))
    }

    fn create_relationship(&mut self, relationship: Relationship) -> Result<(), EgregoreError> {
        validate_relationship(&relationship)?;
        for endpoint in [relationship.source, relationship.target] {
            if !self.nodes.contains_key(&endpoint) {
                return Err(EgregoreError::EndpointMissing(endpoint));
            }
        }
        let Relationship {
            source,
            target,
            kind,
            properties,
        } = relationship;
        self.edges.insert((source, target, kind), properties);
        Ok(())
    }

    fn list_nodes(&self, limit: usize) -> Result<Vec<MemoryRecord>, EgregoreError> {
        Ok(self
            .nodes
            .values()
            .take(clamp_limit(limit))
            .cloned()
            .collect())
    }

    fn list_relationships(&self, limit: usize) -> Result<Vec<Relationship>, EgregoreError> {
        Ok(self
            .edges
            .iter()
            .take(clamp_limit(limit))
            .map(|((source, target, kind), properties)| {
                Relationship::new(*source, *target, kind.clone()).with_properties(properties.clone())
            })
            .collect())
    }

    fn search_by_content(&self, needle: &str) -> Result<Vec<MemoryRecord>, EgregoreError> {
        validate_needle(needle)?;
        Ok(self
            .nodes
            .values()
            .filter(|record| record.content.contains(needle))
            .take(MAX_SEARCH_RESULTS)
            .cloned()
            .collect())
    }

    fn delete_node(&mut self, id: MemoryId) -> Result<bool, EgregoreError> {
        if self.nodes.remove(&id).is_none() {
            return Ok(false);
        }
        self.edges
            .retain(|(source, target, _), _| *source != id && *target != id);
        Ok(true)
    }

    fn node_count(&self) -> Result<usize, EgregoreError> {
        Ok(self.nodes.len())
    }

    fn edge_count(&self) -> Result<usize, EgregoreError> {
        Ok(self.edges.len())
    }

    fn distinct_relation_types(&self) -> Result<usize, EgregoreError> {
        let kinds: BTreeSet<&RelationType> = self.edges.keys().map(|(_, _, kind)| kind).collect();
        Ok(kinds.len())
    }
}

// =============================================================================
// TESTS
// =============================================================================
