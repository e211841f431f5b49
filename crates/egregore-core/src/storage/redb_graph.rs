//! # redb-backed Graph Storage
//!
//! A disk-backed memory graph using the redb embedded database, providing:
//! - ACID transactions (a cascade delete is one write transaction)
//! - Crash safety (copy-on-write B-trees)
//! - MVCC (concurrent readers, single writer)
//! - Zero configuration
//!
//! ## Layout
//!
//! Relationships are stored twice: once keyed by source (`EDGES`, which
//! owns the properties) and once keyed by target (`INCOMING`, keys only).
//! Both copies are always written and removed in the same transaction, so a
//! reader can never observe one without the other.

use crate::graph::{
    GraphStore, clamp_limit, validate_content, validate_needle, validate_relationship,
};
use crate::primitives::MAX_SEARCH_RESULTS;
use crate::{EgregoreError, MemoryId, MemoryRecord, Metadata, RelationType, Relationship};
use chrono::{DateTime, Utc};
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::Display;
use std::path::Path;

/// Table for nodes: MemoryId(u128) -> serialized `StoredRecord` bytes
const NODES: TableDefinition<u128, &[u8]> = TableDefinition::new("nodes");

/// Table for edges: (source, target, label) -> JSON-encoded properties
const EDGES: TableDefinition<(u128, u128, &str), &[u8]> = TableDefinition::new("edges");

/// Reverse index: (target, source, label) -> ()
const INCOMING: TableDefinition<(u128, u128, &str), ()> = TableDefinition::new("incoming");

/// On-disk node representation.
///
/// Metadata is kept as JSON text: the bag is opaque and schemaless, which
/// postcard cannot describe.
#[derive(Debug, Serialize, Deserialize)]
struct StoredRecord {
    content: String,
    created_at: DateTime<Utc>,
    metadata: String,
}

impl StoredRecord {
    fn encode(record: &MemoryRecord) -> Result<Vec<u8>, EgregoreError> {
        let metadata = serde_json::to_string(&record.metadata)
            .map_err(|e| EgregoreError::SerializationError(e.to_string()))?;
        let stored = Self {
            content: record.content.clone(),
            created_at: record.created_at,
            metadata,
        };
        postcard::to_allocvec(&stored).map_err(|e| EgregoreError::SerializationError(e.to_string()))
    }

    fn decode(id: u128, bytes: &[u8]) -> Result<MemoryRecord, EgregoreError> {
        let stored: Self = postcard::from_bytes(bytes)
            .map_err(|e| EgregoreError::SerializationError(e.to_string()))?;
        let metadata: Metadata = serde_json::from_str(&stored.metadata)
            .map_err(|e| EgregoreError::SerializationError(e.to_string()))?;
        Ok(MemoryRecord {
            id: MemoryId::from_u128(id),
            content: stored.content,
            created_at: stored.created_at,
            metadata,
        })
    }
}

/// Map any backend failure to `StoreUnavailable`.
fn unavailable(e: impl Display) -> EgregoreError {
    EgregoreError::StoreUnavailable(e.to_string())
}

fn decode_properties(bytes: &[u8]) -> Result<Metadata, EgregoreError> {
    if bytes.is_empty() {
        return Ok(Metadata::new());
    }
    serde_json::from_slice(bytes).map_err(|e| EgregoreError::SerializationError(e.to_string()))
}

/// A disk-backed memory graph using redb.
pub struct RedbGraph {
    /// The redb database handle.
    db: Database,
}

impl std::fmt::Debug for RedbGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbGraph").finish_non_exhaustive()
    }
}

impl RedbGraph {
    /// Open or create a graph database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, EgregoreError> {
        let db = Database::create(path.as_ref()).map_err(unavailable)?;

        // Initialize tables if they don't exist
        {
            let write_txn = db.begin_write().map_err(unavailable)?;
            let _ = write_txn.open_table(NODES).map_err(unavailable)?;
            let _ = write_txn.open_table(EDGES).map_err(unavailable)?;
            let _ = write_txn.open_table(INCOMING).map_err(unavailable)?;
            write_txn.commit().map_err(unavailable)?;
        }

        Ok(Self { db })
    }
}

// =============================================================================
// GRAPHSTORE TRAIT IMPLEMENTATION
// =============================================================================

impl GraphStore for RedbGraph {
    fn insert_record(&mut self, record: MemoryRecord) -> Result<(), EgregoreError> {
        validate_content(&record.content)?;
        let bytes = StoredRecord::encode(&record)?;
        let key = record.id.as_u128();

        let write_txn = self.db.begin_write().map_err(unavailable)?;
        {
            let mut nodes_table = write_txn.open_table(NODES).map_err(unavailable)?;
            if nodes_table.get(key).map_err(unavailable)?.is_some() {
                return Err(EgregoreError::InvalidInput(format!(
                    "Memory {} already exists",
                    record.id
                )));
            }
            nodes_table
                .insert(key, bytes.as_slice())
                .map_err(unavailable)?;
        }
        write_txn.commit().map_err(unavailable)?;
        Ok(())
    }

    fn get_node(&self, id: MemoryId) -> Result<Option<MemoryRecord>, EgregoreError> {
        let read_txn = self.db.begin_read().map_err(unavailable)?;
        let nodes_table = read_txn.open_table(NODES).map_err(unavailable)?;

        match nodes_table.get(id.as_u128()).map_err(unavailable)? {
            Some(data) => Ok(Some(StoredRecord::decode(id.as_u128(), data.value())?)),
            None => Ok(None),
        }
    }

    fn contains_node(&self, id: MemoryId) -> Result<bool, EgregoreError> {
        let read_txn = self.db.begin_read().map_err(unavailable)?;
        let nodes_table = read_txn.open_table(NODES).map_err(unavailable)?;
        Ok(nodes_table
            .get(id.as_u128())
            .map_err(unavailable)?
            .is_some())
    }

    fn create_relationship(&mut self, relationship: Relationship) -> Result<(), EgregoreError> {
        validate_relationship(&relationship)?;
        let properties = if relationship.properties.is_empty() {
            Vec::new()
        } else {
            serde_json::to_vec(&relationship.properties)
                .map_err(|e| EgregoreError::SerializationError(e.to_string()))?
        };
        let source = relationship.source.as_u128();
        let target = relationship.target.as_u128();
        let label = relationship.kind.as_str();

        // Endpoint check and insert share one write transaction, so a
        // concurrent delete cannot slip in between them.
        let write_txn = self.db.begin_write().map_err(unavailable)?;
        {
            let nodes_table = write_txn.open_table(NODES).map_err(unavailable)?;
            for endpoint in [relationship.source, relationship.target] {
                if nodes_table
                    .get(endpoint.as_u128())
                    .map_err(unavailable)?
                    .is_none()
                {
                    return Err(EgregoreError::EndpointMissing(endpoint));
                }
            }
        }
        {
            let mut edges_table = write_txn.open_table(EDGES).map_err(unavailable)?;
            edges_table
                .insert((source, target, label), properties.as_slice())
                .map_err(unavailable)?;
        }
        {
            let mut incoming_table = write_txn.open_table(INCOMING).map_err(unavailable)?;
            incoming_table
                .insert((target, source, label), ())
                .map_err(unavailable)?;
        }
        write_txn.commit().map_err(unavailable)?;
        Ok(())
    }

    fn list_nodes(&self, limit: usize) -> Result<Vec<MemoryRecord>, EgregoreError> {
        let read_txn = self.db.begin_read().map_err(unavailable)?;
        let nodes_table = read_txn.open_table(NODES).map_err(unavailable)?;

        let mut nodes = Vec::new();
        for entry in nodes_table.iter().map_err(unavailable)?.take(clamp_limit(limit)) {
            let (key, value) = entry.map_err(unavailable)?;
            nodes.push(StoredRecord::decode(key.value(), value.value())?);
        }
        Ok(nodes)
    }

    fn list_relationships(&self, limit: usize) -> Result<Vec<Relationship>, EgregoreError> {
        let read_txn = self.db.begin_read().map_err(unavailable)?;
        let edges_table = read_txn.open_table(EDGES).map_err(unavailable)?;

        let mut relationships = Vec::new();
        for entry in edges_table.iter().map_err(unavailable)?.take(clamp_limit(limit)) {
            let (key, value) = entry.map_err(unavailable)?;
            let (source, target, label) = key.value();
            relationships.push(
                Relationship::new(
                    MemoryId::from_u128(source),
                    MemoryId::from_u128(target),
                    RelationType::new(label),
                )
                .with_properties(decode_properties(value.value())?),
            );
        }
        Ok(relationships)
    }

    fn search_by_content(&self, needle: &str) -> Result<Vec<MemoryRecord>, EgregoreError> {
        validate_needle(needle)?;
        let read_txn = self.db.begin_read().map_err(unavailable)?;
        let nodes_table = read_txn.open_table(NODES).map_err(unavailable)?;

        let mut hits = Vec::new();
        for entry in nodes_table.iter().map_err(unavailable)? {
            let (key, value) = entry.map_err(unavailable)?;
            let record = StoredRecord::decode(key.value(), value.value())?;
            if record.content.contains(needle) {
                hits.push(record);
                if hits.len() >= MAX_SEARCH_RESULTS {
                    break;
                }
            }
        }
        Ok(hits)
    }

    fn delete_node(&mut self, id: MemoryId) -> Result<bool, EgregoreError> {
        let key = id.as_u128();
        let write_txn = self.db.begin_write().map_err(unavailable)?;
        {
            let mut nodes_table = write_txn.open_table(NODES).map_err(unavailable)?;
            if nodes_table.remove(key).map_err(unavailable)?.is_none() {
                // Nothing written; dropping the transaction aborts it.
                return Ok(false);
            }
        }
        {
            let mut edges_table = write_txn.open_table(EDGES).map_err(unavailable)?;
            let mut incoming_table = write_txn.open_table(INCOMING).map_err(unavailable)?;

            // Outgoing: (id, target, label) in EDGES, mirrored as (target, id, label).
            let mut outgoing = Vec::new();
            for entry in edges_table.range((key, 0u128, "")..).map_err(unavailable)? {
                let (edge_key, _) = entry.map_err(unavailable)?;
                let (source, target, label) = edge_key.value();
                if source != key {
                    break;
                }
                outgoing.push((target, label.to_string()));
            }

            // Incoming: (id, source, label) in INCOMING, owned by (source, id, label).
            let mut incoming = Vec::new();
            for entry in incoming_table.range((key, 0u128, "")..).map_err(unavailable)? {
                let (edge_key, _) = entry.map_err(unavailable)?;
                let (target, source, label) = edge_key.value();
                if target != key {
                    break;
                }
                incoming.push((source, label.to_string()));
            }

            for (target, label) in &outgoing {
                edges_table
                    .remove((key, *target, label.as_str()))
                    .map_err(unavailable)?;
                incoming_table
                    .remove((*target, key, label.as_str()))
                    .map_err(unavailable)?;
            }
            for (source, label) in &incoming {
                edges_table
                    .remove((*source, key, label.as_str()))
                    .map_err(unavailable)?;
                incoming_table
                    .remove((key, *source, label.as_str()))
                    .map_err(unavailable)?;
            }
        }
        write_txn.commit().map_err(unavailable)?;
        Ok(true)
    }

    fn node_count(&self) -> Result<usize, EgregoreError> {
        let read_txn = self.db.begin_read().map_err(unavailable)?;
        let nodes_table = read_txn.open_table(NODES).map_err(unavailable)?;
        let count = nodes_table.len().map_err(unavailable)?;
        Ok(count as usize)
    }

    fn edge_count(&self) -> Result<usize, EgregoreError> {
        let read_txn = self.db.begin_read().map_err(unavailable)?;
        let edges_table = read_txn.open_table(EDGES).map_err(unavailable)?;
        let count = edges_table.len().map_err(unavailable)?;
        Ok(count as usize)
    }

    fn distinct_relation_types(&self) -> Result<usize, EgregoreError> {
        let read_txn = self.db.begin_read().map_err(unavailable)?;
        let edges_table = read_txn.open_table(EDGES).map_err(unavailable)?;

        let mut kinds = BTreeSet::new();
        for entry in edges_table.iter().map_err(unavailable)? {
            let (key, _) = entry.map_err(unavailable)?;
            let (_, _, label) = key.value();
            kinds.insert(label.to_string());
        }
        Ok(kinds.len())
    }
}

// =============================================================================
// TESTS
// =============================================================================
