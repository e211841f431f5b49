//! # Core Type Definitions
//!
//! This module contains all core types for the Egregore memory graph:
//! - Identifiers (`MemoryId`) and relationship labels (`RelationType`)
//! - Graph records (`MemoryRecord`, `Relationship`)
//! - The opaque `Metadata` bag carried by both
//! - Error types (`EgregoreError`)
//!
//! ## Immutability
//!
//! A `MemoryRecord` has no update path. Its `id`, `content` and `created_at`
//! are fixed at creation and the record only ever leaves the graph through
//! an explicit delete.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Globally unique identifier of a memory node.
///
/// Drawn from random 128-bit UUIDs (v4), so concurrent creators never need
/// to coordinate to avoid collisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemoryId(pub Uuid);

impl MemoryId {
    /// Generate a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Raw 128-bit representation, used as the storage key.
    #[must_use]
    pub const fn as_u128(self) -> u128 {
        self.0.as_u128()
    }

    /// Rebuild an identifier from its storage key.
    #[must_use]
    pub const fn from_u128(raw: u128) -> Self {
        Self(Uuid::from_u128(raw))
    }
}

impl fmt::Display for MemoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for MemoryId {
    type Err = EgregoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| EgregoreError::InvalidInput(format!("invalid memory id '{s}': {e}")))
    }
}

/// Free-form label of a relationship (e.g. `FIXES`, `RELATED_TO`).
///
/// Not drawn from a closed set. The label is stored as data and is never
/// spliced into query text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelationType(pub String);

impl RelationType {
    /// Create a new relationship label.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the label as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RelationType {
    fn default() -> Self {
        Self::new(crate::primitives::DEFAULT_RELATION_TYPE)
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// METADATA
// =============================================================================

/// Opaque string-keyed metadata bag.
///
/// No schema is enforced at this layer; validation belongs to callers.
pub type Metadata = BTreeMap<String, serde_json::Value>;

// =============================================================================
// GRAPH RECORDS
// =============================================================================

/// A single stored memory, represented as a graph node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Immutable identifier, generated at creation.
    pub id: MemoryId,
    /// The payload. Never interpreted by the core.
    pub content: String,
    /// Creation timestamp, set once.
    pub created_at: DateTime<Utc>,
    /// Opaque metadata, possibly empty.
    #[serde(default)]
    pub metadata: Metadata,
}

impl MemoryRecord {
    /// Build a brand-new record with a fresh id and the current time.
    #[must_use]
    pub fn new(content: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            id: MemoryId::generate(),
            content: content.into(),
            created_at: Utc::now(),
            metadata,
        }
    }
}

/// A directed, typed edge between two memories.
///
/// Relationships have no identity of their own: the triple
/// `(source, target, kind)` addresses them, and they disappear with either
/// endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    /// Source memory.
    #[serde(rename = "source_id")]
    pub source: MemoryId,
    /// Target memory.
    #[serde(rename = "target_id")]
    pub target: MemoryId,
    /// Relationship label.
    #[serde(rename = "type")]
    pub kind: RelationType,
    /// Optional edge properties.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: Metadata,
}

impl Relationship {
    /// Create a relationship without properties.
    #[must_use]
    pub fn new(source: MemoryId, target: MemoryId, kind: RelationType) -> Self {
        Self {
            source,
            target,
            kind,
            properties: Metadata::new(),
        }
    }

    /// Attach properties to this relationship.
    #[must_use]
    pub fn with_properties(mut self, properties: Metadata) -> Self {
        self.properties = properties;
        self
    }

    /// Check whether the given memory is either endpoint.
    #[must_use]
    pub fn touches(&self, id: MemoryId) -> bool {
        self.source == id || self.target == id
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the Egregore system.
///
/// - No silent failures
/// - Use `Result<T, EgregoreError>` for fallible operations
/// - The core never panics; every error is recoverable by the caller
#[derive(Debug, Error)]
pub enum EgregoreError {
    /// The backing store is unreachable, failed, or timed out.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// A relationship endpoint does not resolve to an existing memory.
    #[error("Relationship endpoint missing: {0}")]
    EndpointMissing(MemoryId),

    /// A relationship from a memory to itself was requested.
    #[error("Self-referencing relationship rejected: {0}")]
    SelfLoopRejected(MemoryId),

    /// The requested memory was not found.
    #[error("Memory not found: {0}")]
    NodeNotFound(MemoryId),

    /// Caller-supplied input failed validation.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Another live process holds the instance lock.
    #[error("Egregore is already running{}", pid_suffix(.0))]
    AlreadyRunning(Option<u32>),

    /// A PID record points at a process that is no longer alive.
    #[error("Stale lock left by dead process {0}")]
    StaleLock(u32),

    /// The graph write succeeded but the index write did not.
    #[error("Partial write for {id}: graph stored, index failed: {reason}")]
    PartialWriteFailure {
        /// The memory that exists in the graph only.
        id: MemoryId,
        /// Why the index write failed.
        reason: String,
    },

    /// A lifecycle transition that the state machine does not allow.
    #[error("Invalid lifecycle transition: {from} -> {to}")]
    InvalidTransition {
        /// Current state.
        from: &'static str,
        /// Requested state.
        to: &'static str,
    },

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

fn pid_suffix(pid: &Option<u32>) -> String {
    pid.map(|pid| format!(" (PID: {pid})")).unwrap_or_default()
}

impl EgregoreError {
    /// Stable, machine-readable name of the error kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StoreUnavailable(_) => "StoreUnavailable",
            Self::EndpointMissing(_) => "EndpointMissing",
            Self::SelfLoopRejected(_) => "SelfLoopRejected",
            Self::NodeNotFound(_) => "NodeNotFound",
            Self::InvalidInput(_) => "InvalidInput",
            Self::AlreadyRunning(_) => "AlreadyRunning",
            Self::StaleLock(_) => "StaleLock",
            Self::PartialWriteFailure { .. } => "PartialWriteFailure",
            Self::InvalidTransition { .. } => "InvalidTransition",
            Self::SerializationError(_) => "SerializationError",
            Self::IoError(_) => "IoError",
        }
    }

    /// Validation failures on relationship creation are non-fatal.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::EndpointMissing(_) | Self::SelfLoopRejected(_) | Self::InvalidInput(_)
        )
    }
}

impl From<std::io::Error> for EgregoreError {
    fn from(e: std::io::Error) -> Self {
        Self::IoError(e.to_string())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_id_roundtrips_through_storage_key() {
        let id = MemoryId::generate();
        assert_eq!(MemoryId::from_u128(id.as_u128()), id);
    }

    #[test]
    fn memory_id_parses_display_form() {
        let id = MemoryId::generate();
        let parsed: MemoryId = id.to_string().parse().expect("parse");
        assert_eq!(parsed, id);
    }

    #[test]
    fn memory_id_rejects_garbage() {
        let err = "not-a-uuid".parse::<MemoryId>().expect_err("should fail");
        assert_eq!(err.kind(), "InvalidInput");
    }

    #[test]
    fn generated_ids_are_distinct() {
        let a = MemoryId::generate();
        let b = MemoryId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn relationship_serializes_with_wire_names() {
        let a = MemoryId::generate();
        let b = MemoryId::generate();
        let rel = Relationship::new(a, b, RelationType::new("FIXES"));
        let json = serde_json::to_value(&rel).expect("serialize");
        assert_eq!(json["type"], "FIXES");
        assert_eq!(json["source_id"], a.to_string());
        assert_eq!(json["target_id"], b.to_string());
        assert!(json.get("properties").is_none());
    }

    #[test]
    fn relationship_touches_endpoints() {
        let a = MemoryId::generate();
        let b = MemoryId::generate();
        let c = MemoryId::generate();
        let rel = Relationship::new(a, b, RelationType::default());
        assert!(rel.touches(a));
        assert!(rel.touches(b));
        assert!(!rel.touches(c));
    }

    #[test]
    fn already_running_message_includes_pid() {
        let err = EgregoreError::AlreadyRunning(Some(42));
        assert_eq!(err.to_string(), "Egregore is already running (PID: 42)");
        let err = EgregoreError::AlreadyRunning(None);
        assert_eq!(err.to_string(), "Egregore is already running");
    }

    #[test]
    fn validation_errors_are_flagged() {
        let id = MemoryId::generate();
        assert!(EgregoreError::SelfLoopRejected(id).is_validation());
        assert!(EgregoreError::EndpointMissing(id).is_validation());
        assert!(!EgregoreError::StoreUnavailable("down".into()).is_validation());
    }
}
