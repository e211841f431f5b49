//! # egregore-core
//!
//! The memory graph engine for Egregore.
//!
//! This crate models memories and their typed relationships as a directed
//! property graph, and derives aggregate statistics from it. It knows
//! nothing about similarity search, HTTP, or process lifetime: those live
//! in the `egregore` application crate.
//!
//! ## Architectural Constraints
//!
//! - Has NO async, NO network dependencies (pure Rust)
//! - Every operation is atomic on its own; no cross-call transactions
//! - Content, metadata and relationship labels are opaque data
//! - Deleting a memory removes every relationship that touches it

// =============================================================================
// MODULES
// =============================================================================

pub mod backend;
pub mod graph;
pub mod primitives;
pub mod query;
pub mod stats;
pub mod storage;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{EgregoreError, MemoryId, MemoryRecord, Metadata, RelationType, Relationship};

// =============================================================================
// RE-EXPORTS: Graph Engine
// =============================================================================

pub use backend::{BackendKind, StorageBackend};
pub use graph::{Graph, GraphStore};
pub use query::{Query, QueryResult, QueryType};
pub use stats::{GraphSnapshot, density};
pub use storage::RedbGraph;
