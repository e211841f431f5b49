//! # Egregore
//!
//! Shared memory for agents: memories live in a property graph, and the
//! ones written through the semantic path are also handed to a similarity
//! index for recall.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    apps/egregore (THE BINARY)                   │
//! │                                                                 │
//! │  ┌─────────────┐    ┌─────────────┐    ┌──────────────────┐    │
//! │  │   CLI       │    │   HTTP API  │    │ Daemon Supervisor│    │
//! │  │  (clap)     │    │   (axum)    │    │ (OFD lock + PID) │    │
//! │  └──────┬──────┘    └──────┬──────┘    └────────┬─────────┘    │
//! │         │                  ▼                    │              │
//! │         │      ┌──────────────────────┐         │              │
//! │         │      │ tools / coordinator  │         │              │
//! │         │      │ recall               │         │              │
//! │         │      └────┬────────────┬────┘         │              │
//! │         ▼           ▼            ▼              │              │
//! │   ┌───────────────────────┐  ┌──────────────┐   │              │
//! │   │ egregore-core (graph) │  │ VectorIndex  │   │              │
//! │   └───────────────────────┘  └──────────────┘   │              │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod daemon;
pub mod recall;
pub mod store;
pub mod tools;
pub mod vector;
