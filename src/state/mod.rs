//! Entity State Storage
//!
//! The deterministic per-shard state layer, organized by concern:
//!
//! | Module  | Responsibility                                         |
//! |---------|--------------------------------------------------------|
//! | `world` | Raw keyspace access (the consumed ledger interface)    |
//! | `store` | Existence-gated, schema-stamped CRUD over a keyspace   |
//!
//! Contracts never reach past `EntityStore` to the world state, so every
//! write goes through the canonical encoder and carries its discriminator.

mod store;
mod world;

pub use store::{EntityRecord, EntityStore, ScanEntry, ScanIter};
pub use world::{MemoryWorldState, SledWorldState, StateEntry, StateIter, WorldState};
