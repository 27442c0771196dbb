//! Ledgermesh - shard coordination for partitioned ledgers
//!
//! Coordinates state across a horizontally sharded ledger: every shard is an
//! independent consensus group ("channel") holding its own key-value entity
//! store, and clients deterministically pick, connect to, and reuse the
//! right shard for each piece of work.
//!
//! ## Architecture
//!
//! - **State side**: canonical encoding + existence-gated entity stores,
//!   applied identically by every replica of a shard
//! - **Contract side**: the shard registry (control channel) and per-shard
//!   model ledgers, exposed through operation-name dispatch
//! - **Client side**: shard router, connection cache, and vault-guarded
//!   identity provisioning
//!
//! ## Control Flow
//!
//! ```text
//! caller ──► ShardRouter ──► LedgerClient ──► Gateway ──► Contract
//!               │                │                            │
//!         registry snapshot   memoized handles         EntityStore
//!                                                           │
//!                                                      WorldState
//! ```
//!
//! ## Storage Layout
//!
//! ```text
//! <data-dir>/
//! ├── state/      # embedded world state, one namespace per channel
//! └── vault/      # identity vault (enrolled principals)
//! ```

pub mod client;
pub mod config;
pub mod contract;
pub mod encoding;
pub mod error;
pub mod gateway;
pub mod state;

// Re-exports
pub use client::{LedgerClient, ShardRouter};
pub use contract::{ModelLedger, ModelRecord, ShardRecord, ShardRegistry};
pub use error::{MeshError, Result};
pub use gateway::{EmbeddedGateway, Gateway};
pub use state::{EntityRecord, EntityStore, WorldState};
