//! Deployed Contracts
//!
//! The two contract surfaces of the mesh, plus the dispatch plumbing that
//! exposes them by operation name:
//!
//! | Module     | Responsibility                                        |
//! |------------|-------------------------------------------------------|
//! | `shard`    | Shard registry records and registry operations        |
//! | `model`    | Per-shard model records and ledger operations         |
//! | `dispatch` | Operation-name tables over positional string args     |
//!
//! Both contracts are thin domain layers over the same generic
//! [`crate::state::EntityStore`]; every replica that applies the same
//! operation stream converges on identical state bytes.

mod dispatch;
mod model;
mod shard;

pub use dispatch::{Contract, ModelContract, RegistryContract};
pub use model::{bootstrap_model, ModelLedger, ModelRecord};
pub use shard::{bootstrap_topology, ShardRecord, ShardRegistry};
