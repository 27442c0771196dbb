//! Client Side of the Mesh
//!
//! Everything a participant needs to work against a deployed mesh, organized
//! by concern:
//!
//! | Module     | Responsibility                                         |
//! |------------|--------------------------------------------------------|
//! | `session`  | Connection cache: memoized channel/contract handles    |
//! | `router`   | Deterministic key-to-shard assignment                  |
//! | `identity` | Vault-guarded enrollment against the authority         |
//!
//! # Key Design Principles
//!
//! ## 1. One Client Value, One Session
//!
//! `LedgerClient` takes `&mut self` for selection and dispatch. Sharing a
//! session across tasks without serialization is a compile error, not a
//! runtime surprise.
//!
//! ## 2. Resolution Is Lazy and Memoized
//!
//! Selecting a channel or contract is free; the expensive resolution runs on
//! the next dispatch, and only when the selection actually changed.
//!
//! ## 3. Provisioning Is Idempotent
//!
//! The identity vault is checked before any authority call; replays are
//! free, and failures never leave partial state behind.

mod identity;
mod router;
mod session;

pub use identity::{
    enroll_admin, register_user, CertificateAuthority, Enrollment, Identity, IdentityVault,
};
pub use router::ShardRouter;
pub use session::{needs_resolve, LedgerClient};
