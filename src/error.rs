//! Error types for ledgermesh

use thiserror::Error;

/// Result type for ledgermesh operations
pub type Result<T> = std::result::Result<T, MeshError>;

/// Failure classes surfaced by the state store, router, and client layers.
#[derive(Error, Debug)]
pub enum MeshError {
    /// Create on a key that already holds a record
    #[error("Record already exists: {0}")]
    AlreadyExists(String),

    /// Read, update, or delete on a key that holds no record
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Routing requested against an empty shard set
    #[error("No shards available in the registry")]
    NoShardsAvailable,

    /// Session, gateway, or certificate-authority call failed in transit
    #[error("Transport failure: {0}")]
    Transport(String),

    /// Stored bytes did not decode as the expected record schema
    #[error("Decode failure: {0}")]
    Decode(String),

    /// Malformed or out-of-range operation argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation name missing from the contract's dispatch table
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    /// Identity provisioning precondition failed
    #[error("Identity error: {0}")]
    Identity(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Database error
    #[error("Database error: {0}")]
    Storage(#[from] sled::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}
