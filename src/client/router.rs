//! Shard routing
//!
//! Deterministically maps work onto the registry's shard set. The router
//! holds a snapshot ordered by shard id; routing is a pure function of the
//! input and that snapshot, so every participant holding the same registry
//! view assigns identically. Growing the shard set changes assignments (no
//! consistent-hashing guarantee); callers that need stability pin a
//! snapshot.

use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::client::session::LedgerClient;
use crate::config::{CONTROL_CHANNEL, REGISTRY_CONTRACT};
use crate::contract::ShardRecord;
use crate::error::{MeshError, Result};

/// Derive a routing ordinal from an arbitrary key.
fn key_ordinal(key: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    let digest = hasher.finalize();
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(prefix)
}

/// Pure router over a snapshot of the shard set.
pub struct ShardRouter {
    shards: Vec<ShardRecord>,
}

impl ShardRouter {
    /// Build a router over a snapshot. The snapshot is ordered by shard id,
    /// so the caller's insertion order never affects assignment.
    pub fn new(mut shards: Vec<ShardRecord>) -> Self {
        shards.sort_by(|a, b| a.id.cmp(&b.id));
        Self { shards }
    }

    /// Snapshot the live shard set through a client session.
    ///
    /// Degraded registry entries cannot carry a channel, so they are logged
    /// and skipped.
    pub async fn load(client: &mut LedgerClient) -> Result<Self> {
        let bytes = client
            .channel(CONTROL_CHANNEL)
            .contract(REGISTRY_CONTRACT)
            .evaluate("GetAllShards", &[])
            .await?;
        let entries: Vec<serde_json::Value> = serde_json::from_slice(&bytes)
            .map_err(|e| MeshError::Decode(format!("shard set is not a JSON array: {e}")))?;

        let mut shards = Vec::with_capacity(entries.len());
        for entry in entries {
            match serde_json::from_value::<ShardRecord>(entry) {
                Ok(shard) => shards.push(shard),
                Err(e) => warn!(error = %e, "Skipping undecodable shard entry"),
            }
        }
        debug!(shards = shards.len(), "Loaded shard snapshot");
        Ok(Self::new(shards))
    }

    /// Route a 1-based assignment ordinal to its shard: ordinal `n` selects
    /// the `(n - 1) mod count`-th shard in id order, wrapping round-robin.
    /// Ordinal 0 is treated as 1.
    pub fn route_ordinal(&self, ordinal: u64) -> Result<&ShardRecord> {
        if self.shards.is_empty() {
            return Err(MeshError::NoShardsAvailable);
        }
        let index = (ordinal.saturating_sub(1) % self.shards.len() as u64) as usize;
        Ok(&self.shards[index])
    }

    /// Route an arbitrary string key via its digest ordinal.
    pub fn route_key(&self, key: &str) -> Result<&ShardRecord> {
        if self.shards.is_empty() {
            return Err(MeshError::NoShardsAvailable);
        }
        let index = (key_ordinal(key) % self.shards.len() as u64) as usize;
        Ok(&self.shards[index])
    }

    /// The snapshot, in id order.
    pub fn shards(&self) -> &[ShardRecord] {
        &self.shards
    }

    pub fn len(&self) -> usize {
        self.shards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }
}
