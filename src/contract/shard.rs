//! Shard registry contract
//!
//! The registry is the control-plane namespace: one record per shard,
//! describing the channel that backs it, the peer quorum it expects, and an
//! optional pinned state-hash checkpoint. Routing reads this namespace to
//! learn the live shard set.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{MeshError, Result};
use crate::state::{EntityRecord, EntityStore, ScanEntry, ScanIter, WorldState};

/// Descriptor for one shard of the mesh.
///
/// `ID` is the immutable primary key. `PinnedHash` is advisory metadata for
/// operators; the store never interprets it. Wire field names are fixed by
/// the contract surface.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShardRecord {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Channel")]
    pub channel: String,
    #[serde(rename = "MinPeers")]
    pub min_peers: u32,
    #[serde(rename = "PinnedHash")]
    pub pinned_hash: String,
}

impl ShardRecord {
    /// Build a validated shard descriptor. An empty pinned hash means
    /// unpinned.
    pub fn new(id: &str, channel: &str, min_peers: u32, pinned_hash: &str) -> Result<Self> {
        if id.is_empty() {
            return Err(MeshError::InvalidArgument(
                "shard id must not be empty".to_string(),
            ));
        }
        if channel.is_empty() {
            return Err(MeshError::InvalidArgument(
                "shard channel must not be empty".to_string(),
            ));
        }
        Ok(Self {
            id: id.to_string(),
            channel: channel.to_string(),
            min_peers,
            pinned_hash: pinned_hash.to_string(),
        })
    }
}

impl EntityRecord for ShardRecord {
    fn doc_type() -> &'static str {
        "shard"
    }

    fn key(&self) -> &str {
        &self.id
    }
}

/// Topology written by [`ShardRegistry::seed`] on first initialization.
pub fn bootstrap_topology() -> Vec<ShardRecord> {
    vec![
        ShardRecord {
            id: "1".to_string(),
            channel: "CIFAR1".to_string(),
            min_peers: 0,
            pinned_hash: String::new(),
        },
        ShardRecord {
            id: "2".to_string(),
            channel: "CIFAR2".to_string(),
            min_peers: 0,
            pinned_hash: String::new(),
        },
    ]
}

/// Shard registry over one world-state namespace.
#[derive(Clone)]
pub struct ShardRegistry {
    store: EntityStore<ShardRecord>,
}

impl ShardRegistry {
    pub fn new(state: Arc<dyn WorldState>) -> Self {
        Self {
            store: EntityStore::new(state),
        }
    }

    /// Write the bootstrap topology. Idempotent: entries already present are
    /// left untouched, so replays never clobber live records. Returns how
    /// many records were written.
    pub fn seed(&self) -> Result<usize> {
        let mut written = 0;
        for shard in bootstrap_topology() {
            if self.store.exists(&shard.id)? {
                continue;
            }
            self.store.create(&shard)?;
            written += 1;
        }
        info!(written, "Seeded shard registry");
        Ok(written)
    }

    pub fn create_shard(&self, shard: &ShardRecord) -> Result<()> {
        self.store.create(shard)?;
        info!(shard = %shard.id, channel = %shard.channel, "Created shard");
        Ok(())
    }

    /// Raw stored bytes for one shard record.
    pub fn read_shard(&self, id: &str) -> Result<Vec<u8>> {
        self.store.read(id)
    }

    /// Decoded shard record.
    pub fn get_shard(&self, id: &str) -> Result<ShardRecord> {
        self.store.read_typed(id)
    }

    pub fn update_shard(&self, shard: &ShardRecord) -> Result<()> {
        self.store.update(shard)?;
        info!(shard = %shard.id, channel = %shard.channel, "Updated shard");
        Ok(())
    }

    pub fn delete_shard(&self, id: &str) -> Result<()> {
        self.store.delete(id)?;
        info!(shard = %id, "Deleted shard");
        Ok(())
    }

    pub fn shard_exists(&self, id: &str) -> Result<bool> {
        self.store.exists(id)
    }

    /// Full scan of the registry namespace, degraded entries included.
    pub fn all_shards(&self) -> Result<ScanIter<ShardRecord>> {
        self.store.scan_all()
    }

    /// The decodable shard set, for routing. Degraded records are logged and
    /// skipped; they cannot carry a channel to route to.
    pub fn shard_records(&self) -> Result<Vec<ShardRecord>> {
        let mut records = Vec::new();
        for entry in self.all_shards()? {
            match entry? {
                ScanEntry::Typed(shard) => records.push(shard),
                ScanEntry::Raw(raw) => {
                    warn!(bytes = raw.len(), "Skipping undecodable registry record");
                }
            }
        }
        Ok(records)
    }
}
