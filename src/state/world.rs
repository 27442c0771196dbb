//! World state backends
//!
//! One flat key-value namespace per shard. Contracts read and write only
//! through the [`WorldState`] seam, so the same contract logic runs against
//! the embedded backends here and a remote ledger runtime alike.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use sled::Tree;
use tracing::debug;

use crate::error::Result;

/// One entry yielded by a range scan: key and raw stored bytes.
pub type StateEntry = (String, Vec<u8>);

/// One-shot iterator over a key range, lexicographic key order.
pub type StateIter = Box<dyn Iterator<Item = Result<StateEntry>> + Send>;

/// Transaction-level view of one shard's keyspace.
///
/// Mirrors the ledger runtime's state API. Each shard applies transactions
/// sequentially as delivered by its ordering layer, so implementations do
/// not serialize callers beyond their own internal consistency.
pub trait WorldState: Send + Sync {
    /// Write raw bytes at a key, creating or replacing.
    fn put_state(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Read raw bytes at a key. Absence is `None`, not an error.
    fn get_state(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Remove a key. Removing an absent key is accepted at this level;
    /// existence gating belongs to the entity store above.
    fn delete_state(&self, key: &str) -> Result<()>;

    /// Iterate entries with key in `[start, end)`. An empty bound is
    /// open-ended; two empty bounds scan the whole namespace. The iterator
    /// is one-shot and not restartable.
    fn get_state_by_range(&self, start: &str, end: &str) -> Result<StateIter>;
}

/// Durable world state over one `sled` tree.
///
/// The embedded gateway opens one tree per channel inside a shared database,
/// so shards stay isolated without separate files.
pub struct SledWorldState {
    tree: Tree,
}

impl SledWorldState {
    pub fn new(tree: Tree) -> Self {
        Self { tree }
    }

    /// Open the named namespace inside an existing database.
    pub fn open_namespace(db: &sled::Db, namespace: &str) -> Result<Self> {
        let tree = db.open_tree(namespace)?;
        debug!(namespace = %namespace, "Opened world state namespace");
        Ok(Self { tree })
    }
}

impl WorldState for SledWorldState {
    fn put_state(&self, key: &str, value: &[u8]) -> Result<()> {
        self.tree.insert(key.as_bytes(), value)?;
        Ok(())
    }

    fn get_state(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.tree.get(key.as_bytes())?.map(|v| v.to_vec()))
    }

    fn delete_state(&self, key: &str) -> Result<()> {
        self.tree.remove(key.as_bytes())?;
        Ok(())
    }

    fn get_state_by_range(&self, start: &str, end: &str) -> Result<StateIter> {
        let iter = match (start.is_empty(), end.is_empty()) {
            (true, true) => self.tree.iter(),
            (false, true) => self.tree.range(start.as_bytes()..),
            (true, false) => self.tree.range(..end.as_bytes()),
            (false, false) => self.tree.range(start.as_bytes()..end.as_bytes()),
        };
        Ok(Box::new(iter.map(|item| {
            let (key, value) = item?;
            Ok((String::from_utf8_lossy(&key).into_owned(), value.to_vec()))
        })))
    }
}

/// In-memory world state for tests and ephemeral channels.
#[derive(Default)]
pub struct MemoryWorldState {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryWorldState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every mutation is a single map operation, so the map stays consistent
    /// even across a poisoned lock.
    fn read_entries(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, Vec<u8>>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_entries(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, Vec<u8>>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl WorldState for MemoryWorldState {
    fn put_state(&self, key: &str, value: &[u8]) -> Result<()> {
        self.write_entries().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn get_state(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.read_entries().get(key).cloned())
    }

    fn delete_state(&self, key: &str) -> Result<()> {
        self.write_entries().remove(key);
        Ok(())
    }

    fn get_state_by_range(&self, start: &str, end: &str) -> Result<StateIter> {
        let entries = self.read_entries();
        let selected: Vec<StateEntry> = entries
            .iter()
            .filter(|(key, _)| {
                (start.is_empty() || key.as_str() >= start)
                    && (end.is_empty() || key.as_str() < end)
            })
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Ok(Box::new(selected.into_iter().map(Ok)))
    }
}
