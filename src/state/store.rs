//! Generic entity store over a world state
//!
//! Existence-gated CRUD shared by every contract: the shard registry and the
//! per-shard model ledgers are both `EntityStore` instances over different
//! record schemas. The store is schema-agnostic beyond the discriminator it
//! stamps; semantic validation belongs to record constructors.

use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};

use crate::encoding;
use crate::error::{MeshError, Result};
use crate::state::world::WorldState;

/// Trait for record types storable in an entity namespace.
///
/// # Example
///
/// ```rust,ignore
/// use ledgermesh::state::EntityRecord;
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// struct Device {
///     id: String,
///     firmware: String,
/// }
///
/// impl EntityRecord for Device {
///     fn doc_type() -> &'static str { "device" }
///     fn key(&self) -> &str { &self.id }
/// }
/// ```
pub trait EntityRecord: Sized + Send + Sync + Serialize + DeserializeOwned {
    /// Schema discriminator stamped into every stored record, so a
    /// full-namespace scan can type-narrow heterogeneous entries.
    fn doc_type() -> &'static str;

    /// Primary key of this record within its namespace.
    fn key(&self) -> &str;
}

/// One entry from a full-namespace scan.
///
/// Serializes to the stored wire shape: typed records as their JSON object
/// with the stamped discriminator restored, undecodable entries as the raw
/// string.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanEntry<R> {
    /// Record decoded against this store's schema.
    Typed(R),
    /// Value kept as a lossy string because decode failed or the record
    /// belongs to another schema.
    Raw(String),
}

impl<R: EntityRecord> Serialize for ScanEntry<R> {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            // record structs carry no discriminator field of their own; it
            // is stamped back in before leaving the store
            ScanEntry::Typed(record) => encoding::stamp_value(R::doc_type(), record)
                .map_err(serde::ser::Error::custom)?
                .serialize(serializer),
            ScanEntry::Raw(raw) => serializer.serialize_str(raw),
        }
    }
}

/// One-shot scan iterator. Decode failures degrade per entry; only
/// storage-level failures surface as errors.
pub type ScanIter<R> = Box<dyn Iterator<Item = Result<ScanEntry<R>>> + Send>;

/// Existence-gated CRUD over one keyspace, parameterized by record schema.
pub struct EntityStore<R: EntityRecord> {
    state: Arc<dyn WorldState>,
    _record: PhantomData<R>,
}

impl<R: EntityRecord> Clone for EntityStore<R> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            _record: PhantomData,
        }
    }
}

impl<R: EntityRecord> EntityStore<R> {
    pub fn new(state: Arc<dyn WorldState>) -> Self {
        Self {
            state,
            _record: PhantomData,
        }
    }

    /// True iff a non-empty record is stored at `key`. Absence is not a
    /// failure mode here.
    pub fn exists(&self, key: &str) -> Result<bool> {
        Ok(matches!(self.state.get_state(key)?, Some(bytes) if !bytes.is_empty()))
    }

    /// Write a new record at its own key. Fails with `AlreadyExists` if the
    /// key already holds a record.
    pub fn create(&self, record: &R) -> Result<()> {
        let key = record.key();
        if self.exists(key)? {
            return Err(MeshError::AlreadyExists(key.to_string()));
        }
        let bytes = encoding::stamp_and_encode(R::doc_type(), record)?;
        self.state.put_state(key, &bytes)
    }

    /// Raw stored bytes at `key`; the caller deserializes. Fails with
    /// `NotFound` if absent.
    pub fn read(&self, key: &str) -> Result<Vec<u8>> {
        match self.state.get_state(key)? {
            Some(bytes) if !bytes.is_empty() => Ok(bytes),
            _ => Err(MeshError::NotFound(key.to_string())),
        }
    }

    /// Read and decode against this store's schema.
    pub fn read_typed(&self, key: &str) -> Result<R> {
        let bytes = self.read(key)?;
        encoding::decode_stamped(R::doc_type(), &bytes)
    }

    /// Full replace of an existing record through the same stamp-and-encode
    /// path as create. Fails with `NotFound` if absent; never an upsert.
    pub fn update(&self, record: &R) -> Result<()> {
        let key = record.key();
        if !self.exists(key)? {
            return Err(MeshError::NotFound(key.to_string()));
        }
        let bytes = encoding::stamp_and_encode(R::doc_type(), record)?;
        self.state.put_state(key, &bytes)
    }

    /// Remove an existing record. Fails with `NotFound` if absent.
    pub fn delete(&self, key: &str) -> Result<()> {
        if !self.exists(key)? {
            return Err(MeshError::NotFound(key.to_string()));
        }
        self.state.delete_state(key)
    }

    /// Scan the whole namespace in store key order.
    ///
    /// Each entry is decoded independently; a malformed or foreign-schema
    /// record degrades that one entry to `ScanEntry::Raw` and the scan
    /// continues. The iterator is one-shot.
    pub fn scan_all(&self) -> Result<ScanIter<R>>
    where
        R: 'static,
    {
        let iter = self.state.get_state_by_range("", "")?;
        Ok(Box::new(iter.map(|item| {
            let (_, bytes) = item?;
            Ok(match encoding::decode_stamped::<R>(R::doc_type(), &bytes) {
                Ok(record) => ScanEntry::Typed(record),
                Err(_) => ScanEntry::Raw(String::from_utf8_lossy(&bytes).into_owned()),
            })
        })))
    }
}
