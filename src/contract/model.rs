//! Model ledger contract
//!
//! Each shard carries its own model namespace: one record per trained model,
//! keyed by model id. The `Hash` field is a caller-supplied content
//! fingerprint and is stored opaquely; cross-shard placement is the
//! router's concern, not this ledger's.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{MeshError, Result};
use crate::state::{EntityRecord, EntityStore, ScanIter, WorldState};

/// One trained model's ledger record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelRecord {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Hash")]
    pub hash: String,
    #[serde(rename = "Owner")]
    pub owner: String,
    #[serde(rename = "Server")]
    pub server: String,
    #[serde(rename = "Round")]
    pub round: u32,
    #[serde(rename = "EvaluationAccuracy")]
    pub evaluation_accuracy: f64,
}

impl ModelRecord {
    /// Build a validated model record. Rounds are 1-based; accuracy is a
    /// percentage.
    pub fn new(
        id: &str,
        hash: &str,
        owner: &str,
        server: &str,
        round: u32,
        evaluation_accuracy: f64,
    ) -> Result<Self> {
        if id.is_empty() {
            return Err(MeshError::InvalidArgument(
                "model id must not be empty".to_string(),
            ));
        }
        if round < 1 {
            return Err(MeshError::InvalidArgument(format!(
                "model round must be at least 1, got {round}"
            )));
        }
        if !(0.0..=100.0).contains(&evaluation_accuracy) {
            return Err(MeshError::InvalidArgument(format!(
                "evaluation accuracy must be within [0, 100], got {evaluation_accuracy}"
            )));
        }
        Ok(Self {
            id: id.to_string(),
            hash: hash.to_string(),
            owner: owner.to_string(),
            server: server.to_string(),
            round,
            evaluation_accuracy,
        })
    }
}

impl EntityRecord for ModelRecord {
    fn doc_type() -> &'static str {
        "model"
    }

    fn key(&self) -> &str {
        &self.id
    }
}

/// Default record written by [`ModelLedger::seed`].
pub fn bootstrap_model() -> ModelRecord {
    ModelRecord {
        id: "model1".to_string(),
        hash: String::new(),
        owner: "me".to_string(),
        server: "http://localhost:3000".to_string(),
        round: 1,
        evaluation_accuracy: 0.0,
    }
}

/// Model ledger over one shard's world-state namespace.
#[derive(Clone)]
pub struct ModelLedger {
    store: EntityStore<ModelRecord>,
}

impl ModelLedger {
    pub fn new(state: Arc<dyn WorldState>) -> Self {
        Self {
            store: EntityStore::new(state),
        }
    }

    /// Write the default model on first initialization. Idempotent; returns
    /// how many records were written.
    pub fn seed(&self) -> Result<usize> {
        let model = bootstrap_model();
        if self.store.exists(&model.id)? {
            return Ok(0);
        }
        self.store.create(&model)?;
        info!(model = %model.id, "Seeded model ledger");
        Ok(1)
    }

    pub fn create_model(&self, model: &ModelRecord) -> Result<()> {
        self.store.create(model)?;
        info!(model = %model.id, round = model.round, "Created model");
        Ok(())
    }

    /// Raw stored bytes for one model record.
    pub fn read_model(&self, id: &str) -> Result<Vec<u8>> {
        self.store.read(id)
    }

    /// Decoded model record.
    pub fn get_model(&self, id: &str) -> Result<ModelRecord> {
        self.store.read_typed(id)
    }

    pub fn update_model(&self, model: &ModelRecord) -> Result<()> {
        self.store.update(model)?;
        info!(model = %model.id, round = model.round, "Updated model");
        Ok(())
    }

    pub fn delete_model(&self, id: &str) -> Result<()> {
        self.store.delete(id)?;
        info!(model = %id, "Deleted model");
        Ok(())
    }

    pub fn model_exists(&self, id: &str) -> Result<bool> {
        self.store.exists(id)
    }

    /// Full scan of the model namespace, degraded entries included.
    pub fn all_models(&self) -> Result<ScanIter<ModelRecord>> {
        self.store.scan_all()
    }
}
