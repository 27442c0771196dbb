//! Operation-name dispatch for deployed contracts
//!
//! A contract is a named dispatch surface over one shard's state: operation
//! names map to handlers through an explicit table, arguments arrive as
//! positional strings, and results leave as UTF-8 JSON text. Mutating
//! operations return empty bytes on success.

use crate::contract::model::{ModelLedger, ModelRecord};
use crate::contract::shard::{ShardRecord, ShardRegistry};
use crate::error::{MeshError, Result};
use crate::state::ScanEntry;

/// A deployed contract reachable through a channel.
pub trait Contract: Send + Sync {
    /// Dispatch one operation by name. Unknown names fail with
    /// `UnknownOperation`; malformed arguments with `InvalidArgument`.
    fn dispatch(&self, operation: &str, args: &[String]) -> Result<Vec<u8>>;
}

fn expect_args(operation: &str, args: &[String], count: usize) -> Result<()> {
    if args.len() == count {
        Ok(())
    } else {
        Err(MeshError::InvalidArgument(format!(
            "{operation} expects {count} argument(s), got {}",
            args.len()
        )))
    }
}

fn parse_u32(operation: &str, field: &str, raw: &str) -> Result<u32> {
    raw.parse().map_err(|_| {
        MeshError::InvalidArgument(format!(
            "{operation}: {field} must be a non-negative integer, got {raw:?}"
        ))
    })
}

fn parse_f64(operation: &str, field: &str, raw: &str) -> Result<f64> {
    raw.parse().map_err(|_| {
        MeshError::InvalidArgument(format!(
            "{operation}: {field} must be a number, got {raw:?}"
        ))
    })
}

fn to_json_bool(value: bool) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(&value)?)
}

/// Shard registry operations, as deployed on the control channel.
pub struct RegistryContract {
    registry: ShardRegistry,
}

impl RegistryContract {
    pub fn new(registry: ShardRegistry) -> Self {
        Self { registry }
    }

    fn shard_from_args(operation: &str, args: &[String]) -> Result<ShardRecord> {
        expect_args(operation, args, 4)?;
        ShardRecord::new(
            &args[0],
            &args[1],
            parse_u32(operation, "MinPeers", &args[2])?,
            &args[3],
        )
    }

    fn get_all_shards(&self) -> Result<Vec<u8>> {
        let entries = self
            .registry
            .all_shards()?
            .collect::<Result<Vec<ScanEntry<ShardRecord>>>>()?;
        Ok(serde_json::to_vec(&entries)?)
    }
}

impl Contract for RegistryContract {
    fn dispatch(&self, operation: &str, args: &[String]) -> Result<Vec<u8>> {
        match operation {
            "InitLedger" => {
                expect_args(operation, args, 0)?;
                self.registry.seed()?;
                Ok(Vec::new())
            }
            "CreateShard" => {
                let shard = Self::shard_from_args(operation, args)?;
                self.registry.create_shard(&shard)?;
                Ok(Vec::new())
            }
            "ReadShard" => {
                expect_args(operation, args, 1)?;
                self.registry.read_shard(&args[0])
            }
            "UpdateShard" => {
                let shard = Self::shard_from_args(operation, args)?;
                self.registry.update_shard(&shard)?;
                Ok(Vec::new())
            }
            "DeleteShard" => {
                expect_args(operation, args, 1)?;
                self.registry.delete_shard(&args[0])?;
                Ok(Vec::new())
            }
            "ShardExists" => {
                expect_args(operation, args, 1)?;
                to_json_bool(self.registry.shard_exists(&args[0])?)
            }
            "GetAllShards" => {
                expect_args(operation, args, 0)?;
                self.get_all_shards()
            }
            other => Err(MeshError::UnknownOperation(other.to_string())),
        }
    }
}

/// Model ledger operations, as deployed on each shard channel.
pub struct ModelContract {
    ledger: ModelLedger,
}

impl ModelContract {
    pub fn new(ledger: ModelLedger) -> Self {
        Self { ledger }
    }

    fn model_from_args(operation: &str, args: &[String]) -> Result<ModelRecord> {
        expect_args(operation, args, 6)?;
        ModelRecord::new(
            &args[0],
            &args[1],
            &args[2],
            &args[3],
            parse_u32(operation, "Round", &args[4])?,
            parse_f64(operation, "EvaluationAccuracy", &args[5])?,
        )
    }

    fn get_all_models(&self) -> Result<Vec<u8>> {
        let entries = self
            .ledger
            .all_models()?
            .collect::<Result<Vec<ScanEntry<ModelRecord>>>>()?;
        Ok(serde_json::to_vec(&entries)?)
    }
}

impl Contract for ModelContract {
    fn dispatch(&self, operation: &str, args: &[String]) -> Result<Vec<u8>> {
        match operation {
            "InitLedger" => {
                expect_args(operation, args, 0)?;
                self.ledger.seed()?;
                Ok(Vec::new())
            }
            "CreateModel" => {
                let model = Self::model_from_args(operation, args)?;
                self.ledger.create_model(&model)?;
                Ok(Vec::new())
            }
            "ReadModel" => {
                expect_args(operation, args, 1)?;
                self.ledger.read_model(&args[0])
            }
            "UpdateModel" => {
                let model = Self::model_from_args(operation, args)?;
                self.ledger.update_model(&model)?;
                Ok(Vec::new())
            }
            "DeleteModel" => {
                expect_args(operation, args, 1)?;
                self.ledger.delete_model(&args[0])?;
                Ok(Vec::new())
            }
            "ModelExists" => {
                expect_args(operation, args, 1)?;
                to_json_bool(self.ledger.model_exists(&args[0])?)
            }
            "GetAllModels" => {
                expect_args(operation, args, 0)?;
                self.get_all_models()
            }
            other => Err(MeshError::UnknownOperation(other.to_string())),
        }
    }
}
