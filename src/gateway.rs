//! Gateway seam and the embedded runtime
//!
//! The client side never talks to a ledger directly; it goes through three
//! narrow traits: a [`Gateway`] yields channel handles, a [`ChannelHandle`]
//! yields contract handles, a [`ContractHandle`] submits or evaluates
//! operations. Resolution is treated as expensive and long-latency, which is
//! why the session layer memoizes the handles.
//!
//! [`EmbeddedGateway`] is the in-process implementation used by the operator
//! CLI and the test suite: named channels over local world-state namespaces,
//! each hosting contract dispatchers. Submits commit inline, so submit and
//! evaluate reach the same dispatcher.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, info};

use crate::config::{CONTROL_CHANNEL, MODEL_CONTRACT, REGISTRY_CONTRACT};
use crate::contract::{
    Contract, ModelContract, ModelLedger, RegistryContract, ShardRegistry,
};
use crate::error::{MeshError, Result};
use crate::state::SledWorldState;

/// Top-level session resource against one ledger deployment.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Resolve a handle to a named channel.
    async fn channel(&self, name: &str) -> Result<Arc<dyn ChannelHandle>>;

    /// Release the session. Idempotent; a released gateway may still be
    /// asked to resolve again by a retrying caller.
    async fn close(&self);
}

/// A resolved channel: entry point for the contracts deployed on it.
#[async_trait]
pub trait ChannelHandle: Send + Sync {
    async fn contract(&self, contract_id: &str) -> Result<Arc<dyn ContractHandle>>;
}

/// A resolved contract on a resolved channel.
///
/// Neither call carries an internal timeout or retry; callers impose their
/// own deadline. A cancelled submit may still have committed, so callers
/// re-query before assuming non-delivery.
#[async_trait]
pub trait ContractHandle: Send + Sync {
    /// Submit a state-changing transaction and wait for commitment.
    async fn submit(&self, operation: &str, args: &[String]) -> Result<Vec<u8>>;

    /// Evaluate a read-only operation.
    async fn evaluate(&self, operation: &str, args: &[String]) -> Result<Vec<u8>>;
}

/// In-process gateway hosting contract dispatchers over local state.
#[derive(Default)]
pub struct EmbeddedGateway {
    channels: DashMap<String, Arc<EmbeddedChannel>>,
}

impl EmbeddedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create a named channel.
    pub fn add_channel(&self, name: &str) -> Arc<EmbeddedChannel> {
        self.channels
            .entry(name.to_string())
            .or_insert_with(|| {
                Arc::new(EmbeddedChannel {
                    name: name.to_string(),
                    contracts: DashMap::new(),
                })
            })
            .clone()
    }

    /// Standard mesh deployment over one embedded database: the registry
    /// contract on the control channel plus a model contract for every
    /// shard channel currently in the registry. Channels registered later
    /// appear on the next open.
    pub fn open_mesh(db: &sled::Db) -> Result<Self> {
        let control_state = Arc::new(SledWorldState::open_namespace(db, CONTROL_CHANNEL)?);
        let registry = ShardRegistry::new(control_state);
        let shard_channels: Vec<String> = registry
            .shard_records()?
            .into_iter()
            .map(|shard| shard.channel)
            .collect();

        let gateway = Self::new();
        gateway
            .add_channel(CONTROL_CHANNEL)
            .deploy(REGISTRY_CONTRACT, Arc::new(RegistryContract::new(registry)));

        for channel in &shard_channels {
            let state = Arc::new(SledWorldState::open_namespace(db, channel)?);
            gateway
                .add_channel(channel)
                .deploy(MODEL_CONTRACT, Arc::new(ModelContract::new(ModelLedger::new(state))));
        }

        info!(
            shard_channels = shard_channels.len(),
            "Opened embedded mesh"
        );
        Ok(gateway)
    }
}

#[async_trait]
impl Gateway for EmbeddedGateway {
    async fn channel(&self, name: &str) -> Result<Arc<dyn ChannelHandle>> {
        match self.channels.get(name) {
            Some(channel) => Ok(channel.clone() as Arc<dyn ChannelHandle>),
            None => Err(MeshError::Transport(format!(
                "channel {name} is not deployed"
            ))),
        }
    }

    async fn close(&self) {
        debug!("Embedded gateway closed");
    }
}

/// One named channel of the embedded runtime.
pub struct EmbeddedChannel {
    name: String,
    contracts: DashMap<String, Arc<dyn Contract>>,
}

impl EmbeddedChannel {
    /// Deploy a contract dispatcher under an id. Redeploying replaces it.
    pub fn deploy(&self, contract_id: &str, contract: Arc<dyn Contract>) {
        debug!(channel = %self.name, contract = %contract_id, "Deployed contract");
        self.contracts.insert(contract_id.to_string(), contract);
    }
}

#[async_trait]
impl ChannelHandle for EmbeddedChannel {
    async fn contract(&self, contract_id: &str) -> Result<Arc<dyn ContractHandle>> {
        match self.contracts.get(contract_id) {
            Some(contract) => Ok(Arc::new(EmbeddedInvoker {
                contract: contract.clone(),
            })),
            None => Err(MeshError::Transport(format!(
                "contract {contract_id} is not deployed on channel {}",
                self.name
            ))),
        }
    }
}

struct EmbeddedInvoker {
    contract: Arc<dyn Contract>,
}

#[async_trait]
impl ContractHandle for EmbeddedInvoker {
    async fn submit(&self, operation: &str, args: &[String]) -> Result<Vec<u8>> {
        self.contract.dispatch(operation, args)
    }

    async fn evaluate(&self, operation: &str, args: &[String]) -> Result<Vec<u8>> {
        self.contract.dispatch(operation, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MemoryWorldState;

    fn deployed_gateway() -> EmbeddedGateway {
        let gateway = EmbeddedGateway::new();
        let registry = ShardRegistry::new(Arc::new(MemoryWorldState::new()));
        gateway
            .add_channel(CONTROL_CHANNEL)
            .deploy(REGISTRY_CONTRACT, Arc::new(RegistryContract::new(registry)));
        gateway
    }

    #[tokio::test]
    async fn undeployed_channel_is_a_transport_error() {
        let gateway = deployed_gateway();
        assert!(matches!(
            gateway.channel("nowhere").await,
            Err(MeshError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn undeployed_contract_is_a_transport_error() {
        let gateway = deployed_gateway();
        let channel = gateway.channel(CONTROL_CHANNEL).await.unwrap();
        assert!(matches!(
            channel.contract("missing").await,
            Err(MeshError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn submit_and_evaluate_reach_the_dispatcher() {
        let gateway = deployed_gateway();
        let channel = gateway.channel(CONTROL_CHANNEL).await.unwrap();
        let contract = channel.contract(REGISTRY_CONTRACT).await.unwrap();

        contract
            .submit(
                "CreateShard",
                &["9".to_string(), "CIFAR9".to_string(), "0".to_string(), String::new()],
            )
            .await
            .unwrap();

        let bytes = contract
            .evaluate("ReadShard", &["9".to_string()])
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["Channel"], "CIFAR9");
    }

    #[tokio::test]
    async fn open_mesh_deploys_registered_shard_channels() {
        let dir = tempfile::tempdir().unwrap();
        let db = sled::open(dir.path()).unwrap();

        let control = Arc::new(SledWorldState::open_namespace(&db, CONTROL_CHANNEL).unwrap());
        ShardRegistry::new(control).seed().unwrap();

        let gateway = EmbeddedGateway::open_mesh(&db).unwrap();
        assert!(gateway.channel("CIFAR1").await.is_ok());
        assert!(gateway.channel("CIFAR2").await.is_ok());
        assert!(gateway.channel("CIFAR3").await.is_err());

        gateway.close().await;
        gateway.close().await;
    }
}
