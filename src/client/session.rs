//! Ledger client with memoized session handles
//!
//! Single responsibility: hold one logical session against the mesh and
//! re-resolve expensive handles only when the selected channel or contract
//! actually changes.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      LedgerClient                         │
//! │  - channel()/contract() select, without resolving         │
//! │  - submit()/evaluate() resolve lazily, then dispatch      │
//! │  - disconnect() releases the session; reuse re-resolves   │
//! └──────────────────────────────────────────────────────────┘
//!                             │
//!                             ▼
//!          Gateway ──► ChannelHandle ──► ContractHandle
//! ```
//!
//! # Cache coherence
//!
//! A cached handle is valid iff it was resolved for the currently selected
//! name. Re-resolving the channel always drops the contract handle too: a
//! contract handle belongs to the channel it was resolved under, and serving
//! it across a channel switch would read the wrong shard.
//!
//! # Guarantees
//!
//! - Selectors never perform I/O
//! - Resolution happens at most once per selector change
//! - Results and errors pass through unmodified
//!
//! # Non-Guarantees
//!
//! - No internal timeout: callers impose their own deadline
//! - No retry: transport failures surface to the caller, who may call again
//! - A cancelled submit may still have committed; re-query before assuming
//!   non-delivery
//!
//! One client value is one logical session. The selectors take `&mut self`,
//! so sharing a client across tasks without external serialization is a
//! compile error rather than a data race.

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{MeshError, Result};
use crate::gateway::{ChannelHandle, ContractHandle, Gateway};

/// Decide whether a cached handle must be re-resolved for `requested`.
///
/// Pure: `current` is the name the handle was last resolved for, if any.
pub fn needs_resolve(current: Option<&str>, requested: &str) -> bool {
    current != Some(requested)
}

/// Client-side session cache over a [`Gateway`].
pub struct LedgerClient {
    gateway: Arc<dyn Gateway>,
    requested_channel: Option<String>,
    resolved_channel: Option<String>,
    channel_handle: Option<Arc<dyn ChannelHandle>>,
    requested_contract: Option<String>,
    resolved_contract: Option<String>,
    contract_handle: Option<Arc<dyn ContractHandle>>,
}

impl LedgerClient {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self {
            gateway,
            requested_channel: None,
            resolved_channel: None,
            channel_handle: None,
            requested_contract: None,
            resolved_contract: None,
            contract_handle: None,
        }
    }

    /// Select the channel for subsequent operations. No I/O happens here;
    /// resolution is deferred to the next dispatch.
    pub fn channel(&mut self, name: &str) -> &mut Self {
        self.requested_channel = Some(name.to_string());
        self
    }

    /// Select the contract for subsequent operations. No I/O happens here.
    pub fn contract(&mut self, contract_id: &str) -> &mut Self {
        self.requested_contract = Some(contract_id.to_string());
        self
    }

    /// Resolve the handle for the selected channel, reusing the cached one
    /// when the selection has not changed.
    pub async fn resolve_channel(&mut self) -> Result<Arc<dyn ChannelHandle>> {
        let requested = self
            .requested_channel
            .clone()
            .ok_or_else(|| MeshError::InvalidArgument("no channel selected".to_string()))?;

        if !needs_resolve(self.resolved_channel.as_deref(), &requested) {
            if let Some(handle) = &self.channel_handle {
                return Ok(handle.clone());
            }
        }

        debug!(channel = %requested, "Resolving channel handle");
        let handle = self.gateway.channel(&requested).await?;
        self.channel_handle = Some(handle.clone());
        self.resolved_channel = Some(requested);
        // any contract handle was resolved under the previous channel
        self.contract_handle = None;
        self.resolved_contract = None;
        Ok(handle)
    }

    /// Resolve the handle for the selected contract on the selected channel.
    ///
    /// Resolves the channel first; a contract handle only exists relative to
    /// a channel handle.
    pub async fn resolve_contract(&mut self) -> Result<Arc<dyn ContractHandle>> {
        let channel = self.resolve_channel().await?;
        let requested = self
            .requested_contract
            .clone()
            .ok_or_else(|| MeshError::InvalidArgument("no contract selected".to_string()))?;

        if !needs_resolve(self.resolved_contract.as_deref(), &requested) {
            if let Some(handle) = &self.contract_handle {
                return Ok(handle.clone());
            }
        }

        debug!(contract = %requested, "Resolving contract handle");
        let handle = channel.contract(&requested).await?;
        self.contract_handle = Some(handle.clone());
        self.resolved_contract = Some(requested);
        Ok(handle)
    }

    /// Submit a state-changing operation against the selected contract.
    pub async fn submit(&mut self, operation: &str, args: &[String]) -> Result<Vec<u8>> {
        let contract = self.resolve_contract().await?;
        contract.submit(operation, args).await
    }

    /// Evaluate a read-only operation against the selected contract.
    pub async fn evaluate(&mut self, operation: &str, args: &[String]) -> Result<Vec<u8>> {
        let contract = self.resolve_contract().await?;
        contract.evaluate(operation, args).await
    }

    /// Release the session and every cached handle. Idempotent; selections
    /// survive, so the next dispatch re-resolves from scratch. Dropping the
    /// client releases its handles the same way.
    pub async fn disconnect(&mut self) {
        self.channel_handle = None;
        self.resolved_channel = None;
        self.contract_handle = None;
        self.resolved_contract = None;
        self.gateway.close().await;
        info!("Ledger client disconnected");
    }

    /// The cached channel handle, if one is currently resolved.
    pub fn cached_channel(&self) -> Option<Arc<dyn ChannelHandle>> {
        self.channel_handle.clone()
    }

    /// The cached contract handle, if one is currently resolved.
    pub fn cached_contract(&self) -> Option<Arc<dyn ContractHandle>> {
        self.contract_handle.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counters {
        channel_resolves: AtomicUsize,
        contract_resolves: AtomicUsize,
        closes: AtomicUsize,
    }

    struct StubGateway {
        counters: Arc<Counters>,
    }

    struct StubChannel {
        name: String,
        counters: Arc<Counters>,
    }

    struct StubContract {
        channel: String,
        contract: String,
    }

    #[async_trait]
    impl Gateway for StubGateway {
        async fn channel(&self, name: &str) -> Result<Arc<dyn ChannelHandle>> {
            if name == "down" {
                return Err(MeshError::Transport("channel is down".to_string()));
            }
            self.counters.channel_resolves.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(StubChannel {
                name: name.to_string(),
                counters: self.counters.clone(),
            }))
        }

        async fn close(&self) {
            self.counters.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl ChannelHandle for StubChannel {
        async fn contract(&self, contract_id: &str) -> Result<Arc<dyn ContractHandle>> {
            self.counters.contract_resolves.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(StubContract {
                channel: self.name.clone(),
                contract: contract_id.to_string(),
            }))
        }
    }

    #[async_trait]
    impl ContractHandle for StubContract {
        async fn submit(&self, operation: &str, _args: &[String]) -> Result<Vec<u8>> {
            Ok(format!("{}/{}:{operation}", self.channel, self.contract).into_bytes())
        }

        async fn evaluate(&self, operation: &str, args: &[String]) -> Result<Vec<u8>> {
            self.submit(operation, args).await
        }
    }

    fn client() -> (Arc<Counters>, LedgerClient) {
        let counters = Arc::new(Counters::default());
        let gateway = Arc::new(StubGateway {
            counters: counters.clone(),
        });
        (counters, LedgerClient::new(gateway))
    }

    #[test]
    fn needs_resolve_compares_against_last_resolved() {
        assert!(needs_resolve(None, "a"));
        assert!(!needs_resolve(Some("a"), "a"));
        assert!(needs_resolve(Some("a"), "b"));
    }

    #[tokio::test]
    async fn dispatch_without_selection_is_rejected() {
        let (_, mut client) = client();
        let err = client.submit("GetAllShards", &[]).await.unwrap_err();
        assert!(matches!(err, MeshError::InvalidArgument(_)));

        client.channel("mainline");
        let err = client.submit("GetAllShards", &[]).await.unwrap_err();
        assert!(matches!(err, MeshError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn repeated_dispatch_resolves_each_handle_once() {
        let (counters, mut client) = client();
        client.channel("mainline").contract("catalyst");

        for _ in 0..3 {
            client.submit("GetAllShards", &[]).await.unwrap();
        }
        // re-selecting the same names is a no-op too
        client.channel("mainline").contract("catalyst");
        client.evaluate("GetAllShards", &[]).await.unwrap();

        assert_eq!(counters.channel_resolves.load(Ordering::SeqCst), 1);
        assert_eq!(counters.contract_resolves.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn contract_switch_keeps_the_channel_handle() {
        let (counters, mut client) = client();
        client.channel("mainline").contract("catalyst");
        client.submit("op", &[]).await.unwrap();

        let before = client.cached_channel().unwrap();
        client.contract("models");
        let out = client.submit("op", &[]).await.unwrap();
        let after = client.cached_channel().unwrap();

        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(counters.channel_resolves.load(Ordering::SeqCst), 1);
        assert_eq!(counters.contract_resolves.load(Ordering::SeqCst), 2);
        assert_eq!(out, b"mainline/models:op");
    }

    #[tokio::test]
    async fn channel_switch_invalidates_both_handles() {
        let (counters, mut client) = client();
        client.channel("CIFAR1").contract("models");
        let out = client.submit("op", &[]).await.unwrap();
        assert_eq!(out, b"CIFAR1/models:op");

        // same contract id, different channel: the old contract handle must
        // not be served
        client.channel("CIFAR2");
        let out = client.submit("op", &[]).await.unwrap();
        assert_eq!(out, b"CIFAR2/models:op");

        assert_eq!(counters.channel_resolves.load(Ordering::SeqCst), 2);
        assert_eq!(counters.contract_resolves.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn disconnect_is_idempotent_and_reusable() {
        let (counters, mut client) = client();
        client.channel("mainline").contract("catalyst");
        client.submit("op", &[]).await.unwrap();

        client.disconnect().await;
        client.disconnect().await;
        assert_eq!(counters.closes.load(Ordering::SeqCst), 2);
        assert!(client.cached_channel().is_none());
        assert!(client.cached_contract().is_none());

        // selections survive disconnect; next dispatch re-resolves
        client.submit("op", &[]).await.unwrap();
        assert_eq!(counters.channel_resolves.load(Ordering::SeqCst), 2);
        assert_eq!(counters.contract_resolves.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn transport_errors_pass_through_unmodified() {
        let (counters, mut client) = client();
        client.channel("down").contract("catalyst");

        let err = client.submit("op", &[]).await.unwrap_err();
        assert!(matches!(err, MeshError::Transport(msg) if msg == "channel is down"));
        assert_eq!(counters.channel_resolves.load(Ordering::SeqCst), 0);

        // nothing was cached for the failed resolution
        assert!(client.cached_channel().is_none());
    }
}
