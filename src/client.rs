//! Dexter SDK client
//!
//! The main entry point: wires the network configuration, chain client, wallet
//! session, status store, and intent submitter together.

use crate::chain::{ChainClient, RpcChainClient, TxConfirmation};
use crate::config::{ContractType, NetworkConfig};
use crate::error::Error;
use crate::intent::{IntentId, IntentPayload};
use crate::session::{Account, WalletSession};
use crate::status::{IntentStatus, StatusReceiver, StatusStore, SubscriptionId};
use crate::submitter::{IntentSubmitter, WaitOutcome};
use crate::wallet::CredentialSource;
use cosmwasm_std::Coin;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Main Dexter client
pub struct DexterClient {
    /// Network configuration
    config: NetworkConfig,

    /// Chain access shared with the session
    chain: Arc<dyn ChainClient>,

    /// Signing session
    session: Arc<WalletSession>,

    /// Intent submission and tracking
    submitter: IntentSubmitter,
}

impl DexterClient {
    /// Create a client talking to the configured RPC endpoint
    pub fn new(config: NetworkConfig) -> Result<Self, Error> {
        let chain: Arc<dyn ChainClient> = Arc::new(RpcChainClient::new(&config)?);
        Ok(Self::with_chain_client(config, chain))
    }

    /// Create a client on top of any chain client
    pub fn with_chain_client(config: NetworkConfig, chain: Arc<dyn ChainClient>) -> Self {
        let session = Arc::new(WalletSession::new(chain.clone(), config.clone()));
        let submitter = IntentSubmitter::new(session.clone(), StatusStore::new());
        Self {
            config,
            chain,
            session,
            submitter,
        }
    }

    /// Get the network configuration
    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn chain_client(&self) -> &Arc<dyn ChainClient> {
        &self.chain
    }

    pub fn session(&self) -> &Arc<WalletSession> {
        &self.session
    }

    pub fn submitter(&self) -> &IntentSubmitter {
        &self.submitter
    }

    pub fn store(&self) -> &StatusStore {
        self.submitter.store()
    }

    /// Get contract address for a specific contract type
    pub fn get_contract_address(&self, contract_type: &ContractType) -> Result<String, Error> {
        self.config.contract_address(contract_type)
    }

    // ============ Session ============

    pub async fn connect(&self, source: CredentialSource) -> Result<Account, Error> {
        self.session.connect(source).await
    }

    pub fn disconnect(&self) {
        self.session.disconnect()
    }

    pub fn account(&self) -> Option<Account> {
        self.session.current_account()
    }

    /// Bank balances of the connected account
    pub async fn balances(&self) -> Result<Vec<Coin>, Error> {
        self.session.balances().await
    }

    /// Send native tokens and wait for inclusion
    pub async fn transfer(&self, recipient: &str, amount: &[Coin]) -> Result<TxConfirmation, Error> {
        self.session.transfer(recipient, amount).await
    }

    /// Gas an intent with this payload would request, without submitting it
    pub async fn estimate_gas(&self, payload: &IntentPayload) -> Result<u64, Error> {
        let call = payload.to_contract_call(&self.config.contracts)?;
        self.session
            .estimate_gas(&call.contract, &call.msg, &call.funds)
            .await
    }

    /// Smart query against one of the configured contracts
    pub async fn query_contract<Q, R>(&self, contract_type: &ContractType, query: &Q) -> Result<R, Error>
    where
        Q: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let address = self.get_contract_address(contract_type)?;
        self.session.query(&address, query).await
    }

    // ============ Intents ============

    pub async fn submit(&self, payload: IntentPayload) -> Result<IntentId, Error> {
        self.submitter.submit(payload).await
    }

    pub async fn resubmit(&self, intent_id: &IntentId) -> Result<IntentId, Error> {
        self.submitter.resubmit(intent_id).await
    }

    pub fn status(&self, intent_id: &IntentId) -> Option<IntentStatus> {
        self.submitter.status(intent_id)
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&IntentStatus) + Send + Sync + 'static,
    {
        self.store().subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.store().unsubscribe(id)
    }

    pub fn watch(&self) -> StatusReceiver {
        self.store().watch()
    }

    pub async fn wait_for_terminal(
        &self,
        intent_id: &IntentId,
        timeout: Duration,
    ) -> Result<WaitOutcome, Error> {
        self.submitter.wait_for_terminal(intent_id, timeout).await
    }

    /// Wait on several intents concurrently, each with the same timeout
    pub async fn wait_all(
        &self,
        intent_ids: &[IntentId],
        timeout: Duration,
    ) -> Vec<Result<WaitOutcome, Error>> {
        futures::future::join_all(
            intent_ids
                .iter()
                .map(|id| self.submitter.wait_for_terminal(id, timeout)),
        )
        .await
    }

    // ============ Utility methods ============

    /// Check that the chain endpoint answers with the configured chain id
    pub async fn check_connectivity(&self) -> Result<bool, Error> {
        let status = self.chain.status().await?;
        Ok(status.chain_id == self.config.chain_id)
    }

    /// Get a summary of the client configuration
    pub fn get_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "network": {
                "name": self.config.network_name,
                "chain_id": self.config.chain_id,
                "rpc_endpoint": self.config.rpc_url,
                "broadcast_mode": self.config.broadcast_mode.to_string(),
            },
            "contracts": self.config.contracts,
            "wallet_connected": self.session.is_connected(),
            "intents": {
                "total": self.store().len(),
                "in_flight": self.store().in_flight().len(),
            },
        })
    }
}

impl std::fmt::Debug for DexterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DexterClient")
            .field("chain_id", &self.config.chain_id)
            .field("session", &self.session)
            .field("store", self.store())
            .finish()
    }
}

/// Builder pattern for DexterClient construction
#[derive(Default)]
pub struct DexterClientBuilder {
    config: Option<NetworkConfig>,
    chain_client: Option<Arc<dyn ChainClient>>,
    contracts: Vec<(ContractType, String)>,
}

impl DexterClientBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the network configuration
    pub fn with_config(mut self, config: NetworkConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Use a custom chain client instead of the RPC client
    pub fn with_chain_client(mut self, chain_client: Arc<dyn ChainClient>) -> Self {
        self.chain_client = Some(chain_client);
        self
    }

    /// Override one contract address
    pub fn with_contract(mut self, contract_type: ContractType, address: impl Into<String>) -> Self {
        self.contracts.push((contract_type, address.into()));
        self
    }

    /// Build the client, falling back to the default network configuration
    pub fn build(self) -> Result<DexterClient, Error> {
        let mut config = self.config.unwrap_or_default();
        for (contract_type, address) in self.contracts {
            config.contracts.set(contract_type, address);
        }

        match self.chain_client {
            Some(chain) => Ok(DexterClient::with_chain_client(config, chain)),
            None => DexterClient::new(config),
        }
    }

    /// Build with configuration discovered from files and environment
    pub fn build_auto(self) -> Result<DexterClient, Error> {
        if self.config.is_some() {
            return self.build();
        }
        let config = NetworkConfig::load()?;
        self.with_config(config).build()
    }
}
