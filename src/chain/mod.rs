//! Chain access for the Dexter SDK
//!
//! `ChainClient` is the seam between the wallet session and a concrete node.
//! It never sees key material: the session signs, the client only reads state
//! and relays signed bytes.

pub mod rpc;

pub use rpc::RpcChainClient;

use async_trait::async_trait;
use cosmwasm_std::Coin;
use serde::{Deserialize, Serialize};

use crate::config::BroadcastMode;
use crate::error::Error;

/// Node identity and height
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainStatus {
    pub chain_id: String,
    pub latest_height: u64,
}

/// On-chain account numbers needed to sign
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub account_number: u64,
    pub sequence: u64,
}

/// A transaction included in a block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxConfirmation {
    pub tx_hash: String,
    pub height: u64,
    pub gas_used: i64,
}

/// What the node reported after a broadcast
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BroadcastOutcome {
    /// Passed `CheckTx`; not yet in a block
    Accepted { tx_hash: String },
    /// Already included in a block
    Committed(TxConfirmation),
}

impl BroadcastOutcome {
    pub fn tx_hash(&self) -> &str {
        match self {
            BroadcastOutcome::Accepted { tx_hash } => tx_hash,
            BroadcastOutcome::Committed(confirmation) => &confirmation.tx_hash,
        }
    }
}

/// Read and broadcast access to a CosmWasm chain
///
/// Rejections by the node or the contract are reported as
/// [`Error::Execution`]; transport failures as [`Error::Rpc`].
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Reachability check returning the node's chain id
    async fn status(&self) -> Result<ChainStatus, Error>;

    /// Account number and current sequence for `address`
    async fn account(&self, address: &str) -> Result<AccountInfo, Error>;

    /// Relay signed transaction bytes
    async fn broadcast(&self, tx_bytes: Vec<u8>, mode: BroadcastMode)
        -> Result<BroadcastOutcome, Error>;

    /// Dry-run signed transaction bytes and return the gas they used
    async fn simulate(&self, tx_bytes: Vec<u8>) -> Result<u64, Error>;

    /// Look up an included transaction; `Ok(None)` while it is not in a block
    async fn find_tx(&self, tx_hash: &str) -> Result<Option<TxConfirmation>, Error>;

    /// Raw smart query; `query_data` and the result are JSON bytes
    async fn query_contract(&self, contract: &str, query_data: Vec<u8>) -> Result<Vec<u8>, Error>;

    /// Bank balances of `address`
    async fn balances(&self, address: &str) -> Result<Vec<Coin>, Error>;
}
