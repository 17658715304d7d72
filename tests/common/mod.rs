//! Scriptable in-memory chain shared by the integration tests
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cosmos_sdk_proto::cosmos::bank::v1beta1::MsgSend;
use cosmos_sdk_proto::cosmwasm::wasm::v1::MsgExecuteContract;
use cosmrs::Tx;
use dexter_sdk::{
    AccountInfo, BroadcastMode, BroadcastOutcome, ChainClient, ChainStatus, Coin,
    ContractAddresses, DexterClient, Error, NetworkConfig, TxConfirmation,
};
use prost::Message;

pub const MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
pub const CHAIN_ID: &str = "xion-testnet-1";
pub const TRADING: &str = "xion1trading";
pub const LIQUIDITY_POOL: &str = "xion1pool";

/// How the mock answers the next broadcast
#[derive(Debug, Clone)]
pub enum Reply {
    Commit(String),
    Accept(String),
    Reject(String),
}

/// How the mock answers a simulation
#[derive(Debug, Clone)]
pub enum Simulation {
    Gas(u64),
    Reject(String),
    Unavailable,
}

pub const EXECUTE_TYPE_URL: &str = "/cosmwasm.wasm.v1.MsgExecuteContract";
pub const SEND_TYPE_URL: &str = "/cosmos.bank.v1beta1.MsgSend";

/// A broadcast the mock received, decoded
///
/// For bank sends `contract` holds the recipient and `msg` is null.
#[derive(Debug, Clone)]
pub struct SentTx {
    pub type_url: String,
    pub sequence: u64,
    pub gas_limit: u64,
    pub contract: String,
    pub msg: serde_json::Value,
    pub funds: Vec<(String, String)>,
}

pub struct MockChain {
    pub chain_id: String,
    reachable: AtomicBool,
    account: Mutex<AccountInfo>,
    replies: Mutex<VecDeque<Reply>>,
    default_reply: Mutex<Reply>,
    broadcast_delay: Mutex<Option<Duration>>,
    sent: Mutex<Vec<SentTx>>,
    account_lookups: AtomicUsize,
    simulation: Mutex<Simulation>,
    simulations: AtomicUsize,
    tx_lookups: AtomicUsize,
    /// Lookups that return "not yet included" before the tx shows up
    pending_lookups: AtomicUsize,
    failed_txs: Mutex<HashMap<String, String>>,
    balances: Mutex<Vec<Coin>>,
    query_response: Mutex<serde_json::Value>,
}

impl MockChain {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            chain_id: CHAIN_ID.to_string(),
            reachable: AtomicBool::new(true),
            account: Mutex::new(AccountInfo {
                account_number: 42,
                sequence: 7,
            }),
            replies: Mutex::new(VecDeque::new()),
            default_reply: Mutex::new(Reply::Commit("0xabc".to_string())),
            broadcast_delay: Mutex::new(None),
            sent: Mutex::new(Vec::new()),
            account_lookups: AtomicUsize::new(0),
            simulation: Mutex::new(Simulation::Gas(100_000)),
            simulations: AtomicUsize::new(0),
            tx_lookups: AtomicUsize::new(0),
            pending_lookups: AtomicUsize::new(0),
            failed_txs: Mutex::new(HashMap::new()),
            balances: Mutex::new(Vec::new()),
            query_response: Mutex::new(serde_json::Value::Null),
        })
    }

    pub fn with_chain_id(chain_id: &str) -> Arc<Self> {
        let mut chain = Self::new();
        Arc::get_mut(&mut chain).unwrap().chain_id = chain_id.to_string();
        chain
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn push_reply(&self, reply: Reply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn set_default_reply(&self, reply: Reply) {
        *self.default_reply.lock().unwrap() = reply;
    }

    pub fn set_broadcast_delay(&self, delay: Duration) {
        *self.broadcast_delay.lock().unwrap() = Some(delay);
    }

    pub fn set_pending_lookups(&self, lookups: usize) {
        self.pending_lookups.store(lookups, Ordering::SeqCst);
    }

    pub fn set_simulation(&self, simulation: Simulation) {
        *self.simulation.lock().unwrap() = simulation;
    }

    pub fn simulations(&self) -> usize {
        self.simulations.load(Ordering::SeqCst)
    }

    pub fn tx_lookups(&self) -> usize {
        self.tx_lookups.load(Ordering::SeqCst)
    }

    pub fn fail_tx(&self, tx_hash: &str, reason: &str) {
        self.failed_txs
            .lock()
            .unwrap()
            .insert(tx_hash.to_string(), reason.to_string());
    }

    pub fn set_balances(&self, balances: Vec<Coin>) {
        *self.balances.lock().unwrap() = balances;
    }

    pub fn set_query_response(&self, response: serde_json::Value) {
        *self.query_response.lock().unwrap() = response;
    }

    pub fn sent(&self) -> Vec<SentTx> {
        self.sent.lock().unwrap().clone()
    }

    pub fn account_lookups(&self) -> usize {
        self.account_lookups.load(Ordering::SeqCst)
    }

    fn decode(tx_bytes: &[u8]) -> SentTx {
        let tx = Tx::from_bytes(tx_bytes).expect("signed tx decodes");
        let sequence = tx.auth_info.signer_infos[0].sequence;
        let gas_limit = tx.auth_info.fee.gas_limit;
        let any = &tx.body.messages[0];
        match any.type_url.as_str() {
            EXECUTE_TYPE_URL => {
                let msg = MsgExecuteContract::decode(any.value.as_slice()).expect("message decodes");
                SentTx {
                    type_url: any.type_url.clone(),
                    sequence,
                    gas_limit,
                    contract: msg.contract,
                    msg: serde_json::from_slice(&msg.msg).expect("json message"),
                    funds: msg.funds.into_iter().map(|c| (c.denom, c.amount)).collect(),
                }
            }
            SEND_TYPE_URL => {
                let msg = MsgSend::decode(any.value.as_slice()).expect("message decodes");
                SentTx {
                    type_url: any.type_url.clone(),
                    sequence,
                    gas_limit,
                    contract: msg.to_address,
                    msg: serde_json::Value::Null,
                    funds: msg.amount.into_iter().map(|c| (c.denom, c.amount)).collect(),
                }
            }
            other => panic!("unexpected message type {}", other),
        }
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn status(&self) -> Result<ChainStatus, Error> {
        if !self.reachable.load(Ordering::SeqCst) {
            return Err(Error::Rpc("connection refused".to_string()));
        }
        Ok(ChainStatus {
            chain_id: self.chain_id.clone(),
            latest_height: 100,
        })
    }

    async fn account(&self, _address: &str) -> Result<AccountInfo, Error> {
        self.account_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(*self.account.lock().unwrap())
    }

    async fn broadcast(
        &self,
        tx_bytes: Vec<u8>,
        _mode: BroadcastMode,
    ) -> Result<BroadcastOutcome, Error> {
        let delay = *self.broadcast_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let sent = Self::decode(&tx_bytes);
        self.sent.lock().unwrap().push(sent.clone());

        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default_reply.lock().unwrap().clone());

        match reply {
            Reply::Commit(hash) => {
                self.account.lock().unwrap().sequence = sent.sequence + 1;
                Ok(BroadcastOutcome::Committed(TxConfirmation {
                    tx_hash: hash,
                    height: 101,
                    gas_used: 150_000,
                }))
            }
            Reply::Accept(hash) => Ok(BroadcastOutcome::Accepted { tx_hash: hash }),
            Reply::Reject(reason) => Err(Error::execution(reason)),
        }
    }

    async fn simulate(&self, tx_bytes: Vec<u8>) -> Result<u64, Error> {
        self.simulations.fetch_add(1, Ordering::SeqCst);
        Self::decode(&tx_bytes);
        match self.simulation.lock().unwrap().clone() {
            Simulation::Gas(gas) => Ok(gas),
            Simulation::Reject(reason) => Err(Error::execution(reason)),
            Simulation::Unavailable => Err(Error::Rpc("simulation not supported".to_string())),
        }
    }

    async fn find_tx(&self, tx_hash: &str) -> Result<Option<TxConfirmation>, Error> {
        self.tx_lookups.fetch_add(1, Ordering::SeqCst);
        let pending = self.pending_lookups.load(Ordering::SeqCst);
        if pending > 0 {
            self.pending_lookups.store(pending - 1, Ordering::SeqCst);
            return Ok(None);
        }
        if let Some(reason) = self.failed_txs.lock().unwrap().get(tx_hash) {
            return Err(Error::execution(reason.clone()));
        }
        Ok(Some(TxConfirmation {
            tx_hash: tx_hash.to_string(),
            height: 102,
            gas_used: 120_000,
        }))
    }

    async fn query_contract(&self, _contract: &str, _query_data: Vec<u8>) -> Result<Vec<u8>, Error> {
        Ok(serde_json::to_vec(&*self.query_response.lock().unwrap())?)
    }

    async fn balances(&self, _address: &str) -> Result<Vec<Coin>, Error> {
        Ok(self.balances.lock().unwrap().clone())
    }
}

pub fn test_config(mode: BroadcastMode) -> NetworkConfig {
    let mut contracts = ContractAddresses::default();
    contracts.trading = Some(TRADING.to_string());
    contracts.liquidity_pool = Some(LIQUIDITY_POOL.to_string());

    NetworkConfig {
        chain_id: CHAIN_ID.to_string(),
        broadcast_mode: mode,
        confirmation_poll_interval: Duration::from_millis(5),
        confirmation_max_poll_interval: Duration::from_millis(20),
        contracts,
        ..Default::default()
    }
}

pub fn client_with(chain: Arc<MockChain>, mode: BroadcastMode) -> DexterClient {
    DexterClient::with_chain_client(test_config(mode), chain)
}
