//! Wallet session
//!
//! A `WalletSession` holds at most one connected signing credential. It is an
//! explicit object owned by the caller and shared with the submitter; nothing
//! here is process-global. Key material is zeroed when the session disconnects
//! or reconnects with another credential.
//!
//! Every transaction is signed with the account's next sequence number. The
//! session reads the sequence from the chain, and caches the next value only
//! while its own broadcasts keep succeeding, so transactions still sitting in
//! the mempool do not cause sequence mismatches. Any broadcast failure drops the
//! cache and the next transaction re-reads the chain.
//!
//! Gas is sized by simulating the signed transaction first, scaled by
//! `gas_adjustment` and capped by `gas_limit`.

use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use cosmos_sdk_proto::cosmos::bank::v1beta1::MsgSend;
use cosmos_sdk_proto::cosmos::base::v1beta1::Coin as ProtoCoin;
use cosmos_sdk_proto::cosmwasm::wasm::v1::MsgExecuteContract;
use cosmrs::AccountId;
use cosmwasm_std::Coin;
use prost::Message;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::chain::{BroadcastOutcome, ChainClient, TxConfirmation};
use crate::config::NetworkConfig;
use crate::error::Error;
use crate::wallet::{CredentialSource, DexterWallet};

const MSG_EXECUTE_CONTRACT_TYPE_URL: &str = "/cosmwasm.wasm.v1.MsgExecuteContract";
const MSG_SEND_TYPE_URL: &str = "/cosmos.bank.v1beta1.MsgSend";

/// The connected account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Bech32 address
    pub address: String,
    /// Compressed secp256k1 public key as hex
    pub public_key: String,
}

struct ActiveSession {
    wallet: DexterWallet,
    account: Account,
    generation: u64,
}

#[derive(Debug, Clone)]
struct SequenceState {
    generation: u64,
    account_number: u64,
    next_sequence: u64,
}

/// Lifecycle owner of a connected signing credential
pub struct WalletSession {
    chain: Arc<dyn ChainClient>,
    config: NetworkConfig,
    active: RwLock<Option<ActiveSession>>,
    generation: AtomicU64,
    /// Serializes sign-and-broadcast so sequences are handed out in order
    sequence: Mutex<Option<SequenceState>>,
}

impl WalletSession {
    pub fn new(chain: Arc<dyn ChainClient>, config: NetworkConfig) -> Self {
        Self {
            chain,
            config,
            active: RwLock::new(None),
            generation: AtomicU64::new(0),
            sequence: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn chain(&self) -> &Arc<dyn ChainClient> {
        &self.chain
    }

    /// Establish a signing session from `source`
    ///
    /// Replaces any existing session. Fails with [`Error::Authentication`] if the
    /// credential is malformed, the endpoint is unreachable, or the endpoint
    /// serves a different chain.
    pub async fn connect(&self, source: CredentialSource) -> Result<Account, Error> {
        let wallet = source
            .into_wallet(&self.config.account_prefix)
            .map_err(|e| Error::Authentication(e.to_string()))?;
        let info = wallet
            .info()
            .map_err(|e| Error::Authentication(e.to_string()))?;

        let status = self.chain.status().await.map_err(|e| {
            Error::Authentication(format!(
                "Chain endpoint {} unreachable: {}",
                self.config.rpc_url, e
            ))
        })?;

        if status.chain_id != self.config.chain_id {
            return Err(Error::Authentication(format!(
                "Endpoint serves chain '{}', expected '{}'",
                status.chain_id, self.config.chain_id
            )));
        }

        let account = Account {
            address: info.address,
            public_key: info.public_key,
        };
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let previous = self
            .active
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .replace(ActiveSession {
                wallet,
                account: account.clone(),
                generation,
            });
        if let Some(previous) = previous {
            debug!(address = %previous.account.address, "Replaced previous session");
        }

        info!(address = %account.address, chain_id = %status.chain_id, "Wallet connected");
        Ok(account)
    }

    /// Drop the active credential; no-op when already disconnected
    pub fn disconnect(&self) {
        let previous = self
            .active
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(previous) = previous {
            info!(address = %previous.account.address, "Wallet disconnected");
            // Dropping the wallet zeroes the signing key
            drop(previous);
        }
    }

    pub fn current_account(&self) -> Option<Account> {
        self.active
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|s| s.account.clone())
    }

    pub fn is_connected(&self) -> bool {
        self.current_account().is_some()
    }

    /// Sign and broadcast a contract execution, then wait for inclusion
    ///
    /// Never retries. Downstream rejections surface as [`Error::Execution`].
    /// Waiting has no bound of its own; wrap the call in a timeout to give up.
    pub async fn execute(
        &self,
        contract_address: &str,
        message: &serde_json::Value,
        funds: &[Coin],
    ) -> Result<TxConfirmation, Error> {
        let outcome = self.broadcast(contract_address, message, funds).await?;
        self.settle(outcome).await
    }

    /// Sign and relay a contract execution without waiting for inclusion
    pub async fn broadcast(
        &self,
        contract_address: &str,
        message: &serde_json::Value,
        funds: &[Coin],
    ) -> Result<BroadcastOutcome, Error> {
        let (sender, generation) = self.active_sender()?;
        let msg = execute_contract_any(&sender, contract_address, message, funds)
            .map_err(into_execution)?;
        self.sign_and_broadcast(&sender, generation, msg, contract_address)
            .await
    }

    /// Send native tokens from the connected account and wait for inclusion
    pub async fn transfer(&self, recipient: &str, amount: &[Coin]) -> Result<TxConfirmation, Error> {
        let (sender, generation) = self.active_sender()?;
        let msg = bank_send_any(&sender, recipient, amount, &self.config.account_prefix)
            .map_err(into_execution)?;
        let outcome = self
            .sign_and_broadcast(&sender, generation, msg, recipient)
            .await?;
        info!(recipient, tx_hash = outcome.tx_hash(), "Transfer broadcast");
        self.settle(outcome).await
    }

    /// Gas to request for a contract execution, `gas_adjustment` included
    ///
    /// Simulates against the chain with the next sequence; nothing is broadcast.
    pub async fn estimate_gas(
        &self,
        contract_address: &str,
        message: &serde_json::Value,
        funds: &[Coin],
    ) -> Result<u64, Error> {
        let (sender, generation) = self.active_sender()?;
        let msg = execute_contract_any(&sender, contract_address, message, funds)
            .map_err(into_execution)?;

        let sequence = self.sequence.lock().await;
        let (account_number, next_sequence) = self
            .signing_numbers(sequence.as_ref(), &sender, generation)
            .await
            .map_err(into_execution)?;
        let dry_run = self
            .sign(generation, account_number, next_sequence, self.config.gas_limit, msg)
            .map_err(into_execution)?;
        let gas_used = self.chain.simulate(dry_run).await.map_err(into_execution)?;

        Ok(self.config.adjusted_gas(gas_used))
    }

    /// Poll until `tx_hash` is included in a block
    ///
    /// The delay between lookups doubles up to `confirmation_max_poll_interval`.
    /// Only a failed execution ends the wait with an error; a transaction that
    /// is slow to land keeps being polled.
    pub async fn await_confirmation(&self, tx_hash: &str) -> Result<TxConfirmation, Error> {
        let mut delay = self.config.confirmation_poll_interval;
        let mut lookups: u64 = 0;
        loop {
            lookups += 1;
            match self.chain.find_tx(tx_hash).await {
                Ok(Some(confirmation)) => return Ok(confirmation),
                Ok(None) => {
                    debug!(tx_hash, lookups, "Transaction not yet included");
                }
                Err(e @ Error::Execution { .. }) => return Err(e),
                Err(e) => {
                    // Lookups are reads, a transient RPC error is not a verdict
                    warn!(tx_hash, lookups, error = %e, "Transaction lookup failed");
                }
            }
            tokio::time::sleep(delay).await;
            delay = delay
                .saturating_mul(2)
                .min(self.config.confirmation_max_poll_interval);
        }
    }

    /// Smart query against `contract`
    pub async fn query<Q, R>(&self, contract: &str, query: &Q) -> Result<R, Error>
    where
        Q: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let data = self
            .chain
            .query_contract(contract, serde_json::to_vec(query)?)
            .await?;
        Ok(serde_json::from_slice(&data)?)
    }

    /// Bank balances of the connected account
    pub async fn balances(&self) -> Result<Vec<Coin>, Error> {
        let account = self.current_account().ok_or(Error::NotConnected)?;
        self.chain.balances(&account.address).await
    }

    fn active_sender(&self) -> Result<(String, u64), Error> {
        self.active
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|s| (s.account.address.clone(), s.generation))
            .ok_or(Error::NotConnected)
    }

    async fn settle(&self, outcome: BroadcastOutcome) -> Result<TxConfirmation, Error> {
        match outcome {
            BroadcastOutcome::Committed(confirmation) => Ok(confirmation),
            BroadcastOutcome::Accepted { tx_hash } => self.await_confirmation(&tx_hash).await,
        }
    }

    /// Account number and sequence for the next transaction of `sender`
    async fn signing_numbers(
        &self,
        cached: Option<&SequenceState>,
        sender: &str,
        generation: u64,
    ) -> Result<(u64, u64), Error> {
        match cached {
            Some(state) if state.generation == generation => {
                Ok((state.account_number, state.next_sequence))
            }
            _ => {
                let info = self.chain.account(sender).await?;
                Ok((info.account_number, info.sequence))
            }
        }
    }

    async fn sign_and_broadcast(
        &self,
        sender: &str,
        generation: u64,
        msg: cosmrs::Any,
        target: &str,
    ) -> Result<BroadcastOutcome, Error> {
        let mut sequence = self.sequence.lock().await;
        let (account_number, next_sequence) = self
            .signing_numbers(sequence.as_ref(), sender, generation)
            .await
            .map_err(into_execution)?;

        let relayed = async {
            let gas = self
                .gas_for(generation, account_number, next_sequence, &msg)
                .await?;
            let tx_bytes = self.sign(generation, account_number, next_sequence, gas, msg)?;
            self.chain
                .broadcast(tx_bytes, self.config.broadcast_mode)
                .await
        };

        match relayed.await {
            Ok(outcome) => {
                debug!(
                    tx_hash = outcome.tx_hash(),
                    sequence = next_sequence,
                    target,
                    "Broadcast transaction"
                );
                *sequence = Some(SequenceState {
                    generation,
                    account_number,
                    next_sequence: next_sequence + 1,
                });
                Ok(outcome)
            }
            Err(e) => {
                *sequence = None;
                warn!(target, error = %e, "Transaction not broadcast");
                Err(into_execution(e))
            }
        }
    }

    /// Gas limit for `msg`, sized by simulation when enabled
    ///
    /// Falls back to `gas_limit` when the node cannot simulate. A simulation the
    /// chain rejects, or one needing more than `gas_limit`, fails the transaction.
    async fn gas_for(
        &self,
        generation: u64,
        account_number: u64,
        sequence: u64,
        msg: &cosmrs::Any,
    ) -> Result<u64, Error> {
        let limit = self.config.gas_limit;
        if !self.config.simulate_gas {
            return Ok(limit);
        }

        let dry_run = self.sign(generation, account_number, sequence, limit, msg.clone())?;
        match self.chain.simulate(dry_run).await {
            Ok(gas_used) => {
                let gas = self.config.adjusted_gas(gas_used);
                if gas > limit {
                    return Err(Error::execution(format!(
                        "Transaction needs {} gas, above the limit of {}",
                        gas, limit
                    )));
                }
                debug!(gas_used, gas, "Sized gas from simulation");
                Ok(gas)
            }
            Err(e @ Error::Execution { .. }) => Err(e),
            Err(e) => {
                warn!(error = %e, gas_limit = limit, "Gas simulation unavailable, using the configured limit");
                Ok(limit)
            }
        }
    }

    fn sign(
        &self,
        generation: u64,
        account_number: u64,
        sequence: u64,
        gas: u64,
        msg: cosmrs::Any,
    ) -> Result<Vec<u8>, Error> {
        let active = self.active.read().unwrap_or_else(|e| e.into_inner());
        let session = match active.as_ref() {
            Some(session) if session.generation == generation => session,
            // Disconnected or replaced while the account was being fetched
            _ => return Err(Error::NotConnected),
        };

        let fee = session.wallet.create_fee(
            self.config.fee_for_gas(gas),
            gas,
            &self.config.native_denom,
        )?;
        let raw = session.wallet.sign_tx(
            account_number,
            sequence,
            &self.config.chain_id,
            fee,
            vec![msg],
            None,
            None,
        )?;

        raw.to_bytes()
            .map_err(|e| Error::Wallet(format!("Failed to encode transaction: {}", e)))
    }
}

impl std::fmt::Debug for WalletSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletSession")
            .field("chain_id", &self.config.chain_id)
            .field("account", &self.current_account())
            .finish()
    }
}

fn execute_contract_any(
    sender: &str,
    contract: &str,
    message: &serde_json::Value,
    funds: &[Coin],
) -> Result<cosmrs::Any, Error> {
    let msg = MsgExecuteContract {
        sender: sender.to_string(),
        contract: contract.to_string(),
        msg: serde_json::to_vec(message)?,
        funds: proto_coins(funds),
    };

    Ok(cosmrs::Any {
        type_url: MSG_EXECUTE_CONTRACT_TYPE_URL.to_string(),
        value: msg.encode_to_vec(),
    })
}

fn bank_send_any(
    sender: &str,
    recipient: &str,
    amount: &[Coin],
    account_prefix: &str,
) -> Result<cosmrs::Any, Error> {
    let to = AccountId::from_str(recipient)
        .map_err(|e| Error::Wallet(format!("Invalid recipient '{}': {}", recipient, e)))?;
    if to.prefix() != account_prefix {
        return Err(Error::Wallet(format!(
            "Recipient {} is not a '{}' address",
            recipient, account_prefix
        )));
    }
    if amount.is_empty() || amount.iter().any(|c| c.amount.is_zero()) {
        return Err(Error::Wallet(
            "Transfer needs at least one coin with a positive amount".to_string(),
        ));
    }

    let msg = MsgSend {
        from_address: sender.to_string(),
        to_address: to.to_string(),
        amount: proto_coins(amount),
    };

    Ok(cosmrs::Any {
        type_url: MSG_SEND_TYPE_URL.to_string(),
        value: msg.encode_to_vec(),
    })
}

fn proto_coins(coins: &[Coin]) -> Vec<ProtoCoin> {
    coins
        .iter()
        .map(|c| ProtoCoin {
            denom: c.denom.clone(),
            amount: c.amount.to_string(),
        })
        .collect()
}

fn into_execution(e: Error) -> Error {
    match e {
        Error::Execution { .. } | Error::NotConnected => e,
        other => Error::execution(other.to_string()),
    }
}
