use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cosmos_sdk_proto::{
    cosmos::auth::v1beta1::{BaseAccount, QueryAccountRequest, QueryAccountResponse},
    cosmos::bank::v1beta1::{QueryAllBalancesRequest, QueryAllBalancesResponse},
    cosmos::tx::v1beta1::{SimulateRequest, SimulateResponse},
    cosmwasm::wasm::v1::{QuerySmartContractStateRequest, QuerySmartContractStateResponse},
};
use cosmrs::rpc::{Client as RpcClient, HttpClient};
use cosmrs::tendermint::Hash;
use cosmwasm_std::{Coin, Uint128};
use prost::Message;
use tracing::{debug, trace};

use super::{AccountInfo, BroadcastOutcome, ChainClient, ChainStatus, TxConfirmation};
use crate::config::{BroadcastMode, NetworkConfig};
use crate::error::Error;

const BASE_ACCOUNT_TYPE_URL: &str = "/cosmos.auth.v1beta1.BaseAccount";

/// `ChainClient` over a Tendermint/CometBFT RPC endpoint
#[derive(Clone)]
pub struct RpcChainClient {
    rpc_client: Arc<HttpClient>,
    rpc_url: String,
    timeout: Duration,
}

impl RpcChainClient {
    pub fn new(config: &NetworkConfig) -> Result<Self, Error> {
        let rpc_client = HttpClient::new(config.rpc_url.as_str())
            .map_err(|e| Error::Rpc(format!("Failed to create RPC client: {}", e)))?;

        Ok(Self {
            rpc_client: Arc::new(rpc_client),
            rpc_url: config.rpc_url.clone(),
            timeout: config.rpc_timeout,
        })
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    /// Bound a single RPC round trip by the configured timeout
    async fn timed<T, F>(&self, what: &str, fut: F) -> Result<T, Error>
    where
        F: Future<Output = Result<T, cosmrs::rpc::Error>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result.map_err(|e| Error::Rpc(format!("{} failed: {}", what, e))),
            Err(_) => Err(Error::Rpc(format!(
                "{} timed out after {:?}",
                what, self.timeout
            ))),
        }
    }

    async fn abci_query(&self, path: &str, data: Vec<u8>) -> Result<Vec<u8>, Error> {
        let result = self
            .timed(
                "ABCI query",
                self.rpc_client
                    .abci_query(Some(path.to_string()), data, None, false),
            )
            .await?;

        if !result.code.is_ok() {
            return Err(Error::execution(format!(
                "Query {} failed with code {}: {}",
                path,
                result.code.value(),
                result.log
            )));
        }

        Ok(result.value)
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn status(&self) -> Result<ChainStatus, Error> {
        let status = self
            .timed("Node status", self.rpc_client.status())
            .await?;

        Ok(ChainStatus {
            chain_id: status.node_info.network.to_string(),
            latest_height: status.sync_info.latest_block_height.value(),
        })
    }

    async fn account(&self, address: &str) -> Result<AccountInfo, Error> {
        let request = QueryAccountRequest {
            address: address.to_string(),
        };
        let value = self
            .abci_query("/cosmos.auth.v1beta1.Query/Account", request.encode_to_vec())
            .await?;

        let response = QueryAccountResponse::decode(value.as_slice())
            .map_err(|e| Error::Rpc(format!("Failed to decode account response: {}", e)))?;

        let account_any = response
            .account
            .ok_or_else(|| Error::execution(format!("Account {} not found on chain", address)))?;

        if account_any.type_url != BASE_ACCOUNT_TYPE_URL {
            return Err(Error::execution(format!(
                "Unsupported account type '{}' for {}",
                account_any.type_url, address
            )));
        }

        let base_account = BaseAccount::decode(account_any.value.as_slice())
            .map_err(|e| Error::Rpc(format!("Failed to decode BaseAccount: {}", e)))?;

        trace!(
            address,
            account_number = base_account.account_number,
            sequence = base_account.sequence,
            "Fetched account"
        );

        Ok(AccountInfo {
            account_number: base_account.account_number,
            sequence: base_account.sequence,
        })
    }

    async fn broadcast(
        &self,
        tx_bytes: Vec<u8>,
        mode: BroadcastMode,
    ) -> Result<BroadcastOutcome, Error> {
        match mode {
            BroadcastMode::Sync => {
                let response = self
                    .timed("Broadcast", self.rpc_client.broadcast_tx_sync(tx_bytes))
                    .await?;

                if response.code.is_err() {
                    return Err(Error::execution(format!(
                        "Transaction check failed: {}",
                        response.log
                    )));
                }

                debug!(tx_hash = %response.hash, "Transaction accepted");
                Ok(BroadcastOutcome::Accepted {
                    tx_hash: response.hash.to_string(),
                })
            }
            BroadcastMode::Commit => {
                let response = self
                    .timed("Broadcast", self.rpc_client.broadcast_tx_commit(tx_bytes))
                    .await?;

                if response.check_tx.code.is_err() {
                    return Err(Error::execution(format!(
                        "Transaction check failed: {}",
                        response.check_tx.log
                    )));
                }
                if response.tx_result.code.is_err() {
                    return Err(Error::execution(format!(
                        "Transaction execution failed: {}",
                        response.tx_result.log
                    )));
                }

                debug!(tx_hash = %response.hash, height = %response.height, "Transaction committed");
                Ok(BroadcastOutcome::Committed(TxConfirmation {
                    tx_hash: response.hash.to_string(),
                    height: response.height.value(),
                    gas_used: response.tx_result.gas_used,
                }))
            }
        }
    }

    async fn simulate(&self, tx_bytes: Vec<u8>) -> Result<u64, Error> {
        let request = SimulateRequest {
            tx_bytes,
            ..Default::default()
        };
        let value = self
            .abci_query("/cosmos.tx.v1beta1.Service/Simulate", request.encode_to_vec())
            .await?;

        let response = SimulateResponse::decode(value.as_slice())
            .map_err(|e| Error::Rpc(format!("Failed to decode simulation response: {}", e)))?;
        let gas_info = response
            .gas_info
            .ok_or_else(|| Error::Rpc("Simulation returned no gas info".to_string()))?;

        trace!(gas_used = gas_info.gas_used, "Simulated transaction");
        Ok(gas_info.gas_used)
    }

    async fn find_tx(&self, tx_hash: &str) -> Result<Option<TxConfirmation>, Error> {
        let hash = Hash::from_str(tx_hash)
            .map_err(|e| Error::Rpc(format!("Invalid tx hash '{}': {}", tx_hash, e)))?;

        let tx = match tokio::time::timeout(self.timeout, self.rpc_client.tx(hash, false)).await {
            Ok(Ok(tx)) => tx,
            Ok(Err(e)) if e.to_string().contains("not found") => return Ok(None),
            Ok(Err(e)) => return Err(Error::Rpc(format!("Failed to get transaction: {}", e))),
            Err(_) => {
                return Err(Error::Rpc(format!(
                    "Transaction lookup timed out after {:?}",
                    self.timeout
                )))
            }
        };

        if tx.tx_result.code.is_err() {
            return Err(Error::execution(format!(
                "Transaction execution failed: {}",
                tx.tx_result.log
            )));
        }

        Ok(Some(TxConfirmation {
            tx_hash: tx.hash.to_string(),
            height: tx.height.value(),
            gas_used: tx.tx_result.gas_used,
        }))
    }

    async fn query_contract(&self, contract: &str, query_data: Vec<u8>) -> Result<Vec<u8>, Error> {
        let request = QuerySmartContractStateRequest {
            address: contract.to_string(),
            query_data,
        };
        let value = self
            .abci_query(
                "/cosmwasm.wasm.v1.Query/SmartContractState",
                request.encode_to_vec(),
            )
            .await?;

        let response = QuerySmartContractStateResponse::decode(value.as_slice())
            .map_err(|e| Error::Rpc(format!("Failed to decode query response: {}", e)))?;
        Ok(response.data)
    }

    async fn balances(&self, address: &str) -> Result<Vec<Coin>, Error> {
        let request = QueryAllBalancesRequest {
            address: address.to_string(),
            pagination: None,
            resolve_denom: false,
        };
        let value = self
            .abci_query("/cosmos.bank.v1beta1.Query/AllBalances", request.encode_to_vec())
            .await?;

        let response = QueryAllBalancesResponse::decode(value.as_slice())
            .map_err(|e| Error::Rpc(format!("Failed to decode balances response: {}", e)))?;

        response
            .balances
            .into_iter()
            .map(|coin| {
                let amount = Uint128::from_str(&coin.amount).map_err(|e| {
                    Error::Rpc(format!("Invalid amount '{}' for {}: {}", coin.amount, coin.denom, e))
                })?;
                Ok(Coin {
                    denom: coin.denom,
                    amount,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_invalid_url() {
        let config = NetworkConfig {
            rpc_url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(matches!(RpcChainClient::new(&config), Err(Error::Rpc(_))));
    }

    #[test]
    fn test_builds_for_default_network() {
        let client = RpcChainClient::new(&NetworkConfig::default()).unwrap();
        assert_eq!(client.rpc_url(), "https://rpc.xion-testnet-1.burnt.com:443");
    }
}
