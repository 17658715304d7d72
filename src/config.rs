//! Configuration management for the Dexter SDK
//!
//! Network settings and contract addresses are plain string configuration.
//! They are read from `dexter.toml`/`config.toml` (or json) files through the
//! `config` crate and overridden by `DEXTER_*` environment variables.

pub mod contracts;
pub mod env;

pub use contracts::{ContractAddresses, ContractType};
pub use env::{EnvironmentConfig, LoggingEnvConfig, NetworkEnvConfig};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::error::Error;

/// How signed transactions are handed to the node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BroadcastMode {
    /// Return once the transaction passes `CheckTx`; inclusion is polled separately
    Sync,
    /// Return once the transaction is included in a block
    Commit,
}

impl fmt::Display for BroadcastMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BroadcastMode::Sync => write!(f, "sync"),
            BroadcastMode::Commit => write!(f, "commit"),
        }
    }
}

impl FromStr for BroadcastMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sync" => Ok(BroadcastMode::Sync),
            "commit" | "block" => Ok(BroadcastMode::Commit),
            other => Err(Error::Config(format!(
                "Invalid broadcast mode '{}'. Must be 'sync' or 'commit'",
                other
            ))),
        }
    }
}

/// Resolved network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Network name (e.g., xion-testnet)
    pub network_name: String,
    /// Chain ID used for signing
    pub chain_id: String,
    /// RPC endpoint URL
    pub rpc_url: String,
    /// Gas price in native token
    pub gas_price: f64,
    /// Gas adjustment for transactions
    pub gas_adjustment: f64,
    /// Native token denom
    pub native_denom: String,
    /// Bech32 account prefix
    pub account_prefix: String,
    /// Gas ceiling per transaction; used as-is when simulation is off or unavailable
    pub gas_limit: u64,
    /// Simulate each transaction and size gas from the result
    pub simulate_gas: bool,
    pub broadcast_mode: BroadcastMode,
    pub rpc_timeout: Duration,
    /// First delay between confirmation lookups; doubles after each miss
    pub confirmation_poll_interval: Duration,
    pub confirmation_max_poll_interval: Duration,
    /// Contract addresses
    pub contracts: ContractAddresses,
}

impl NetworkConfig {
    /// Load from config files and `DEXTER_*` environment variables
    pub fn load() -> Result<Self, Error> {
        let env_config = EnvironmentConfig::load()?;
        Self::from_env_config(&env_config)
    }

    /// Load from a single config file plus environment overrides
    pub fn load_from_path(path: &Path) -> Result<Self, Error> {
        let env_config = EnvironmentConfig::load_from_path(path)?;
        Self::from_env_config(&env_config)
    }

    pub fn from_env_config(env_config: &EnvironmentConfig) -> Result<Self, Error> {
        let broadcast_mode = match env_config.network.broadcast_mode {
            Some(ref mode) => mode.parse()?,
            None => BroadcastMode::Sync,
        };

        Ok(Self {
            network_name: env_config.get_network_name(),
            chain_id: env_config.get_chain_id(),
            rpc_url: env_config.get_rpc_url(),
            gas_price: env_config.get_gas_price(),
            gas_adjustment: env_config.get_gas_adjustment(),
            native_denom: env_config.get_native_denom(),
            account_prefix: env_config.get_account_prefix(),
            gas_limit: env_config.network.gas_limit.unwrap_or(env::DEFAULT_GAS_LIMIT),
            simulate_gas: env_config.network.simulate_gas.unwrap_or(true),
            broadcast_mode,
            rpc_timeout: Duration::from_secs(env_config.network.rpc_timeout_secs.unwrap_or(30)),
            confirmation_poll_interval: Duration::from_millis(
                env_config
                    .network
                    .confirmation_poll_interval_ms
                    .unwrap_or(1_000),
            ),
            confirmation_max_poll_interval: Duration::from_millis(
                env_config
                    .network
                    .confirmation_max_poll_interval_ms
                    .unwrap_or(30_000),
            ),
            contracts: env_config.contracts.clone(),
        })
    }

    /// Gas to request for a transaction that simulated at `gas_used`
    pub fn adjusted_gas(&self, gas_used: u64) -> u64 {
        (gas_used as f64 * self.gas_adjustment).ceil() as u64
    }

    /// Fee for `gas` units, in the native denom
    pub fn fee_for_gas(&self, gas: u64) -> u128 {
        (gas as f64 * self.gas_price).ceil() as u128
    }

    pub fn contract_address(&self, contract_type: &ContractType) -> Result<String, Error> {
        self.contracts
            .get(contract_type)
            .map(str::to_string)
            .ok_or_else(|| {
                Error::Config(format!(
                    "Contract '{}' is not configured for network '{}'",
                    contract_type, self.network_name
                ))
            })
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        let env_config = EnvironmentConfig::generate_default_config();
        Self {
            network_name: env_config.get_network_name(),
            chain_id: env_config.get_chain_id(),
            rpc_url: env_config.get_rpc_url(),
            gas_price: env_config.get_gas_price(),
            gas_adjustment: env_config.get_gas_adjustment(),
            native_denom: env_config.get_native_denom(),
            account_prefix: env_config.get_account_prefix(),
            gas_limit: env::DEFAULT_GAS_LIMIT,
            simulate_gas: true,
            broadcast_mode: BroadcastMode::Sync,
            rpc_timeout: Duration::from_secs(30),
            confirmation_poll_interval: Duration::from_secs(1),
            confirmation_max_poll_interval: Duration::from_secs(30),
            contracts: ContractAddresses::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_mode_parse() {
        assert_eq!("sync".parse::<BroadcastMode>().unwrap(), BroadcastMode::Sync);
        assert_eq!("COMMIT".parse::<BroadcastMode>().unwrap(), BroadcastMode::Commit);
        assert_eq!("block".parse::<BroadcastMode>().unwrap(), BroadcastMode::Commit);
        assert!("async".parse::<BroadcastMode>().is_err());
    }

    #[test]
    fn test_from_env_config() {
        let mut env_config = EnvironmentConfig::generate_default_config();
        env_config.network.broadcast_mode = Some("commit".to_string());
        env_config.network.confirmation_poll_interval_ms = Some(250);
        env_config.contracts.trading = Some("xion1trading".to_string());

        let config = NetworkConfig::from_env_config(&env_config).unwrap();
        assert_eq!(config.broadcast_mode, BroadcastMode::Commit);
        assert_eq!(config.confirmation_poll_interval, Duration::from_millis(250));
        assert_eq!(
            config.contract_address(&ContractType::Trading).unwrap(),
            "xion1trading"
        );
        assert!(config.contract_address(&ContractType::OrderBook).is_err());
    }

    #[test]
    fn test_gas_and_fee() {
        let config = NetworkConfig {
            gas_price: 0.001,
            gas_adjustment: 1.5,
            ..Default::default()
        };
        assert_eq!(config.adjusted_gas(100_000), 150_000);
        assert_eq!(config.adjusted_gas(3), 5);
        assert_eq!(config.fee_for_gas(150_000), 150);
        assert_eq!(config.fee_for_gas(1), 1);
    }
}
