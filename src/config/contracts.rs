use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Dexter contracts an intent can be routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractType {
    /// Pool contract handling liquidity deposits and withdrawals
    LiquidityPool,
    /// Limit order book contract
    OrderBook,
    /// Trading contract handling swaps
    Trading,
}

impl ContractType {
    pub const ALL: [ContractType; 3] = [
        ContractType::LiquidityPool,
        ContractType::OrderBook,
        ContractType::Trading,
    ];
}

impl fmt::Display for ContractType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContractType::LiquidityPool => write!(f, "liquidity_pool"),
            ContractType::OrderBook => write!(f, "order_book"),
            ContractType::Trading => write!(f, "trading"),
        }
    }
}

impl FromStr for ContractType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "liquidity_pool" => Ok(ContractType::LiquidityPool),
            "order_book" => Ok(ContractType::OrderBook),
            "trading" => Ok(ContractType::Trading),
            other => Err(Error::Config(format!("Unknown contract type '{}'", other))),
        }
    }
}

/// Contract addresses for the active network
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractAddresses {
    pub liquidity_pool: Option<String>,
    pub order_book: Option<String>,
    pub trading: Option<String>,
}

impl ContractAddresses {
    pub fn get(&self, contract_type: &ContractType) -> Option<&str> {
        match contract_type {
            ContractType::LiquidityPool => self.liquidity_pool.as_deref(),
            ContractType::OrderBook => self.order_book.as_deref(),
            ContractType::Trading => self.trading.as_deref(),
        }
    }

    pub fn set(&mut self, contract_type: ContractType, address: String) {
        let slot = match contract_type {
            ContractType::LiquidityPool => &mut self.liquidity_pool,
            ContractType::OrderBook => &mut self.order_book,
            ContractType::Trading => &mut self.trading,
        };
        *slot = Some(address);
    }

    /// Fill unset addresses from `other`
    pub fn merge_missing(&mut self, other: ContractAddresses) {
        if self.liquidity_pool.is_none() {
            self.liquidity_pool = other.liquidity_pool;
        }
        if self.order_book.is_none() {
            self.order_book = other.order_book;
        }
        if self.trading.is_none() {
            self.trading = other.trading;
        }
    }

    /// Validate every configured address against the network's bech32 prefix
    pub fn validate(&self, expected_prefix: &str) -> Result<(), Error> {
        for contract_type in ContractType::ALL {
            if let Some(address) = self.get(&contract_type) {
                validate_address(&contract_type, address, expected_prefix)?;
            }
        }
        Ok(())
    }
}

/// Basic Cosmos bech32 address validation
fn validate_address(
    contract_type: &ContractType,
    address: &str,
    expected_prefix: &str,
) -> Result<(), Error> {
    if address.is_empty() {
        return Err(Error::Config(format!(
            "Contract address for '{}' cannot be empty",
            contract_type
        )));
    }

    if !address.starts_with(expected_prefix) {
        return Err(Error::Config(format!(
            "Contract address '{}' does not have expected prefix '{}'",
            address, expected_prefix
        )));
    }

    if address.len() < 39 || address.len() > 90 {
        return Err(Error::Config(format!(
            "Contract address '{}' has invalid length",
            address
        )));
    }

    Ok(())
}
