//! User intents and the contract messages they serialize into
//!
//! An [`Intent`] is one user-initiated on-chain action. Its payload is a tagged
//! union whose variants are validated when they are built, so an intent that
//! reaches the submitter is always well-formed.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use cosmwasm_std::{Coin, Decimal, Uint128};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{ContractAddresses, ContractType};
use crate::error::Error;

/// Client-generated intent identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IntentId(Uuid);

impl IntentId {
    /// Generate a fresh random id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for IntentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for IntentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for IntentId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| Error::InvalidIntent(format!("Invalid intent id '{}': {}", s, e)))
    }
}

/// Kind of on-chain action an intent performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    Swap,
    AddLiquidity,
    RemoveLiquidity,
}

impl fmt::Display for IntentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntentKind::Swap => write!(f, "swap"),
            IntentKind::AddLiquidity => write!(f, "add_liquidity"),
            IntentKind::RemoveLiquidity => write!(f, "remove_liquidity"),
        }
    }
}

/// Swap `amount` of `from` into `to`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwapPayload {
    from: String,
    to: String,
    amount: Uint128,
    max_spread: Option<Decimal>,
}

impl SwapPayload {
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        amount: impl Into<Uint128>,
        max_spread: Option<Decimal>,
    ) -> Result<Self, Error> {
        let from = from.into();
        let to = to.into();
        let amount = amount.into();

        require_denom("from", &from)?;
        require_denom("to", &to)?;
        if from == to {
            return Err(Error::InvalidIntent(format!(
                "Cannot swap '{}' into itself",
                from
            )));
        }
        require_positive("amount", amount)?;
        if let Some(spread) = max_spread {
            if spread >= Decimal::one() {
                return Err(Error::InvalidIntent(format!(
                    "Max spread must be below 1, got {}",
                    spread
                )));
            }
        }

        Ok(Self {
            from,
            to,
            amount,
            max_spread,
        })
    }

    pub fn from(&self) -> &str {
        &self.from
    }

    pub fn to(&self) -> &str {
        &self.to
    }

    pub fn amount(&self) -> Uint128 {
        self.amount
    }

    pub fn max_spread(&self) -> Option<Decimal> {
        self.max_spread
    }
}

/// Deposit `assets` into pool `pool_id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddLiquidityPayload {
    pool_id: String,
    assets: Vec<Coin>,
    slippage_tolerance: Option<Decimal>,
}

impl AddLiquidityPayload {
    pub fn new(
        pool_id: impl Into<String>,
        assets: Vec<Coin>,
        slippage_tolerance: Option<Decimal>,
    ) -> Result<Self, Error> {
        let pool_id = pool_id.into();
        require_pool(&pool_id)?;

        if assets.is_empty() {
            return Err(Error::InvalidIntent(
                "At least one asset is required to add liquidity".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for asset in &assets {
            require_denom("asset", &asset.denom)?;
            require_positive(&asset.denom, asset.amount)?;
            if !seen.insert(asset.denom.as_str()) {
                return Err(Error::InvalidIntent(format!(
                    "Asset '{}' listed more than once",
                    asset.denom
                )));
            }
        }

        if let Some(tolerance) = slippage_tolerance {
            if tolerance >= Decimal::one() {
                return Err(Error::InvalidIntent(format!(
                    "Slippage tolerance must be below 1, got {}",
                    tolerance
                )));
            }
        }

        // Bank coins travel sorted by denom
        let mut assets = assets;
        assets.sort_by(|a, b| a.denom.cmp(&b.denom));

        Ok(Self {
            pool_id,
            assets,
            slippage_tolerance,
        })
    }

    pub fn pool_id(&self) -> &str {
        &self.pool_id
    }

    pub fn assets(&self) -> &[Coin] {
        &self.assets
    }

    pub fn slippage_tolerance(&self) -> Option<Decimal> {
        self.slippage_tolerance
    }
}

/// Burn `amount` LP tokens of `lp_denom` from pool `pool_id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoveLiquidityPayload {
    pool_id: String,
    lp_denom: String,
    amount: Uint128,
}

impl RemoveLiquidityPayload {
    pub fn new(
        pool_id: impl Into<String>,
        lp_denom: impl Into<String>,
        amount: impl Into<Uint128>,
    ) -> Result<Self, Error> {
        let pool_id = pool_id.into();
        let lp_denom = lp_denom.into();
        let amount = amount.into();

        require_pool(&pool_id)?;
        require_denom("lp_denom", &lp_denom)?;
        require_positive("amount", amount)?;

        Ok(Self {
            pool_id,
            lp_denom,
            amount,
        })
    }

    pub fn pool_id(&self) -> &str {
        &self.pool_id
    }

    pub fn lp_denom(&self) -> &str {
        &self.lp_denom
    }

    pub fn amount(&self) -> Uint128 {
        self.amount
    }
}

/// Kind-specific intent payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntentPayload {
    Swap(SwapPayload),
    AddLiquidity(AddLiquidityPayload),
    RemoveLiquidity(RemoveLiquidityPayload),
}

impl IntentPayload {
    pub fn swap(
        from: impl Into<String>,
        to: impl Into<String>,
        amount: impl Into<Uint128>,
        max_spread: Option<Decimal>,
    ) -> Result<Self, Error> {
        SwapPayload::new(from, to, amount, max_spread).map(IntentPayload::Swap)
    }

    pub fn add_liquidity(
        pool_id: impl Into<String>,
        assets: Vec<Coin>,
        slippage_tolerance: Option<Decimal>,
    ) -> Result<Self, Error> {
        AddLiquidityPayload::new(pool_id, assets, slippage_tolerance)
            .map(IntentPayload::AddLiquidity)
    }

    pub fn remove_liquidity(
        pool_id: impl Into<String>,
        lp_denom: impl Into<String>,
        amount: impl Into<Uint128>,
    ) -> Result<Self, Error> {
        RemoveLiquidityPayload::new(pool_id, lp_denom, amount).map(IntentPayload::RemoveLiquidity)
    }

    pub fn kind(&self) -> IntentKind {
        match self {
            IntentPayload::Swap(_) => IntentKind::Swap,
            IntentPayload::AddLiquidity(_) => IntentKind::AddLiquidity,
            IntentPayload::RemoveLiquidity(_) => IntentKind::RemoveLiquidity,
        }
    }

    /// Contract that handles this kind of intent
    pub fn target_contract(&self) -> ContractType {
        match self {
            IntentPayload::Swap(_) => ContractType::Trading,
            IntentPayload::AddLiquidity(_) | IntentPayload::RemoveLiquidity(_) => {
                ContractType::LiquidityPool
            }
        }
    }

    /// Contract message for this payload
    pub fn execute_msg(&self) -> ExecuteMsg {
        match self {
            IntentPayload::Swap(p) => ExecuteMsg::Swap {
                from: p.from.clone(),
                to: p.to.clone(),
                amount: p.amount,
                max_spread: p.max_spread,
            },
            IntentPayload::AddLiquidity(p) => ExecuteMsg::ProvideLiquidity {
                pool_identifier: p.pool_id.clone(),
                slippage_tolerance: p.slippage_tolerance,
            },
            IntentPayload::RemoveLiquidity(p) => ExecuteMsg::WithdrawLiquidity {
                pool_identifier: p.pool_id.clone(),
            },
        }
    }

    /// Funds attached to the execution
    pub fn funds(&self) -> Vec<Coin> {
        match self {
            IntentPayload::Swap(p) => vec![Coin {
                denom: p.from.clone(),
                amount: p.amount,
            }],
            IntentPayload::AddLiquidity(p) => p.assets.clone(),
            IntentPayload::RemoveLiquidity(p) => vec![Coin {
                denom: p.lp_denom.clone(),
                amount: p.amount,
            }],
        }
    }

    /// Resolve the target contract address and build the full call
    pub fn to_contract_call(&self, contracts: &ContractAddresses) -> Result<ContractCall, Error> {
        let contract_type = self.target_contract();
        let contract = contracts.get(&contract_type).ok_or_else(|| {
            Error::Config(format!(
                "No {} contract address configured for {} intents",
                contract_type,
                self.kind()
            ))
        })?;

        Ok(ContractCall {
            contract: contract.to_string(),
            msg: serde_json::to_value(self.execute_msg())?,
            funds: self.funds(),
        })
    }
}

/// Execute messages understood by the trading and liquidity pool contracts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecuteMsg {
    Swap {
        from: String,
        to: String,
        amount: Uint128,
        #[serde(skip_serializing_if = "Option::is_none")]
        max_spread: Option<Decimal>,
    },
    ProvideLiquidity {
        pool_identifier: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        slippage_tolerance: Option<Decimal>,
    },
    WithdrawLiquidity {
        pool_identifier: String,
    },
}

/// A fully resolved contract execution
#[derive(Debug, Clone, PartialEq)]
pub struct ContractCall {
    pub contract: String,
    pub msg: serde_json::Value,
    pub funds: Vec<Coin>,
}

/// A user-initiated request to perform one on-chain action
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Intent {
    id: IntentId,
    payload: IntentPayload,
    created_at: DateTime<Utc>,
}

impl Intent {
    pub fn new(payload: IntentPayload) -> Self {
        Self {
            id: IntentId::new(),
            payload,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> IntentId {
        self.id
    }

    pub fn kind(&self) -> IntentKind {
        self.payload.kind()
    }

    pub fn payload(&self) -> &IntentPayload {
        &self.payload
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

fn require_denom(field: &str, denom: &str) -> Result<(), Error> {
    if denom.trim().is_empty() {
        return Err(Error::InvalidIntent(format!("{} denom cannot be empty", field)));
    }
    Ok(())
}

fn require_pool(pool_id: &str) -> Result<(), Error> {
    if pool_id.trim().is_empty() {
        return Err(Error::InvalidIntent("Pool id cannot be empty".to_string()));
    }
    Ok(())
}

fn require_positive(field: &str, amount: Uint128) -> Result<(), Error> {
    if amount.is_zero() {
        return Err(Error::InvalidIntent(format!(
            "{} amount must be greater than zero",
            field
        )));
    }
    Ok(())
}
