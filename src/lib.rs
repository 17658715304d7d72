pub mod chain;
pub mod client;
pub mod config;
pub mod error;
pub mod intent;
pub mod session;
pub mod status;
pub mod submitter;
pub mod wallet;

// Subscriber setup - optional via "cli" feature
#[cfg(feature = "cli")]
pub mod logging;

// Main client exports
pub use client::{DexterClient, DexterClientBuilder};
pub use config::{BroadcastMode, ContractAddresses, ContractType, NetworkConfig};
pub use error::Error;
pub use wallet::{CredentialSource, DexterWallet, WalletInfo};

// Chain access exports
pub use chain::{AccountInfo, BroadcastOutcome, ChainClient, ChainStatus, RpcChainClient, TxConfirmation};

// Intent lifecycle exports
pub use intent::{
    AddLiquidityPayload, ContractCall, ExecuteMsg, Intent, IntentId, IntentKind, IntentPayload,
    RemoveLiquidityPayload, SwapPayload,
};
pub use session::{Account, WalletSession};
pub use status::{
    IntentState, IntentStatus, StatusDetail, StatusReceiver, StatusStore, SubscriptionId,
};
pub use submitter::{IntentSubmitter, WaitOutcome};

// Re-export common types from cosmwasm-std
pub use cosmwasm_std::{Coin, Decimal, Uint128};
