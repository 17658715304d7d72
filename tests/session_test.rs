mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{client_with, MockChain, Reply, Simulation, CHAIN_ID, MNEMONIC, SEND_TYPE_URL, TRADING};
use dexter_sdk::{
    BroadcastMode, Coin, CredentialSource, DexterWallet, Error, ExecuteMsg, Uint128,
    WalletSession,
};
use serde::{Deserialize, Serialize};

fn swap_msg() -> serde_json::Value {
    serde_json::to_value(ExecuteMsg::Swap {
        from: "uxion".to_string(),
        to: "uusdc".to_string(),
        amount: Uint128::new(100),
        max_spread: None,
    })
    .unwrap()
}

fn session(chain: &Arc<MockChain>, mode: BroadcastMode) -> WalletSession {
    WalletSession::new(chain.clone(), common::test_config(mode))
}

#[tokio::test]
async fn test_execute_without_connect_is_not_connected() {
    let chain = MockChain::new();
    let client = client_with(chain.clone(), BroadcastMode::Commit);

    let err = client
        .session()
        .execute(TRADING, &swap_msg(), &[])
        .await
        .unwrap_err();

    assert!(matches!(err, Error::NotConnected));
    assert!(client.store().is_empty());
    assert!(chain.sent().is_empty());
}

#[tokio::test]
async fn test_disconnect_is_idempotent() {
    let chain = MockChain::new();
    let session = session(&chain, BroadcastMode::Commit);

    session.disconnect();
    session.disconnect();
    assert!(session.current_account().is_none());

    session.connect(CredentialSource::mnemonic(MNEMONIC)).await.unwrap();
    session.disconnect();
    session.disconnect();
    assert!(!session.is_connected());
}

#[tokio::test]
async fn test_connect_sets_account_and_disconnect_clears_it() {
    let chain = MockChain::new();
    let session = session(&chain, BroadcastMode::Commit);

    let account = session
        .connect(CredentialSource::mnemonic(MNEMONIC))
        .await
        .unwrap();
    assert!(account.address.starts_with("xion1"));
    assert_eq!(account.public_key.len(), 66);
    assert_eq!(session.current_account(), Some(account));

    session.disconnect();
    assert_eq!(session.current_account(), None);

    let err = session.execute(TRADING, &swap_msg(), &[]).await.unwrap_err();
    assert!(matches!(err, Error::NotConnected));
}

#[tokio::test]
async fn test_reconnect_with_other_index_replaces_account() {
    let chain = MockChain::new();
    let session = session(&chain, BroadcastMode::Commit);

    let first = session
        .connect(CredentialSource::mnemonic(MNEMONIC))
        .await
        .unwrap();
    let second = session
        .connect(CredentialSource::mnemonic_with_index(MNEMONIC, 1))
        .await
        .unwrap();

    assert_ne!(first.address, second.address);
    assert_eq!(session.current_account(), Some(second));
}

#[tokio::test]
async fn test_connect_rejects_bad_credentials() {
    let chain = MockChain::new();
    let session = session(&chain, BroadcastMode::Commit);

    let err = session
        .connect(CredentialSource::mnemonic("definitely not a mnemonic"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Authentication(_)));

    let err = session
        .connect(CredentialSource::private_key_hex("1234"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Authentication(_)));
    assert!(!session.is_connected());
}

#[tokio::test]
async fn test_connect_rejects_unreachable_endpoint() {
    let chain = MockChain::new();
    chain.set_reachable(false);
    let session = session(&chain, BroadcastMode::Commit);

    let err = session
        .connect(CredentialSource::mnemonic(MNEMONIC))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Authentication(reason) if reason.contains("unreachable")));
    assert!(!session.is_connected());
}

#[tokio::test]
async fn test_connect_rejects_other_chain() {
    let chain = MockChain::with_chain_id("xion-mainnet-1");
    let session = session(&chain, BroadcastMode::Commit);

    let err = session
        .connect(CredentialSource::mnemonic(MNEMONIC))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Authentication(reason) if reason.contains(CHAIN_ID)));
}

#[tokio::test]
async fn test_execute_signs_and_returns_confirmation() {
    let chain = MockChain::new();
    let session = session(&chain, BroadcastMode::Commit);
    let account = session
        .connect(CredentialSource::mnemonic(MNEMONIC))
        .await
        .unwrap();

    let confirmation = session
        .execute(TRADING, &swap_msg(), &[Coin::new(100u128, "uxion")])
        .await
        .unwrap();
    assert_eq!(confirmation.tx_hash, "0xabc");

    let sent = chain.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].sequence, 7);
    assert_eq!(sent[0].contract, TRADING);
    assert_eq!(sent[0].msg, swap_msg());
    assert_eq!(sent[0].funds, vec![("uxion".to_string(), "100".to_string())]);
    assert!(account.address.starts_with("xion1"));
}

#[tokio::test]
async fn test_execute_wraps_rejection_without_retry() {
    let chain = MockChain::new();
    chain.push_reply(Reply::Reject("insufficient funds".to_string()));
    let session = session(&chain, BroadcastMode::Commit);
    session.connect(CredentialSource::mnemonic(MNEMONIC)).await.unwrap();

    let err = session.execute(TRADING, &swap_msg(), &[]).await.unwrap_err();
    assert!(matches!(err, Error::Execution { reason } if reason == "insufficient funds"));
    assert_eq!(chain.sent().len(), 1);
}

#[tokio::test]
async fn test_sequences_advance_and_reset_after_rejection() {
    let chain = MockChain::new();
    // Accepted txs stay in the mempool, so the chain keeps reporting sequence 7
    chain.set_default_reply(Reply::Accept("0xsync".to_string()));
    let session = session(&chain, BroadcastMode::Sync);
    session.connect(CredentialSource::mnemonic(MNEMONIC)).await.unwrap();

    session.broadcast(TRADING, &swap_msg(), &[]).await.unwrap();
    session.broadcast(TRADING, &swap_msg(), &[]).await.unwrap();
    assert_eq!(chain.account_lookups(), 1);

    chain.push_reply(Reply::Reject("account sequence mismatch".to_string()));
    assert!(session.broadcast(TRADING, &swap_msg(), &[]).await.is_err());

    session.broadcast(TRADING, &swap_msg(), &[]).await.unwrap();
    assert_eq!(chain.account_lookups(), 2);

    let sequences: Vec<u64> = chain.sent().iter().map(|tx| tx.sequence).collect();
    assert_eq!(sequences, vec![7, 8, 9, 7]);
}

#[tokio::test]
async fn test_reconnect_refetches_sequence() {
    let chain = MockChain::new();
    chain.set_default_reply(Reply::Accept("0xsync".to_string()));
    let session = session(&chain, BroadcastMode::Sync);

    session.connect(CredentialSource::mnemonic(MNEMONIC)).await.unwrap();
    session.broadcast(TRADING, &swap_msg(), &[]).await.unwrap();
    session.connect(CredentialSource::mnemonic_with_index(MNEMONIC, 1)).await.unwrap();
    session.broadcast(TRADING, &swap_msg(), &[]).await.unwrap();

    assert_eq!(chain.account_lookups(), 2);
}

#[tokio::test]
async fn test_sync_execute_polls_until_included() {
    let chain = MockChain::new();
    chain.set_default_reply(Reply::Accept("0xsync".to_string()));
    chain.set_pending_lookups(3);
    let session = session(&chain, BroadcastMode::Sync);
    session.connect(CredentialSource::mnemonic(MNEMONIC)).await.unwrap();

    let confirmation = session.execute(TRADING, &swap_msg(), &[]).await.unwrap();
    assert_eq!(confirmation.tx_hash, "0xsync");
    assert_eq!(confirmation.height, 102);
}

#[tokio::test]
async fn test_slow_inclusion_is_still_confirmed() {
    let chain = MockChain::new();
    chain.set_default_reply(Reply::Accept("0xslow".to_string()));
    chain.set_pending_lookups(25);
    let session = session(&chain, BroadcastMode::Sync);
    session.connect(CredentialSource::mnemonic(MNEMONIC)).await.unwrap();

    let confirmation = session.execute(TRADING, &swap_msg(), &[]).await.unwrap();
    assert_eq!(confirmation.tx_hash, "0xslow");
    assert_eq!(chain.tx_lookups(), 26);
}

#[tokio::test]
async fn test_confirmation_wait_is_bounded_only_by_caller() {
    let chain = MockChain::new();
    chain.set_default_reply(Reply::Accept("0xstuck".to_string()));
    chain.set_pending_lookups(usize::MAX);
    let session = session(&chain, BroadcastMode::Sync);
    session.connect(CredentialSource::mnemonic(MNEMONIC)).await.unwrap();

    let waited =
        tokio::time::timeout(Duration::from_millis(200), session.await_confirmation("0xstuck")).await;
    assert!(waited.is_err());
    assert!(chain.tx_lookups() > 1);
}

#[tokio::test]
async fn test_gas_is_sized_from_simulation() {
    let chain = MockChain::new();
    chain.set_simulation(Simulation::Gas(100_000));
    let session = session(&chain, BroadcastMode::Commit);
    session.connect(CredentialSource::mnemonic(MNEMONIC)).await.unwrap();

    session.execute(TRADING, &swap_msg(), &[]).await.unwrap();

    // Default gas adjustment is 1.4
    assert_eq!(chain.simulations(), 1);
    assert_eq!(chain.sent()[0].gas_limit, 140_000);
}

#[tokio::test]
async fn test_gas_falls_back_to_limit_without_simulation() {
    let chain = MockChain::new();
    chain.set_simulation(Simulation::Unavailable);
    let session = session(&chain, BroadcastMode::Commit);
    session.connect(CredentialSource::mnemonic(MNEMONIC)).await.unwrap();

    session.execute(TRADING, &swap_msg(), &[]).await.unwrap();
    assert_eq!(chain.sent()[0].gas_limit, session.config().gas_limit);

    let mut config = common::test_config(BroadcastMode::Commit);
    config.simulate_gas = false;
    config.gas_limit = 300_000;
    let chain = MockChain::new();
    let session = WalletSession::new(chain.clone(), config);
    session.connect(CredentialSource::mnemonic(MNEMONIC)).await.unwrap();

    session.execute(TRADING, &swap_msg(), &[]).await.unwrap();
    assert_eq!(chain.simulations(), 0);
    assert_eq!(chain.sent()[0].gas_limit, 300_000);
}

#[tokio::test]
async fn test_rejected_simulation_fails_before_broadcast() {
    let chain = MockChain::new();
    chain.set_simulation(Simulation::Reject("pool not found".to_string()));
    let session = session(&chain, BroadcastMode::Commit);
    session.connect(CredentialSource::mnemonic(MNEMONIC)).await.unwrap();

    let err = session.execute(TRADING, &swap_msg(), &[]).await.unwrap_err();
    assert!(matches!(err, Error::Execution { reason } if reason == "pool not found"));
    assert!(chain.sent().is_empty());
}

#[tokio::test]
async fn test_gas_above_limit_is_rejected() {
    let mut config = common::test_config(BroadcastMode::Commit);
    config.gas_limit = 120_000;
    let chain = MockChain::new();
    chain.set_simulation(Simulation::Gas(100_000));
    let session = WalletSession::new(chain.clone(), config);
    session.connect(CredentialSource::mnemonic(MNEMONIC)).await.unwrap();

    let err = session.execute(TRADING, &swap_msg(), &[]).await.unwrap_err();
    assert!(matches!(err, Error::Execution { reason } if reason.contains("140000")));
    assert!(chain.sent().is_empty());
}

#[tokio::test]
async fn test_estimate_gas_does_not_broadcast() {
    let chain = MockChain::new();
    chain.set_simulation(Simulation::Gas(50_000));
    let session = session(&chain, BroadcastMode::Commit);

    let err = session.estimate_gas(TRADING, &swap_msg(), &[]).await.unwrap_err();
    assert!(matches!(err, Error::NotConnected));

    session.connect(CredentialSource::mnemonic(MNEMONIC)).await.unwrap();
    let gas = session.estimate_gas(TRADING, &swap_msg(), &[]).await.unwrap();
    assert_eq!(gas, 70_000);
    assert_eq!(chain.simulations(), 1);
    assert!(chain.sent().is_empty());

    chain.set_simulation(Simulation::Unavailable);
    assert!(session.estimate_gas(TRADING, &swap_msg(), &[]).await.is_err());
}

#[tokio::test]
async fn test_transfer_sends_bank_message() {
    let chain = MockChain::new();
    let session = session(&chain, BroadcastMode::Commit);
    let recipient = DexterWallet::from_mnemonic(MNEMONIC, 3, "xion")
        .unwrap()
        .info()
        .unwrap()
        .address;

    let err = session
        .transfer(&recipient, &[Coin::new(10u128, "uxion")])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotConnected));

    session.connect(CredentialSource::mnemonic(MNEMONIC)).await.unwrap();
    let confirmation = session
        .transfer(&recipient, &[Coin::new(2_500u128, "uxion")])
        .await
        .unwrap();
    assert_eq!(confirmation.tx_hash, "0xabc");

    let sent = chain.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].type_url, SEND_TYPE_URL);
    assert_eq!(sent[0].contract, recipient);
    assert_eq!(sent[0].funds, vec![("uxion".to_string(), "2500".to_string())]);
}

#[tokio::test]
async fn test_transfer_rejects_foreign_recipient() {
    let chain = MockChain::new();
    let session = session(&chain, BroadcastMode::Commit);
    session.connect(CredentialSource::mnemonic(MNEMONIC)).await.unwrap();
    let foreign = DexterWallet::from_mnemonic(MNEMONIC, 0, "osmo")
        .unwrap()
        .info()
        .unwrap()
        .address;

    let err = session
        .transfer(&foreign, &[Coin::new(10u128, "uxion")])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Execution { .. }));
    assert!(chain.sent().is_empty());
}

#[tokio::test]
async fn test_balances_require_connection() {
    let chain = MockChain::new();
    chain.set_balances(vec![Coin::new(5_000u128, "uxion")]);
    let session = session(&chain, BroadcastMode::Commit);

    assert!(matches!(session.balances().await, Err(Error::NotConnected)));

    session.connect(CredentialSource::mnemonic(MNEMONIC)).await.unwrap();
    let balances = session.balances().await.unwrap();
    assert_eq!(balances, vec![Coin::new(5_000u128, "uxion")]);
}

#[derive(Serialize)]
#[serde(rename_all = "snake_case")]
enum PoolQuery {
    Pool { pool_identifier: String },
}

#[derive(Debug, Deserialize, PartialEq)]
struct PoolResponse {
    total_share: Uint128,
}

#[tokio::test]
async fn test_query_does_not_need_connection() {
    let chain = MockChain::new();
    chain.set_query_response(serde_json::json!({ "total_share": "1000" }));
    let session = session(&chain, BroadcastMode::Commit);

    let response: PoolResponse = session
        .query(
            common::LIQUIDITY_POOL,
            &PoolQuery::Pool {
                pool_identifier: "o.uxion.uusdc".to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!(response.total_share, Uint128::new(1000));
}
