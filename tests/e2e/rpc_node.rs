//! JSON-RPC ledger client against an in-process node.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use super::harness::{MockRpcNode, OTHER_SIG, SIG};
use payguard::config::{GatewayConfig, RpcConfig};
use payguard::error::{Error, VerificationError};
use payguard::ledger::{Lamports, LedgerClient, LedgerError, RpcLedgerClient};
use payguard::payment::VerificationOutcome;
use payguard::GatewayBuilder;
use serde_json::{json, Value};
use std::collections::HashMap;

fn transactions() -> HashMap<String, Value> {
    let mut map = HashMap::new();
    map.insert(
        SIG.to_string(),
        json!({
            "slot": 312_000_001_u64,
            "blockTime": 1_700_000_000_u64,
            "meta": {
                "err": null,
                "fee": 5000,
                "preBalances": [2_000_000_000_u64, 0, 1],
                "postBalances": [1_749_995_000_u64, 250_000_000_u64, 1],
                "loadedAddresses": {"writable": [], "readonly": []}
            },
            "transaction": {
                "signatures": [SIG],
                "message": {"accountKeys": ["Payer", "Recipient", "11111111111111111111111111111111"]}
            },
            "version": 0
        }),
    );
    map.insert(
        OTHER_SIG.to_string(),
        json!({
            "slot": 312_000_002_u64,
            "meta": {
                "err": {"InstructionError": [0, {"Custom": 1}]},
                "preBalances": [2_000_000_000_u64, 0],
                "postBalances": [1_999_995_000_u64, 0]
            },
            "transaction": {"message": {"accountKeys": ["Payer", "Recipient"]}}
        }),
    );
    map
}

fn rpc_config(url: String) -> RpcConfig {
    RpcConfig {
        url,
        timeout_secs: 5,
        ..RpcConfig::default()
    }
}

/// Test 1: The client projects a real-shaped response.
#[tokio::test]
async fn test_client_reads_transaction() {
    let node = MockRpcNode::start(transactions()).await.unwrap();
    let client = RpcLedgerClient::new(&rpc_config(node.url())).unwrap();

    let view = client.get_transaction(SIG).await.unwrap().expect("found");
    assert_eq!(view.slot, Some(312_000_001));
    assert!(!view.error_present);
    assert_eq!(view.balance_deltas[1].account.as_deref(), Some("Recipient"));
    assert_eq!(view.balance_deltas[1].received(), Some(Lamports(250_000_000)));

    let failed = client.get_transaction(OTHER_SIG).await.unwrap().expect("found");
    assert!(failed.error_present);

    assert!(client.get_transaction("unknown").await.unwrap().is_none());
}

/// Test 2: Gateway verification over HTTP.
#[tokio::test]
async fn test_gateway_verifies_over_http() {
    let node = MockRpcNode::start(transactions()).await.unwrap();
    let mut config = GatewayConfig::default();
    config.rpc = rpc_config(node.url());
    let gateway = GatewayBuilder::new(config).build().unwrap();

    let outcome = gateway
        .verify_signature(SIG, Lamports(250_000_000))
        .await
        .unwrap();
    assert!(matches!(outcome, VerificationOutcome::Verified { account_index: 1, .. }));

    let err = gateway
        .verify_signature(OTHER_SIG, Lamports(250_000_000))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Verification(VerificationError::Failed)));
}

/// Test 3: An unreachable node surfaces as a retryable network failure.
#[tokio::test]
async fn test_unreachable_node() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let client = RpcLedgerClient::new(&rpc_config(url.clone())).unwrap();
    assert!(matches!(
        client.get_transaction(SIG).await,
        Err(LedgerError::Transport(_) | LedgerError::Timeout)
    ));

    let mut config = GatewayConfig::default();
    config.rpc = rpc_config(url);
    let gateway = GatewayBuilder::new(config).build().unwrap();
    match gateway.verify_signature(SIG, Lamports(1)).await {
        Err(Error::Verification(e)) => {
            assert!(matches!(e, VerificationError::Network(_)));
            assert!(e.is_retryable());
        }
        other => panic!("expected network failure, got {other:?}"),
    }
}
