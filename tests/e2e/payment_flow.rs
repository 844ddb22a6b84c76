//! Manual payment flow against a scripted ledger.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::harness::{TestHarness, OTHER_SIG, SIG};
use payguard::config::GatewayConfig;
use payguard::error::{FlowError, VerificationError};
use payguard::payment::{FlowStep, VerificationOutcome, VerificationStatus};
use payguard::{GatewayEvent, Lamports, PaymentPurpose};
use std::time::Duration;

fn quarter_sol() -> Lamports {
    Lamports::from_sol(0.25).unwrap()
}

/// Harness with a tolerance of 0.00025 SOL.
fn tight_harness() -> TestHarness {
    let mut config = GatewayConfig::default();
    config.verifier.tolerance_lamports = 250_000;
    TestHarness::setup_with_config(config).expect("harness")
}

/// Test 1: A payment within tolerance completes the flow.
#[tokio::test]
async fn test_payment_within_tolerance_succeeds() {
    let mut harness = tight_harness();
    harness
        .ledger()
        .record_payment(SIG, Lamports::from_sol(0.250_249).unwrap());

    let flow = harness.gateway().open_payment(quarter_sol(), PaymentPurpose::Token);
    let request_id = flow.request().unwrap().id();
    flow.proceed().unwrap();

    let outcome = flow.submit_signature(SIG).await.unwrap();
    assert!(matches!(
        outcome,
        VerificationOutcome::Verified { account_index: 1, .. }
    ));
    assert_eq!(flow.step(), FlowStep::Succeeded);
    assert_eq!(
        harness.drain_events(),
        vec![GatewayEvent::PaymentSucceeded {
            request_id,
            purpose: PaymentPurpose::Token,
        }]
    );
}

/// Test 2: A payment outside tolerance is rejected and the user may retry.
#[tokio::test]
async fn test_payment_outside_tolerance_is_mismatch() {
    let mut harness = tight_harness();
    harness
        .ledger()
        .record_payment(SIG, Lamports::from_sol(0.2505).unwrap());
    harness.ledger().record_payment(OTHER_SIG, quarter_sol());

    let flow = harness.gateway().open_payment(quarter_sol(), PaymentPurpose::Token);
    flow.proceed().unwrap();

    let err = flow.submit_signature(SIG).await.unwrap_err();
    assert_eq!(
        err,
        FlowError::Verification(VerificationError::AmountMismatch)
    );
    assert_eq!(flow.step(), FlowStep::AwaitingSignature);
    assert_eq!(
        flow.snapshot().attempt.unwrap().status,
        VerificationStatus::AmountMismatch
    );
    assert!(harness.drain_events().is_empty());

    flow.submit_signature(OTHER_SIG).await.unwrap();
    assert_eq!(flow.step(), FlowStep::Succeeded);
}

/// Test 3: Malformed signatures never reach the ledger.
#[tokio::test]
async fn test_short_signature_skips_ledger() {
    let harness = TestHarness::setup().unwrap();
    let flow = harness.gateway().open_payment(quarter_sol(), PaymentPurpose::Token);
    flow.proceed().unwrap();

    let err = flow.submit_signature(&"A".repeat(70)).await.unwrap_err();
    assert_eq!(err, FlowError::Verification(VerificationError::FormatInvalid));
    assert_eq!(harness.ledger().lookups(), 0);

    let err = flow.submit_signature(SIG).await.unwrap_err();
    assert_eq!(err, FlowError::Verification(VerificationError::NotFound));
    assert_eq!(harness.ledger().lookups(), 1);
}

/// Test 4: Bypass signatures succeed without a lookup.
#[tokio::test]
async fn test_bypass_signature() {
    let harness = TestHarness::setup().unwrap();
    let flow = harness.gateway().open_payment(quarter_sol(), PaymentPurpose::Token);
    flow.proceed().unwrap();

    assert_eq!(
        flow.submit_signature("1337").await.unwrap(),
        VerificationOutcome::Bypassed
    );
    assert_eq!(harness.ledger().lookups(), 0);
}

/// Test 5: A failed transaction is not accepted.
#[tokio::test]
async fn test_failed_transaction_rejected() {
    let harness = TestHarness::setup().unwrap();
    harness.ledger().record_failed(SIG, quarter_sol());

    let flow = harness.gateway().open_payment(quarter_sol(), PaymentPurpose::Token);
    flow.proceed().unwrap();
    assert_eq!(
        flow.submit_signature(SIG).await.unwrap_err(),
        FlowError::Verification(VerificationError::Failed)
    );
}

/// Test 6: The countdown expires an unpaid request exactly once.
#[tokio::test(start_paused = true)]
async fn test_unpaid_request_expires() {
    let mut harness = TestHarness::setup().unwrap();
    harness.ledger().record_payment(SIG, quarter_sol());

    let flow = harness.gateway().open_payment(quarter_sol(), PaymentPurpose::Token);
    let request_id = flow.request().unwrap().id();
    flow.proceed().unwrap();

    tokio::time::sleep(Duration::from_secs(899) + Duration::from_millis(500)).await;
    assert_eq!(flow.step(), FlowStep::AwaitingSignature);
    assert_eq!(flow.formatted_remaining(), "00:01");

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(flow.step(), FlowStep::Expired);
    assert!(matches!(
        flow.submit_signature(SIG).await,
        Err(FlowError::Closed(_))
    ));
    assert_eq!(
        harness.drain_events(),
        vec![GatewayEvent::PaymentExpired { request_id }]
    );
}

/// Test 7: Reopening after expiry issues a fresh request that can be paid.
#[tokio::test(start_paused = true)]
async fn test_reopen_after_expiry() {
    let mut harness = TestHarness::setup().unwrap();
    harness.ledger().record_payment(SIG, quarter_sol());

    let flow = harness.gateway().open_payment(quarter_sol(), PaymentPurpose::Token);
    let first = flow.request().unwrap().id();
    tokio::time::sleep(Duration::from_secs(901)).await;
    assert_eq!(flow.step(), FlowStep::Expired);

    let second = flow.reopen().unwrap();
    assert_ne!(first, second);
    assert_eq!(flow.remaining_secs(), 900);

    tokio::time::sleep(Duration::from_millis(3_500)).await;
    assert_eq!(flow.remaining_secs(), 897);

    flow.proceed().unwrap();
    flow.submit_signature(SIG).await.unwrap();

    let events = harness.drain_events();
    assert_eq!(
        events,
        vec![
            GatewayEvent::PaymentExpired { request_id: first },
            GatewayEvent::PaymentSucceeded {
                request_id: second,
                purpose: PaymentPurpose::Token,
            },
        ]
    );
}

/// Test 8: Cancelling emits a single event and closes the flow.
#[tokio::test]
async fn test_cancel_closes_flow() {
    let mut harness = TestHarness::setup().unwrap();
    let flow = harness.gateway().open_payment(quarter_sol(), PaymentPurpose::Token);
    let request_id = flow.request().unwrap().id();

    assert!(flow.cancel());
    assert_eq!(flow.step(), FlowStep::Cancelled);
    assert!(matches!(flow.proceed(), Err(FlowError::Closed(_))));
    assert_eq!(
        harness.drain_events(),
        vec![GatewayEvent::PaymentCancelled { request_id }]
    );
}
