//! Intake rejection and invariant tests.

use crate::e2e::{Environment, device, user};
use alloy::primitives::Address;
use issuer::{
    error::IntakeError,
    storage::StorageApi,
    types::{IssuanceStatus, IssuanceType, RequestId},
};

const W1: Address = Address::repeat_byte(0x11);
const W2: Address = Address::repeat_byte(0x22);

#[tokio::test]
async fn first_enqueue_is_pending() {
    let env = Environment::new(&[W1, W2]);

    let request = env.enqueue_first(W1).await.unwrap();
    assert_eq!(request.status, IssuanceStatus::Pending);
    assert_eq!(request.retry_count, 0);
    assert!(request.transaction_ref.is_none());
    assert!(request.proof.is_some());

    let snapshot = env.status(request.id).await;
    assert_eq!(snapshot.status, IssuanceStatus::Pending);
    assert_eq!(snapshot.wallet, W1);
}

#[tokio::test]
async fn duplicate_enqueue_is_rejected_in_flight() {
    let env = Environment::new(&[W1, W2]);

    let first = env.enqueue_first(W1).await.unwrap();
    let err = env.enqueue_first(W1).await.unwrap_err();
    assert!(matches!(err, IntakeError::AlreadyInFlight));

    // The losing call created nothing; only the original request exists.
    assert_eq!(env.status(first.id).await.status, IssuanceStatus::Pending);
}

#[tokio::test]
async fn concurrent_enqueues_have_a_single_winner() {
    let env = Environment::new(&[W1, W2]);

    let (a, b) = tokio::join!(env.enqueue_first(W1), env.enqueue_first(W1));
    let accepted = [a.is_ok(), b.is_ok()].into_iter().filter(|ok| *ok).count();
    assert_eq!(accepted, 1);
}

#[tokio::test]
async fn unbound_device_is_rejected() {
    let env = Environment::new(&[W1, W2]);

    let err = env
        .queue
        .enqueue_first(W1, user(W1), "someone-elses-device".into(), env.tree.proof(W1))
        .await
        .unwrap_err();
    assert!(matches!(err, IntakeError::DeviceMismatch));
}

#[tokio::test]
async fn wrong_proof_is_rejected() {
    let env = Environment::new(&[W1, W2]);

    let err = env
        .queue
        .enqueue_first(W1, user(W1), device(W1), env.tree.proof(W2))
        .await
        .unwrap_err();
    assert!(matches!(err, IntakeError::NotEligible));
}

#[tokio::test]
async fn settled_first_issuance_is_rejected_as_already_issued() {
    let env = Environment::new(&[W1, W2]);
    env.seed_record(W1, IssuanceType::First, 10).await;

    let err = env.enqueue_first(W1).await.unwrap_err();
    assert!(matches!(err, IntakeError::AlreadyIssued));
}

#[tokio::test]
async fn periodic_without_first_is_rejected() {
    let env = Environment::new(&[W1, W2]);

    let err = env.enqueue_periodic(W1).await.unwrap_err();
    assert!(matches!(err, IntakeError::NotEligible));
}

#[tokio::test]
async fn periodic_inside_window_is_rejected() {
    let env = Environment::new(&[W1, W2]);
    env.seed_record(W1, IssuanceType::First, 500).await;
    env.seed_record(W1, IssuanceType::Periodic, 100).await;

    let err = env.enqueue_periodic(W1).await.unwrap_err();
    assert!(matches!(err, IntakeError::NotEligible));
}

#[tokio::test]
async fn periodic_at_window_boundary_is_accepted() {
    let env = Environment::new(&[W1, W2]);
    env.seed_record(W1, IssuanceType::First, 800).await;
    env.seed_record(W1, IssuanceType::Periodic, 365).await;

    let request = env.enqueue_periodic(W1).await.unwrap();
    assert_eq!(request.issuance_type, IssuanceType::Periodic);
    assert!(request.proof.is_none());
}

#[tokio::test]
async fn periodic_allowed_once_first_settled() {
    let env = Environment::new(&[W1, W2]);
    env.seed_record(W1, IssuanceType::First, 10).await;

    // The periodic window is measured from the most recent periodic record only; with none, a
    // settled first issuance alone qualifies the wallet.
    let request = env.enqueue_periodic(W1).await.unwrap();
    assert_eq!(request.status, IssuanceStatus::Pending);
}

#[tokio::test]
async fn cancel_pending_request() {
    let env = Environment::new(&[W1, W2]);

    let request = env.enqueue_first(W1).await.unwrap();
    assert!(env.queue.cancel(request.id, &user(W1)).await.unwrap());
    assert_eq!(env.status(request.id).await.status, IssuanceStatus::Cancelled);

    // The terminal request frees the in-flight slot.
    env.enqueue_first(W1).await.unwrap();
}

#[tokio::test]
async fn cancel_unknown_request_is_an_error() {
    let env = Environment::new(&[W1, W2]);

    let err = env.queue.cancel(RequestId::default(), &user(W1)).await.unwrap_err();
    assert!(matches!(err, IntakeError::UnknownRequest(_)));
}

#[tokio::test]
async fn cancel_after_claim_is_a_noop() {
    let env = Environment::new(&[W1, W2]);
    let request = env.enqueue_first(W1).await.unwrap();

    env.storage.claim_batch(1).await.unwrap();

    assert!(!env.queue.cancel(request.id, &user(W1)).await.unwrap());
    assert_eq!(env.status(request.id).await.status, IssuanceStatus::InBatch);
}
