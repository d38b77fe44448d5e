//! Settlement loop tests: claiming, partitioning, confirmation and the retry policy.

use crate::e2e::{Environment, url_a, url_b};
use alloy::primitives::{Address, U256};
use issuer::{
    config::SchedulerConfig,
    ledger::EndpointBehavior,
    types::{IssuanceStatus, IssuanceType},
};
use std::time::Duration;

const W1: Address = Address::repeat_byte(0x11);
const W2: Address = Address::repeat_byte(0x22);
const W3: Address = Address::repeat_byte(0x33);

fn config(max_batch_size: usize, max_retries: u32) -> SchedulerConfig {
    SchedulerConfig {
        max_batch_size,
        tick_interval: Duration::from_millis(10),
        queue_depth_threshold: 1000,
        max_retries,
        exhausted_tick_alert: 2,
    }
}

#[tokio::test]
async fn happy_path_first_issuance_completes() {
    let mut env = Environment::new(&[W1, W2]);

    let request = env.enqueue_first(W1).await.unwrap();
    env.tick().await;

    let settled = env.status(request.id).await;
    assert_eq!(settled.status, IssuanceStatus::Completed);
    assert!(settled.transaction_ref.is_some());
    assert!(settled.processed_at.is_some());

    let history = env.queue.history(W1).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].issuance_type, IssuanceType::First);
    assert_eq!(history[0].amount, U256::from(100));
    assert_eq!(history[0].transaction_ref, settled.transaction_ref.unwrap());

    let submissions = env.ledger.submissions();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].issuance_type, IssuanceType::First);
    assert_eq!(submissions[0].entries[0].wallet, W1);
    assert!(submissions[0].entries[0].proof.is_some());
}

#[tokio::test]
async fn batch_is_bounded_and_oldest_first() {
    let mut env = Environment::with_scheduler_config(&[W1, W2, W3], config(2, 3));

    let r1 = env.enqueue_first(W1).await.unwrap();
    let r2 = env.enqueue_first(W2).await.unwrap();
    let r3 = env.enqueue_first(W3).await.unwrap();

    env.tick().await;
    assert_eq!(env.status(r1.id).await.status, IssuanceStatus::Completed);
    assert_eq!(env.status(r2.id).await.status, IssuanceStatus::Completed);
    assert_eq!(env.status(r3.id).await.status, IssuanceStatus::Pending);
    assert_eq!(env.ledger.submissions()[0].entries.len(), 2);

    env.tick().await;
    assert_eq!(env.status(r3.id).await.status, IssuanceStatus::Completed);
}

#[tokio::test]
async fn batch_partitions_by_issuance_type() {
    let mut env = Environment::new(&[W1, W2]);
    env.seed_record(W2, IssuanceType::First, 400).await;

    let first = env.enqueue_first(W1).await.unwrap();
    let periodic = env.enqueue_periodic(W2).await.unwrap();
    env.tick().await;

    assert_eq!(env.status(first.id).await.status, IssuanceStatus::Completed);
    assert_eq!(env.status(periodic.id).await.status, IssuanceStatus::Completed);

    let submissions = env.ledger.submissions();
    assert_eq!(submissions.len(), 2);
    assert_eq!(submissions[0].issuance_type, IssuanceType::First);
    assert_eq!(submissions[1].issuance_type, IssuanceType::Periodic);
    assert!(submissions[1].entries[0].proof.is_none());

    // Distinct transaction references per partition.
    assert_ne!(submissions[0].tx_ref, submissions[1].tx_ref);
    assert_eq!(env.queue.history(W2).await.unwrap().len(), 2);
}

#[tokio::test]
async fn ledger_rejection_is_permanent() {
    let mut env = Environment::new(&[W1, W2]);
    let request = env.enqueue_first(W1).await.unwrap();

    env.ledger.set_behavior(&url_a(), EndpointBehavior::Reject("invalid proof".into()));
    env.ledger.set_behavior(&url_b(), EndpointBehavior::Reject("invalid proof".into()));
    env.tick().await;

    let failed = env.status(request.id).await;
    assert_eq!(failed.status, IssuanceStatus::Failed);
    assert_eq!(failed.retry_count, 0);
    assert!(failed.transaction_ref.is_none());
    assert!(failed.last_error.unwrap().contains("invalid proof"));
    assert!(env.queue.history(W1).await.unwrap().is_empty());

    // Terminal; later ticks leave it alone.
    env.tick().await;
    assert_eq!(env.status(request.id).await.status, IssuanceStatus::Failed);
}

#[tokio::test]
async fn transient_failure_reverts_then_succeeds() {
    let mut env = Environment::new(&[W1, W2]);
    let request = env.enqueue_first(W1).await.unwrap();

    env.ledger.set_behavior(&url_a(), EndpointBehavior::Timeout);
    env.ledger.set_behavior(&url_b(), EndpointBehavior::Timeout);
    env.tick().await;

    let reverted = env.status(request.id).await;
    assert_eq!(reverted.status, IssuanceStatus::Pending);
    assert_eq!(reverted.retry_count, 1);
    assert!(reverted.transaction_ref.is_none());

    env.ledger.set_behavior(&url_a(), EndpointBehavior::Ok);
    env.ledger.set_behavior(&url_b(), EndpointBehavior::Ok);
    env.tick().await;

    let settled = env.status(request.id).await;
    assert_eq!(settled.status, IssuanceStatus::Completed);
    assert_eq!(settled.retry_count, 1);
}

#[tokio::test]
async fn retries_exhausted_fails_the_request() {
    let mut env = Environment::with_scheduler_config(&[W1, W2], config(10, 1));
    let request = env.enqueue_first(W1).await.unwrap();

    env.ledger.set_behavior(&url_a(), EndpointBehavior::Timeout);
    env.ledger.set_behavior(&url_b(), EndpointBehavior::Timeout);

    env.tick().await;
    assert_eq!(env.status(request.id).await.retry_count, 1);

    env.tick().await;
    let failed = env.status(request.id).await;
    assert_eq!(failed.status, IssuanceStatus::Failed);
    assert!(failed.last_error.unwrap().contains("retries exhausted"));
}

#[tokio::test(start_paused = true)]
async fn deferred_confirmation_completes_on_a_later_tick() {
    let mut env = Environment::new(&[W1, W2]);
    let request = env.enqueue_first(W1).await.unwrap();

    env.ledger.set_auto_confirm(false);
    env.tick().await;

    let submitted = env.status(request.id).await;
    assert_eq!(submitted.status, IssuanceStatus::Submitted);
    let tx_ref = submitted.transaction_ref.unwrap();
    assert!(env.queue.history(W1).await.unwrap().is_empty());

    env.ledger.confirm(tx_ref);
    env.tick().await;

    assert_eq!(env.status(request.id).await.status, IssuanceStatus::Completed);
    assert_eq!(env.queue.history(W1).await.unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn revert_after_submission_fails_the_request() {
    let mut env = Environment::new(&[W1, W2]);
    let request = env.enqueue_first(W1).await.unwrap();

    env.ledger.set_auto_confirm(false);
    env.tick().await;
    let tx_ref = env.status(request.id).await.transaction_ref.unwrap();

    env.ledger.revert(tx_ref, "duplicate issuance");
    env.tick().await;

    let failed = env.status(request.id).await;
    assert_eq!(failed.status, IssuanceStatus::Failed);
    assert!(failed.transaction_ref.is_none());
    assert!(failed.last_error.unwrap().contains("duplicate issuance"));
    assert!(env.queue.history(W1).await.unwrap().is_empty());
}

#[tokio::test]
async fn empty_queue_tick_is_a_noop() {
    let mut env = Environment::new(&[W1, W2]);
    env.tick().await;
    assert!(env.ledger.submissions().is_empty());
}
