//! Endpoint failover, demotion and reinstatement tests.

use crate::e2e::{Environment, NETWORK, url_a, url_b};
use alloy::primitives::Address;
use issuer::{
    config::SchedulerConfig,
    endpoints::spawn_reinstatement_probe,
    ledger::EndpointBehavior,
    types::IssuanceStatus,
};
use std::time::Duration;

const W1: Address = Address::repeat_byte(0x11);
const W2: Address = Address::repeat_byte(0x22);

#[tokio::test]
async fn failed_endpoint_is_demoted_and_submission_succeeds_via_the_other() {
    let mut env = Environment::new(&[W1, W2]);
    // Intake fetches the commitment root through endpoint a, giving it a recorded latency, so
    // selection keeps preferring it until it is demoted.
    let request = env.enqueue_first(W1).await.unwrap();

    env.ledger.set_behavior(&url_a(), EndpointBehavior::Unreachable);

    env.tick().await;
    env.tick().await;

    // Two failures crossed the threshold; a is out of the pool.
    let unhealthy = env.endpoints.unhealthy();
    assert_eq!(unhealthy.len(), 1);
    assert_eq!(unhealthy[0].url, url_a());
    assert_eq!(unhealthy[0].consecutive_failures, 2);
    assert_eq!(env.endpoints.healthy_count(NETWORK), 1);

    env.tick().await;
    let settled = env.status(request.id).await;
    assert_eq!(settled.status, IssuanceStatus::Completed);
    assert_eq!(env.ledger.submissions().last().unwrap().endpoint, url_b());
}

#[tokio::test(start_paused = true)]
async fn exhausted_pool_is_transient_and_recovers_after_reinstatement() {
    let config = SchedulerConfig {
        max_batch_size: 10,
        tick_interval: Duration::from_millis(10),
        queue_depth_threshold: 1000,
        max_retries: 10,
        exhausted_tick_alert: 2,
    };
    let mut env = Environment::with_scheduler_config(&[W1, W2], config);
    let request = env.enqueue_first(W1).await.unwrap();

    env.ledger.set_behavior(&url_a(), EndpointBehavior::Unreachable);
    env.ledger.set_behavior(&url_b(), EndpointBehavior::Unreachable);

    // Each tick burns one failure on the selected endpoint until both are demoted, after which
    // selection itself reports no healthy endpoint. The request just keeps retrying.
    for _ in 0..5 {
        env.tick().await;
    }
    assert_eq!(env.endpoints.healthy_count(NETWORK), 0);
    let reverted = env.status(request.id).await;
    assert_eq!(reverted.status, IssuanceStatus::Pending);
    assert!(reverted.retry_count >= 4);

    // The endpoints heal; the background probe reinstates them without operator action.
    env.ledger.set_behavior(&url_a(), EndpointBehavior::Ok);
    env.ledger.set_behavior(&url_b(), EndpointBehavior::Ok);
    spawn_reinstatement_probe(
        env.endpoints.clone(),
        env.ledger.clone(),
        Duration::from_secs(1),
    );
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(env.endpoints.healthy_count(NETWORK), 2);

    env.tick().await;
    assert_eq!(env.status(request.id).await.status, IssuanceStatus::Completed);
}
