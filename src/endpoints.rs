//! Ledger endpoint pools and health tracking.
//!
//! Each network the ledger spans gets an independent pool of interchangeable access endpoints.
//! Pools are built from configuration at startup and live only in this process; health state is
//! rebuilt on boot and converges independently per instance.

use crate::{ledger::LedgerApi, metrics::EndpointMetrics};
use alloy::primitives::ChainId;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::{sync::Arc, time::Duration};
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tracing::{debug, info, warn};
use url::Url;

/// A single ledger-access endpoint and its health state.
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoint {
    /// The endpoint URL.
    pub url: Url,
    /// The network this endpoint serves.
    pub network: ChainId,
    /// Whether the endpoint is currently considered healthy.
    pub healthy: bool,
    /// Consecutive failed outcomes since the last success.
    pub consecutive_failures: u32,
    /// Latency of the most recent successful request.
    pub last_response_time: Option<Duration>,
    /// Time of the most recent outcome report or probe.
    pub last_checked_at: Option<DateTime<Utc>>,
}

impl Endpoint {
    fn new(url: Url, network: ChainId) -> Self {
        Self {
            url,
            network,
            healthy: true,
            consecutive_failures: 0,
            last_response_time: None,
            last_checked_at: None,
        }
    }
}

/// Returned by selection when every endpoint in a network's pool is unhealthy.
///
/// The scheduler treats this as a transient settlement failure, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("no healthy ledger endpoint for network {0}")]
pub struct NoHealthyEndpoint(pub ChainId);

/// Tracks per-network endpoint pools, ranks them by recent latency and demotes or reinstates
/// endpoints based on reported outcomes.
#[derive(Debug)]
pub struct EndpointRegistry {
    /// Endpoint pools keyed by network.
    pools: DashMap<ChainId, Vec<Endpoint>>,
    /// Consecutive failures after which an endpoint is marked unhealthy.
    failure_threshold: u32,
    metrics: EndpointMetrics,
}

impl EndpointRegistry {
    /// Creates a registry from per-network endpoint URL lists.
    pub fn new(
        networks: impl IntoIterator<Item = (ChainId, Vec<Url>)>,
        failure_threshold: u32,
    ) -> Self {
        let pools = DashMap::new();
        for (network, urls) in networks {
            let pool: Vec<_> = urls.into_iter().map(|url| Endpoint::new(url, network)).collect();
            pools.insert(network, pool);
        }
        Self { pools, failure_threshold, metrics: EndpointMetrics::default() }
    }

    /// Selects the best healthy endpoint for a network.
    ///
    /// Healthy endpoints are ranked by most recent latency ascending; endpoints that have not
    /// served a request yet rank last. An empty or fully unhealthy pool yields
    /// [`NoHealthyEndpoint`].
    pub fn select(&self, network: ChainId) -> Result<Endpoint, NoHealthyEndpoint> {
        let pool = self.pools.get(&network).ok_or(NoHealthyEndpoint(network))?;
        pool.iter()
            .filter(|endpoint| endpoint.healthy)
            .min_by_key(|endpoint| endpoint.last_response_time.unwrap_or(Duration::MAX))
            .cloned()
            .ok_or(NoHealthyEndpoint(network))
    }

    /// Feeds the outcome of a request against `endpoint` back into the registry.
    ///
    /// A success resets the failure counter and reinstates the endpoint; a failure increments it
    /// and demotes the endpoint once [`Self::failure_threshold`] is reached.
    pub fn report_outcome(&self, endpoint: &Endpoint, success: bool, latency: Option<Duration>) {
        let Some(mut pool) = self.pools.get_mut(&endpoint.network) else { return };
        let Some(entry) = pool.iter_mut().find(|e| e.url == endpoint.url) else { return };

        entry.last_checked_at = Some(Utc::now());
        if success {
            if !entry.healthy {
                info!(
                    target: "issuer::endpoints",
                    url = %entry.url,
                    network = entry.network,
                    "Endpoint reinstated"
                );
                self.metrics.reinstated.increment(1);
            }
            entry.healthy = true;
            entry.consecutive_failures = 0;
            if latency.is_some() {
                entry.last_response_time = latency;
            }
        } else {
            entry.consecutive_failures += 1;
            self.metrics.failures.increment(1);
            if entry.healthy && entry.consecutive_failures >= self.failure_threshold {
                entry.healthy = false;
                warn!(
                    target: "issuer::endpoints",
                    url = %entry.url,
                    network = entry.network,
                    failures = entry.consecutive_failures,
                    "Endpoint demoted"
                );
                self.metrics.demoted.increment(1);
            }
        }
    }

    /// Snapshot of every currently unhealthy endpoint, across all networks.
    pub fn unhealthy(&self) -> Vec<Endpoint> {
        self.pools
            .iter()
            .flat_map(|pool| {
                pool.iter().filter(|e| !e.healthy).cloned().collect::<Vec<_>>()
            })
            .collect()
    }

    /// Number of healthy endpoints in a network's pool.
    pub fn healthy_count(&self, network: ChainId) -> usize {
        self.pools
            .get(&network)
            .map(|pool| pool.iter().filter(|e| e.healthy).count())
            .unwrap_or_default()
    }

    /// The networks this registry has pools for.
    pub fn networks(&self) -> Vec<ChainId> {
        self.pools.iter().map(|entry| *entry.key()).collect()
    }
}

/// Spawns the background reinstatement check.
///
/// Periodically probes every unhealthy endpoint through the ledger adapter and reports the
/// outcome back, so demoted endpoints heal without operator action.
pub fn spawn_reinstatement_probe(
    registry: Arc<EndpointRegistry>,
    ledger: Arc<dyn LedgerApi>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tick.tick().await;
            for endpoint in registry.unhealthy() {
                let started = tokio::time::Instant::now();
                match ledger.probe(&endpoint).await {
                    Ok(()) => registry.report_outcome(&endpoint, true, Some(started.elapsed())),
                    Err(err) => {
                        debug!(
                            target: "issuer::endpoints",
                            url = %endpoint.url,
                            %err,
                            "Reinstatement probe failed"
                        );
                        registry.report_outcome(&endpoint, false, None);
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const NETWORK: ChainId = 1;

    fn url(s: &str) -> Url {
        s.parse().unwrap()
    }

    fn registry(urls: &[&str], threshold: u32) -> EndpointRegistry {
        EndpointRegistry::new(
            [(NETWORK, urls.iter().map(|u| url(u)).collect())],
            threshold,
        )
    }

    #[test]
    fn selects_lowest_latency_endpoint() {
        let registry = registry(&["http://a:8545/", "http://b:8545/"], 3);

        let a = registry.select(NETWORK).unwrap();
        registry.report_outcome(&a, true, Some(Duration::from_millis(80)));
        let b = Endpoint::new(url("http://b:8545/"), NETWORK);
        registry.report_outcome(&b, true, Some(Duration::from_millis(20)));

        assert_eq!(registry.select(NETWORK).unwrap().url, url("http://b:8545/"));

        // b slows down, a becomes the better pick again.
        registry.report_outcome(&b, true, Some(Duration::from_millis(200)));
        assert_eq!(registry.select(NETWORK).unwrap().url, url("http://a:8545/"));
    }

    #[test]
    fn demotes_after_threshold_and_excludes_from_selection() {
        let registry = registry(&["http://a:8545/"], 2);
        let a = registry.select(NETWORK).unwrap();

        registry.report_outcome(&a, false, None);
        assert!(registry.select(NETWORK).is_ok());

        registry.report_outcome(&a, false, None);
        assert_eq!(registry.select(NETWORK), Err(NoHealthyEndpoint(NETWORK)));
        assert_eq!(registry.healthy_count(NETWORK), 0);
        assert_eq!(registry.unhealthy()[0].consecutive_failures, 2);
    }

    #[test]
    fn success_reinstates_and_resets_counter() {
        let registry = registry(&["http://a:8545/"], 1);
        let a = registry.select(NETWORK).unwrap();

        registry.report_outcome(&a, false, None);
        assert!(registry.select(NETWORK).is_err());

        registry.report_outcome(&a, true, Some(Duration::from_millis(10)));
        let reinstated = registry.select(NETWORK).unwrap();
        assert!(reinstated.healthy);
        assert_eq!(reinstated.consecutive_failures, 0);
    }

    #[test]
    fn unknown_network_has_no_endpoint() {
        let registry = registry(&["http://a:8545/"], 3);
        assert_eq!(registry.select(99), Err(NoHealthyEndpoint(99)));
    }
}
