//! Issuer configuration.

use crate::constants::{
    DEFAULT_EXHAUSTED_TICK_ALERT, DEFAULT_FAILURE_THRESHOLD, DEFAULT_ISSUANCE_AMOUNT,
    DEFAULT_MAX_BATCH_SIZE, DEFAULT_MAX_RETRIES, DEFAULT_PROBE_INTERVAL,
    DEFAULT_QUEUE_DEPTH_THRESHOLD, DEFAULT_REQUEST_TIMEOUT, DEFAULT_TICK_INTERVAL,
};
use alloy::primitives::{ChainId, U256, map::HashMap};
use eyre::Context;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    net::{IpAddr, Ipv4Addr},
    path::Path,
    time::Duration,
};
use url::Url;

/// Issuer configuration.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct IssuerConfig {
    /// Server configuration.
    pub server: ServerConfig,
    /// Per-network ledger endpoint pools.
    #[serde(with = "crate::serde::hash_map")]
    pub networks: HashMap<ChainId, NetworkConfig>,
    /// Settlement scheduler configuration.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Endpoint health configuration.
    #[serde(default)]
    pub endpoints: EndpointHealthConfig,
    /// Issuance parameters.
    #[serde(default)]
    pub issuance: IssuanceConfig,
    /// Database URL. The in-memory store is used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
}

impl IssuerConfig {
    /// Loads the configuration from a YAML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> eyre::Result<Self> {
        let path = path.as_ref();
        let file = fs::File::open(path)
            .wrap_err_with(|| format!("could not open config file: {}", path.display()))?;
        serde_yaml::from_reader(&file)
            .wrap_err_with(|| format!("could not parse config file: {}", path.display()))
    }

    /// Saves the configuration to a YAML file.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> eyre::Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_yaml::to_string(self)?)?;
        Ok(())
    }

    /// Per-network endpoint URL lists for seeding the
    /// [`EndpointRegistry`](crate::endpoints::EndpointRegistry).
    pub fn endpoint_pools(&self) -> impl Iterator<Item = (ChainId, Vec<Url>)> + '_ {
        self.networks.iter().map(|(network, config)| (*network, config.endpoints.clone()))
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The address to serve the RPC on.
    pub address: IpAddr,
    /// The port to serve the RPC on.
    pub port: u16,
    /// The port to serve Prometheus metrics on.
    pub metrics_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { address: IpAddr::V4(Ipv4Addr::LOCALHOST), port: 9219, metrics_port: 9100 }
    }
}

/// Configuration of a single network's ledger access.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Interchangeable ledger endpoints for this network.
    pub endpoints: Vec<Url>,
}

/// Settlement scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Maximum number of requests claimed per batch.
    pub max_batch_size: usize,
    /// Interval between settlement ticks, in milliseconds.
    #[serde(with = "crate::serde::duration")]
    pub tick_interval: Duration,
    /// Queue depth that triggers a tick ahead of the timer.
    pub queue_depth_threshold: usize,
    /// Transient-failure retries before a request is failed.
    pub max_retries: u32,
    /// Consecutive all-endpoints-down ticks before the operator alert fires.
    pub exhausted_tick_alert: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            tick_interval: DEFAULT_TICK_INTERVAL,
            queue_depth_threshold: DEFAULT_QUEUE_DEPTH_THRESHOLD,
            max_retries: DEFAULT_MAX_RETRIES,
            exhausted_tick_alert: DEFAULT_EXHAUSTED_TICK_ALERT,
        }
    }
}

/// Endpoint health configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointHealthConfig {
    /// Consecutive failures after which an endpoint is marked unhealthy.
    pub failure_threshold: u32,
    /// Interval between reinstatement probes of unhealthy endpoints, in milliseconds.
    #[serde(with = "crate::serde::duration")]
    pub probe_interval: Duration,
    /// Timeout for a single ledger request, in milliseconds.
    #[serde(with = "crate::serde::duration")]
    pub request_timeout: Duration,
}

impl Default for EndpointHealthConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            probe_interval: DEFAULT_PROBE_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Issuance parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuanceConfig {
    /// The network issuances settle on.
    pub network: ChainId,
    /// The fixed amount credited per issuance, in base units.
    pub amount: U256,
}

impl Default for IssuanceConfig {
    fn default() -> Self {
        Self { network: 1, amount: U256::from(DEFAULT_ISSUANCE_AMOUNT) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_roundtrip() {
        let mut config = IssuerConfig::default();
        config.networks.insert(
            1,
            NetworkConfig {
                endpoints: vec![
                    "http://ledger-a:8545/".parse().unwrap(),
                    "http://ledger-b:8545/".parse().unwrap(),
                ],
            },
        );
        config.database_url = Some("postgres://issuer@localhost/issuer".into());

        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: IssuerConfig = serde_yaml::from_str(&yaml).unwrap();

        assert_eq!(parsed.networks[&1].endpoints.len(), 2);
        assert_eq!(parsed.scheduler.max_batch_size, config.scheduler.max_batch_size);
        assert_eq!(parsed.scheduler.tick_interval, config.scheduler.tick_interval);
        assert_eq!(parsed.issuance.amount, config.issuance.amount);
        assert_eq!(parsed.database_url, config.database_url);
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let yaml = r#"
server:
  address: 127.0.0.1
  port: 9219
  metrics_port: 9100
networks:
  "1":
    endpoints: ["http://ledger-a:8545/"]
"#;
        let config: IssuerConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.scheduler.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(config.endpoints.failure_threshold, DEFAULT_FAILURE_THRESHOLD);
        assert_eq!(config.issuance.network, 1);
        assert!(config.database_url.is_none());
    }
}
