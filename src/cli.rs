//! # Issuer CLI

use crate::config::IssuerConfig;
use clap::Parser;
use std::{net::IpAddr, path::PathBuf};

/// The issuer service queues issuance requests and settles them in batches against the ledger.
#[derive(Debug, Parser)]
#[command(author, about = "Issuer", long_about = None, version = crate::version::VERSION)]
pub struct Args {
    /// The configuration file.
    ///
    /// If missing, a default one will be used and stored in the working directory under
    /// `issuer.yaml`.
    #[arg(long, value_name = "CONFIG", env = "ISSUER_CONFIG", default_value = "issuer.yaml")]
    pub config: PathBuf,
    /// The address to serve the RPC on.
    #[arg(long = "http.addr", value_name = "ADDR")]
    pub address: Option<IpAddr>,
    /// The port to serve the RPC on.
    #[arg(long = "http.port", value_name = "PORT")]
    pub port: Option<u16>,
    /// The port to serve the metrics on.
    #[arg(long = "http.metrics-port", value_name = "PORT")]
    pub metrics_port: Option<u16>,
    /// The database URL.
    ///
    /// The in-memory store is used when unset.
    #[arg(long, value_name = "DATABASE_URL", env = "ISSUER_DATABASE_URL")]
    pub database_url: Option<String>,
}

impl Args {
    /// Loads the configuration file, writing a default one if missing, and applies the CLI
    /// overrides.
    pub fn load_config(&self) -> eyre::Result<IssuerConfig> {
        let mut config = if self.config.exists() {
            IssuerConfig::load_from_file(&self.config)?
        } else {
            let config = IssuerConfig::default();
            config.save_to_file(&self.config)?;
            config
        };

        if let Some(address) = self.address {
            config.server.address = address;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(metrics_port) = self.metrics_port {
            config.server.metrics_port = metrics_port;
        }
        if self.database_url.is_some() {
            config.database_url = self.database_url.clone();
        }

        Ok(config)
    }
}
