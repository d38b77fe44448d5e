//! # Issuer
//!
//! A service that queues issuance requests and settles them in batches against the ledger.

use clap::Parser;
use issuer::{cli::Args, spawn::try_spawn};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let handle = try_spawn(Args::parse()).await?;
    handle.server.stopped().await;

    Ok(())
}
