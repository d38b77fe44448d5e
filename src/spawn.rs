//! Issuer spawn utilities.

use crate::{
    binding::{DeviceRegistry, OpenDeviceRegistry},
    cli::Args,
    config::IssuerConfig,
    endpoints::{EndpointRegistry, spawn_reinstatement_probe},
    ledger::{LedgerApi, RpcLedger},
    metrics::{RpcMetricsService, setup_exporter},
    queue::IssuanceQueue,
    rpc::{Issuer, IssuerApiServer},
    scheduler::SettlementScheduler,
    storage::IssuerStorage,
};
use http::header;
use jsonrpsee::server::{RpcServiceBuilder, Server, ServerHandle};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::PgPool;
use std::{net::SocketAddr, sync::Arc};
use tokio::sync::Notify;
use tower::{ServiceBuilder, layer::layer_fn};
use tower_http::cors::{AllowMethods, AllowOrigin, CorsLayer};
use tracing::{info, warn};

/// Context returned once the issuer is launched.
#[derive(Debug, Clone)]
pub struct IssuerHandle {
    /// The socket address to which the server is bound.
    pub local_addr: SocketAddr,
    /// Handle to the RPC server.
    pub server: ServerHandle,
    /// Storage of the issuer.
    pub storage: IssuerStorage,
    /// Endpoint health registry.
    pub endpoints: Arc<EndpointRegistry>,
    /// Metrics collector handle.
    pub metrics: PrometheusHandle,
}

/// Spawns the issuer from CLI arguments.
pub async fn try_spawn(args: Args) -> eyre::Result<IssuerHandle> {
    try_spawn_with_config(args.load_config()?).await
}

/// Spawns the issuer: storage, endpoint registry and its reinstatement probe, the settlement
/// scheduler and the RPC server.
pub async fn try_spawn_with_config(config: IssuerConfig) -> eyre::Result<IssuerHandle> {
    let metrics =
        setup_exporter(SocketAddr::new(config.server.address, config.server.metrics_port)).await;

    let storage = if let Some(database_url) = &config.database_url {
        let pool = PgPool::connect(database_url).await?;
        sqlx::migrate!().run(&pool).await?;
        IssuerStorage::pg(pool)
    } else {
        warn!(target: "issuer::spawn", "No database URL configured, using in-memory storage");
        IssuerStorage::in_memory()
    };

    let endpoints = Arc::new(EndpointRegistry::new(
        config.endpoint_pools(),
        config.endpoints.failure_threshold,
    ));
    let ledger: Arc<dyn LedgerApi> = Arc::new(RpcLedger::new(config.endpoints.request_timeout));
    spawn_reinstatement_probe(endpoints.clone(), ledger.clone(), config.endpoints.probe_interval);

    // The production authentication layer plugs in here through [`DeviceRegistry`].
    let devices: Arc<dyn DeviceRegistry> = Arc::new(OpenDeviceRegistry);

    let depth_signal = Arc::new(Notify::new());
    let queue = Arc::new(IssuanceQueue::new(
        storage.clone(),
        devices,
        ledger.clone(),
        endpoints.clone(),
        config.issuance.network,
        config.scheduler.queue_depth_threshold,
        depth_signal.clone(),
    ));

    SettlementScheduler::new(
        storage.clone(),
        ledger,
        endpoints.clone(),
        config.scheduler.clone(),
        config.issuance.clone(),
        depth_signal,
    )
    .spawn();

    let cors = CorsLayer::new()
        .allow_methods(AllowMethods::any())
        .allow_origin(AllowOrigin::any())
        .allow_headers([header::CONTENT_TYPE]);
    let http_middleware = ServiceBuilder::new().layer(cors);
    let rpc_middleware = RpcServiceBuilder::new().layer(layer_fn(RpcMetricsService::new));

    let server = Server::builder()
        .set_http_middleware(http_middleware)
        .set_rpc_middleware(rpc_middleware)
        .build(SocketAddr::new(config.server.address, config.server.port))
        .await?;
    let local_addr = server.local_addr()?;
    let server = server.start(Issuer::new(queue, endpoints.clone()).into_rpc());

    info!(target: "issuer::spawn", %local_addr, "Started issuer service");

    Ok(IssuerHandle { local_addr, server, storage, endpoints, metrics })
}
