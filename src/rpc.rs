//! # Issuer RPC
//!
//! Implementation of the `issuer_` namespace:
//!
//! - `issuer_enqueueFirstIssuance` and `issuer_enqueuePeriodicIssuance` for submitting issuance
//!   requests.
//! - `issuer_requestStatus` and `issuer_cancel` for tracking and withdrawing pending requests.
//! - `issuer_issuanceHistory` for a wallet's settled issuance records.
//! - `issuer_health` for operational liveness.

use crate::{
    endpoints::EndpointRegistry,
    queue::IssuanceQueue,
    types::{
        IssuanceRecord, IssuanceRequest, RequestId,
        rpc::{
            CancelParameters, CancelResponse, EnqueueFirstParameters, EnqueuePeriodicParameters,
            EnqueueResponse, HealthResponse, NetworkHealth,
        },
    },
    version::VERSION,
};
use alloy::primitives::Address;
use jsonrpsee::{
    core::{RpcResult, async_trait},
    proc_macros::rpc,
};
use std::sync::Arc;

/// Issuer `issuer_` RPC namespace.
#[rpc(server, client, namespace = "issuer")]
pub trait IssuerApi {
    /// Enqueues a one-time first issuance for a wallet, gated by a membership proof.
    #[method(name = "enqueueFirstIssuance")]
    async fn enqueue_first_issuance(
        &self,
        params: EnqueueFirstParameters,
    ) -> RpcResult<EnqueueResponse>;

    /// Enqueues a recurring periodic issuance for a wallet.
    #[method(name = "enqueuePeriodicIssuance")]
    async fn enqueue_periodic_issuance(
        &self,
        params: EnqueuePeriodicParameters,
    ) -> RpcResult<EnqueueResponse>;

    /// Current snapshot of an issuance request.
    #[method(name = "requestStatus")]
    async fn request_status(&self, request_id: RequestId) -> RpcResult<IssuanceRequest>;

    /// Cancels a pending request.
    #[method(name = "cancel")]
    async fn cancel(&self, params: CancelParameters) -> RpcResult<CancelResponse>;

    /// Settled issuance records for a wallet, oldest first.
    #[method(name = "issuanceHistory")]
    async fn issuance_history(&self, wallet_address: Address) -> RpcResult<Vec<IssuanceRecord>>;

    /// Service liveness and per-network endpoint health.
    #[method(name = "health")]
    async fn health(&self) -> RpcResult<HealthResponse>;
}

/// Issuer RPC implementation.
#[derive(Debug)]
pub struct Issuer {
    queue: Arc<IssuanceQueue>,
    endpoints: Arc<EndpointRegistry>,
}

impl Issuer {
    /// Creates a new [`Issuer`].
    pub fn new(queue: Arc<IssuanceQueue>, endpoints: Arc<EndpointRegistry>) -> Self {
        Self { queue, endpoints }
    }
}

#[async_trait]
impl IssuerApiServer for Issuer {
    async fn enqueue_first_issuance(
        &self,
        params: EnqueueFirstParameters,
    ) -> RpcResult<EnqueueResponse> {
        let EnqueueFirstParameters { wallet_address, user_id, device_id, proof } = params;
        let request =
            self.queue.enqueue_first(wallet_address, user_id, device_id, proof).await?;
        Ok(EnqueueResponse { request_id: request.id, status: request.status })
    }

    async fn enqueue_periodic_issuance(
        &self,
        params: EnqueuePeriodicParameters,
    ) -> RpcResult<EnqueueResponse> {
        let EnqueuePeriodicParameters { wallet_address, user_id, device_id } = params;
        let request = self.queue.enqueue_periodic(wallet_address, user_id, device_id).await?;
        Ok(EnqueueResponse { request_id: request.id, status: request.status })
    }

    async fn request_status(&self, request_id: RequestId) -> RpcResult<IssuanceRequest> {
        Ok(self.queue.status(request_id).await?)
    }

    async fn cancel(&self, params: CancelParameters) -> RpcResult<CancelResponse> {
        let cancelled = self.queue.cancel(params.request_id, &params.user_id).await?;
        Ok(CancelResponse { cancelled })
    }

    async fn issuance_history(&self, wallet_address: Address) -> RpcResult<Vec<IssuanceRecord>> {
        Ok(self.queue.history(wallet_address).await?)
    }

    async fn health(&self) -> RpcResult<HealthResponse> {
        let mut networks: Vec<_> = self
            .endpoints
            .networks()
            .into_iter()
            .map(|network| NetworkHealth {
                network,
                healthy_endpoints: self.endpoints.healthy_count(network),
            })
            .collect();
        networks.sort_by_key(|health| health.network);

        Ok(HealthResponse { version: VERSION.into(), networks })
    }
}
