//! RPC parameter and response types for the `issuer_` namespace.

use super::{IssuanceStatus, RequestId};
use alloy::primitives::{Address, Bytes, ChainId};
use serde::{Deserialize, Serialize};

/// Request parameters for `issuer_enqueueFirstIssuance`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueFirstParameters {
    /// Wallet to credit.
    pub wallet_address: Address,
    /// Platform user submitting the request.
    pub user_id: String,
    /// Device the request is submitted from.
    pub device_id: String,
    /// Membership proof against the published commitment root.
    pub proof: Bytes,
}

/// Request parameters for `issuer_enqueuePeriodicIssuance`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueuePeriodicParameters {
    /// Wallet to credit.
    pub wallet_address: Address,
    /// Platform user submitting the request.
    pub user_id: String,
    /// Device the request is submitted from.
    pub device_id: String,
}

/// Response for the enqueue calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueResponse {
    /// Id of the accepted request.
    pub request_id: RequestId,
    /// Status at acceptance time. Always `pending`.
    pub status: IssuanceStatus,
}

/// Request parameters for `issuer_cancel`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelParameters {
    /// Id of the request to cancel.
    pub request_id: RequestId,
    /// The user claiming ownership of the request.
    pub user_id: String,
}

/// Response for `issuer_cancel`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelResponse {
    /// Whether the request was cancelled. `false` once it has been picked up by a batch.
    pub cancelled: bool,
}

/// Health of one network's endpoint pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkHealth {
    /// The network.
    pub network: ChainId,
    /// Number of healthy endpoints in the pool.
    pub healthy_endpoints: usize,
}

/// Response for `issuer_health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Issuer version.
    pub version: String,
    /// Endpoint health per network.
    pub networks: Vec<NetworkHealth>,
}
