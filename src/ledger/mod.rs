//! Issuance ledger adapter.
//!
//! The narrow boundary between the issuer and the external ledger. The adapter submits batch
//! mints, reads confirmations and the published commitment root, and nothing else; every policy
//! decision stays with the caller.

mod rpc;
pub use rpc::RpcLedger;

mod mock;
pub use mock::{EndpointBehavior, MockLedger, SubmittedBatch};

use crate::{
    endpoints::Endpoint,
    error::LedgerError,
    types::{IssuanceType, TxRef},
};
use alloy::primitives::{Address, B256, Bytes};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// A single mint entry in a batch submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintEntry {
    /// Wallet to credit.
    pub wallet: Address,
    /// Membership proof, required for first issuance entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof: Option<Bytes>,
}

/// Confirmation state of a submitted batch mint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Confirmation {
    /// Whether the transaction is included on the ledger.
    pub confirmed: bool,
    /// Block height of inclusion, if confirmed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_height: Option<u64>,
    /// Revert reason, if the ledger rejected the transaction after submission.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reverted: Option<String>,
}

/// Ledger access API.
///
/// Implementations are pass-throughs to one ledger endpoint at a time; endpoint choice and
/// failover belong to the caller via the
/// [`EndpointRegistry`](crate::endpoints::EndpointRegistry).
#[async_trait]
pub trait LedgerApi: Debug + Send + Sync {
    /// Submits a batch mint through `endpoint`, returning one transaction reference for the whole
    /// batch. Minting is all-or-nothing per batch.
    async fn submit_batch_mint(
        &self,
        endpoint: &Endpoint,
        issuance_type: IssuanceType,
        entries: &[MintEntry],
    ) -> Result<TxRef, LedgerError>;

    /// Reads the confirmation state of a previously submitted batch.
    async fn get_confirmation(
        &self,
        endpoint: &Endpoint,
        tx_ref: TxRef,
    ) -> Result<Confirmation, LedgerError>;

    /// Reads the currently published commitment root.
    async fn commitment_root(&self, endpoint: &Endpoint) -> Result<B256, LedgerError>;

    /// Cheap liveness check against `endpoint`, used by the reinstatement probe.
    async fn probe(&self, endpoint: &Endpoint) -> Result<(), LedgerError>;
}
