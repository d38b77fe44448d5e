//! Issuance storage api.

use crate::{
    error::StorageError,
    types::{IssuanceRecord, IssuanceRequest, IssuanceType, RequestId, TxRef},
};
use alloy::primitives::Address;
use async_trait::async_trait;
use std::fmt::Debug;

/// Type alias for `Result<T, StorageError>`
pub type Result<T> = core::result::Result<T, StorageError>;

/// Storage API.
///
/// The store is the only shared mutable resource between the intake boundary and the settlement
/// loop, so the compound operations here ([`create_request`](StorageApi::create_request),
/// [`claim_batch`](StorageApi::claim_batch), [`cancel_request`](StorageApi::cancel_request)) must
/// be atomic in every implementation.
#[async_trait]
pub trait StorageApi: Debug + Send + Sync {
    /// Persists a new pending request.
    ///
    /// Fails with [`StorageError::InFlightExists`] when a non-terminal request for the same
    /// wallet and issuance type already exists.
    async fn create_request(&self, request: &IssuanceRequest) -> Result<()>;

    /// Reads a request by id.
    async fn read_request(&self, id: RequestId) -> Result<Option<IssuanceRequest>>;

    /// Cancels a request if it is still pending and owned by `user_id`.
    ///
    /// Returns `Ok(false)` without mutating anything when the request has moved on or is owned by
    /// someone else; cancellation is racy by design and callers poll status instead.
    async fn cancel_request(&self, id: RequestId, user_id: &str) -> Result<bool>;

    /// Atomically claims up to `max` of the oldest pending requests into `in_batch`.
    ///
    /// The select-and-transition is a single conditional update, so concurrent schedulers can
    /// never claim the same request twice. Returns the claimed requests oldest first.
    async fn claim_batch(&self, max: usize) -> Result<Vec<IssuanceRequest>>;

    /// Transitions claimed requests to `submitted` and sets the transaction reference.
    async fn mark_submitted(&self, ids: &[RequestId], tx_ref: TxRef) -> Result<()>;

    /// Transitions submitted requests to `completed`.
    async fn mark_completed(&self, ids: &[RequestId]) -> Result<()>;

    /// Transitions claimed or submitted requests to `failed`, clearing the transaction
    /// reference.
    async fn mark_failed(&self, ids: &[RequestId], reason: &str) -> Result<()>;

    /// Reverts claimed requests to `pending`, incrementing their retry count.
    async fn revert_to_pending(&self, ids: &[RequestId], reason: &str) -> Result<()>;

    /// All requests currently submitted and awaiting confirmation.
    async fn read_submitted(&self) -> Result<Vec<IssuanceRequest>>;

    /// Number of pending requests.
    async fn pending_count(&self) -> Result<usize>;

    /// Appends a settled issuance record.
    ///
    /// Fails with [`StorageError::DuplicateFirstRecord`] if a first issuance record for the
    /// wallet already exists.
    async fn write_record(&self, record: &IssuanceRecord) -> Result<()>;

    /// All records for a wallet, oldest first.
    async fn read_records(&self, wallet: Address) -> Result<Vec<IssuanceRecord>>;

    /// The most recent record for a wallet and issuance type.
    async fn last_record(
        &self,
        wallet: Address,
        issuance_type: IssuanceType,
    ) -> Result<Option<IssuanceRecord>>;
}
