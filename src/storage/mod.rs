//! Issuance storage

mod api;
pub use api::StorageApi;
mod memory;
mod pg;

use crate::types::{IssuanceRecord, IssuanceRequest, IssuanceType, RequestId, TxRef};
use alloy::primitives::Address;
use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;

/// Issuance storage interface.
#[derive(Debug, Clone)]
pub struct IssuerStorage {
    inner: Arc<dyn StorageApi>,
}

impl IssuerStorage {
    /// Create [`IssuerStorage`] with an in-memory backend. Used for development and testing.
    pub fn in_memory() -> Self {
        Self { inner: Arc::new(memory::InMemoryStorage::default()) }
    }

    /// Create [`IssuerStorage`] backed by a PostgreSQL database.
    pub fn pg(pool: PgPool) -> Self {
        Self { inner: Arc::new(pg::PgStorage::new(pool)) }
    }
}

#[async_trait]
impl StorageApi for IssuerStorage {
    async fn create_request(&self, request: &IssuanceRequest) -> api::Result<()> {
        self.inner.create_request(request).await
    }

    async fn read_request(&self, id: RequestId) -> api::Result<Option<IssuanceRequest>> {
        self.inner.read_request(id).await
    }

    async fn cancel_request(&self, id: RequestId, user_id: &str) -> api::Result<bool> {
        self.inner.cancel_request(id, user_id).await
    }

    async fn claim_batch(&self, max: usize) -> api::Result<Vec<IssuanceRequest>> {
        self.inner.claim_batch(max).await
    }

    async fn mark_submitted(&self, ids: &[RequestId], tx_ref: TxRef) -> api::Result<()> {
        self.inner.mark_submitted(ids, tx_ref).await
    }

    async fn mark_completed(&self, ids: &[RequestId]) -> api::Result<()> {
        self.inner.mark_completed(ids).await
    }

    async fn mark_failed(&self, ids: &[RequestId], reason: &str) -> api::Result<()> {
        self.inner.mark_failed(ids, reason).await
    }

    async fn revert_to_pending(&self, ids: &[RequestId], reason: &str) -> api::Result<()> {
        self.inner.revert_to_pending(ids, reason).await
    }

    async fn read_submitted(&self) -> api::Result<Vec<IssuanceRequest>> {
        self.inner.read_submitted().await
    }

    async fn pending_count(&self) -> api::Result<usize> {
        self.inner.pending_count().await
    }

    async fn write_record(&self, record: &IssuanceRecord) -> api::Result<()> {
        self.inner.write_record(record).await
    }

    async fn read_records(&self, wallet: Address) -> api::Result<Vec<IssuanceRecord>> {
        self.inner.read_records(wallet).await
    }

    async fn last_record(
        &self,
        wallet: Address,
        issuance_type: IssuanceType,
    ) -> api::Result<Option<IssuanceRecord>> {
        self.inner.last_record(wallet, issuance_type).await
    }
}
