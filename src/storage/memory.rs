//! Issuance storage implementation in-memory. Used for development and testing.

use super::{StorageApi, api::Result};
use crate::{
    error::StorageError,
    types::{IssuanceRecord, IssuanceRequest, IssuanceStatus, IssuanceType, RequestId, TxRef},
};
use alloy::primitives::Address;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock};

/// [`StorageApi`] implementation in-memory.
///
/// Compound transitions are serialized through a single mutation lock, standing in for the
/// conditional updates the PostgreSQL backend gets from the database.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    requests: DashMap<RequestId, IssuanceRequest>,
    records: RwLock<Vec<IssuanceRecord>>,
    mutation_lock: Mutex<()>,
}

impl InMemoryStorage {
    fn update_where<F>(&self, ids: &[RequestId], precondition: F, apply: impl Fn(&mut IssuanceRequest))
    where
        F: Fn(IssuanceStatus) -> bool,
    {
        for id in ids {
            if let Some(mut request) = self.requests.get_mut(id) {
                if precondition(request.status) {
                    apply(&mut request);
                }
            }
        }
    }
}

#[async_trait]
impl StorageApi for InMemoryStorage {
    async fn create_request(&self, request: &IssuanceRequest) -> Result<()> {
        let _guard = self.mutation_lock.lock().await;

        let in_flight = self.requests.iter().any(|existing| {
            existing.wallet == request.wallet
                && existing.issuance_type == request.issuance_type
                && !existing.status.is_terminal()
        });
        if in_flight {
            return Err(StorageError::InFlightExists {
                wallet: request.wallet,
                issuance_type: request.issuance_type,
            });
        }

        self.requests.insert(request.id, request.clone());
        Ok(())
    }

    async fn read_request(&self, id: RequestId) -> Result<Option<IssuanceRequest>> {
        Ok(self.requests.get(&id).map(|request| request.clone()))
    }

    async fn cancel_request(&self, id: RequestId, user_id: &str) -> Result<bool> {
        let _guard = self.mutation_lock.lock().await;

        let Some(mut request) = self.requests.get_mut(&id) else {
            return Err(StorageError::UnknownRequest(id));
        };
        if request.status != IssuanceStatus::Pending || request.user_id != user_id {
            return Ok(false);
        }

        request.status = IssuanceStatus::Cancelled;
        request.processed_at = Some(Utc::now());
        Ok(true)
    }

    async fn claim_batch(&self, max: usize) -> Result<Vec<IssuanceRequest>> {
        let _guard = self.mutation_lock.lock().await;

        let mut pending: Vec<_> = self
            .requests
            .iter()
            .filter(|request| request.status == IssuanceStatus::Pending)
            .map(|request| (request.created_at, request.id))
            .collect();
        pending.sort();

        let mut claimed = Vec::with_capacity(max.min(pending.len()));
        for (_, id) in pending.into_iter().take(max) {
            if let Some(mut request) = self.requests.get_mut(&id) {
                request.status = IssuanceStatus::InBatch;
                claimed.push(request.clone());
            }
        }
        Ok(claimed)
    }

    async fn mark_submitted(&self, ids: &[RequestId], tx_ref: TxRef) -> Result<()> {
        let _guard = self.mutation_lock.lock().await;
        self.update_where(
            ids,
            |status| status == IssuanceStatus::InBatch,
            |request| {
                request.status = IssuanceStatus::Submitted;
                request.transaction_ref = Some(tx_ref);
            },
        );
        Ok(())
    }

    async fn mark_completed(&self, ids: &[RequestId]) -> Result<()> {
        let _guard = self.mutation_lock.lock().await;
        self.update_where(
            ids,
            |status| status == IssuanceStatus::Submitted,
            |request| {
                request.status = IssuanceStatus::Completed;
                request.processed_at = Some(Utc::now());
            },
        );
        Ok(())
    }

    async fn mark_failed(&self, ids: &[RequestId], reason: &str) -> Result<()> {
        let _guard = self.mutation_lock.lock().await;
        self.update_where(
            ids,
            |status| matches!(status, IssuanceStatus::InBatch | IssuanceStatus::Submitted),
            |request| {
                request.status = IssuanceStatus::Failed;
                request.last_error = Some(reason.to_string());
                request.processed_at = Some(Utc::now());
                request.transaction_ref = None;
            },
        );
        Ok(())
    }

    async fn revert_to_pending(&self, ids: &[RequestId], reason: &str) -> Result<()> {
        let _guard = self.mutation_lock.lock().await;
        self.update_where(
            ids,
            |status| status == IssuanceStatus::InBatch,
            |request| {
                request.status = IssuanceStatus::Pending;
                request.retry_count += 1;
                request.last_error = Some(reason.to_string());
            },
        );
        Ok(())
    }

    async fn read_submitted(&self) -> Result<Vec<IssuanceRequest>> {
        let mut submitted: Vec<_> = self
            .requests
            .iter()
            .filter(|request| request.status == IssuanceStatus::Submitted)
            .map(|request| request.clone())
            .collect();
        submitted.sort_by_key(|request| request.created_at);
        Ok(submitted)
    }

    async fn pending_count(&self) -> Result<usize> {
        Ok(self
            .requests
            .iter()
            .filter(|request| request.status == IssuanceStatus::Pending)
            .count())
    }

    async fn write_record(&self, record: &IssuanceRecord) -> Result<()> {
        let mut records = self.records.write().await;

        if record.issuance_type == IssuanceType::First
            && records
                .iter()
                .any(|r| r.wallet == record.wallet && r.issuance_type == IssuanceType::First)
        {
            return Err(StorageError::DuplicateFirstRecord(record.wallet));
        }

        records.push(record.clone());
        Ok(())
    }

    async fn read_records(&self, wallet: Address) -> Result<Vec<IssuanceRecord>> {
        let records = self.records.read().await;
        let mut matching: Vec<_> =
            records.iter().filter(|record| record.wallet == wallet).cloned().collect();
        matching.sort_by_key(|record| record.timestamp);
        Ok(matching)
    }

    async fn last_record(
        &self,
        wallet: Address,
        issuance_type: IssuanceType,
    ) -> Result<Option<IssuanceRecord>> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|record| record.wallet == wallet && record.issuance_type == issuance_type)
            .max_by_key(|record| record.timestamp)
            .cloned())
    }
}
