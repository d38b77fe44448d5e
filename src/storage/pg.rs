//! Issuance storage implementation using a PostgreSQL database.

use super::{StorageApi, api::Result};
use crate::{
    error::StorageError,
    types::{IssuanceRecord, IssuanceRequest, IssuanceStatus, IssuanceType, RequestId, TxRef},
};
use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;
use eyre::eyre;
use sqlx::{PgPool, Row, postgres::PgRow};
use std::str::FromStr;
use tracing::instrument;

/// Name of the partial unique index enforcing a single in-flight request per wallet and type.
const IN_FLIGHT_CONSTRAINT: &str = "issuance_requests_in_flight";

/// Name of the partial unique index enforcing a single first issuance record per wallet.
const FIRST_RECORD_CONSTRAINT: &str = "issuance_records_first";

/// PostgreSQL storage implementation.
#[derive(Debug)]
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    /// Creates a new PostgreSQL storage instance.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_request(row: &PgRow) -> Result<IssuanceRequest> {
    let id: Vec<u8> = row.try_get("id").map_err(eyre::Error::from)?;
    let wallet: Vec<u8> = row.try_get("wallet").map_err(eyre::Error::from)?;
    let issuance_type: String = row.try_get("issuance_type").map_err(eyre::Error::from)?;
    let status: String = row.try_get("status").map_err(eyre::Error::from)?;
    let proof: Option<Vec<u8>> = row.try_get("proof").map_err(eyre::Error::from)?;
    let transaction_ref: Option<Vec<u8>> =
        row.try_get("transaction_ref").map_err(eyre::Error::from)?;

    Ok(IssuanceRequest {
        id: RequestId(B256::try_from(id.as_slice()).map_err(|err| eyre!(err))?),
        wallet: Address::try_from(wallet.as_slice()).map_err(|err| eyre!(err))?,
        user_id: row.try_get("user_id").map_err(eyre::Error::from)?,
        device_id: row.try_get("device_id").map_err(eyre::Error::from)?,
        issuance_type: IssuanceType::from_str(&issuance_type).map_err(|err| eyre!(err))?,
        status: IssuanceStatus::from_str(&status).map_err(|err| eyre!(err))?,
        proof: proof.map(Into::into),
        retry_count: row.try_get::<i32, _>("retry_count").map_err(eyre::Error::from)? as u32,
        last_error: row.try_get("last_error").map_err(eyre::Error::from)?,
        created_at: row.try_get("created_at").map_err(eyre::Error::from)?,
        processed_at: row.try_get("processed_at").map_err(eyre::Error::from)?,
        transaction_ref: transaction_ref
            .map(|bytes| B256::try_from(bytes.as_slice()).map(TxRef).map_err(|err| eyre!(err)))
            .transpose()?,
    })
}

fn row_to_record(row: &PgRow) -> Result<IssuanceRecord> {
    let wallet: Vec<u8> = row.try_get("wallet").map_err(eyre::Error::from)?;
    let issuance_type: String = row.try_get("issuance_type").map_err(eyre::Error::from)?;
    let amount: String = row.try_get("amount").map_err(eyre::Error::from)?;
    let transaction_ref: Vec<u8> = row.try_get("transaction_ref").map_err(eyre::Error::from)?;

    Ok(IssuanceRecord {
        wallet: Address::try_from(wallet.as_slice()).map_err(|err| eyre!(err))?,
        issuance_type: IssuanceType::from_str(&issuance_type).map_err(|err| eyre!(err))?,
        amount: U256::from_str(&amount).map_err(|err| eyre!(err))?,
        transaction_ref: TxRef(
            B256::try_from(transaction_ref.as_slice()).map_err(|err| eyre!(err))?,
        ),
        device_id: row.try_get("device_id").map_err(eyre::Error::from)?,
        timestamp: row.try_get("settled_at").map_err(eyre::Error::from)?,
    })
}

fn id_params(ids: &[RequestId]) -> Vec<Vec<u8>> {
    ids.iter().map(|id| id.as_slice().to_vec()).collect()
}

/// Maps a unique violation on `constraint` through `to_err`, everything else to an internal
/// error.
fn map_unique_violation(
    err: sqlx::Error,
    constraint: &str,
    to_err: impl FnOnce() -> StorageError,
) -> StorageError {
    if let sqlx::Error::Database(db) = &err {
        if db.constraint() == Some(constraint) {
            return to_err();
        }
    }
    StorageError::Internal(err.into())
}

#[async_trait]
impl StorageApi for PgStorage {
    #[instrument(skip_all, fields(id = %request.id))]
    async fn create_request(&self, request: &IssuanceRequest) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO issuance_requests
                (id, wallet, user_id, device_id, issuance_type, status, proof, retry_count,
                 last_error, created_at, processed_at, transaction_ref)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(request.id.as_slice())
        .bind(request.wallet.as_slice())
        .bind(&request.user_id)
        .bind(&request.device_id)
        .bind(request.issuance_type.as_str())
        .bind(request.status.as_str())
        .bind(request.proof.as_ref().map(|proof| proof.to_vec()))
        .bind(request.retry_count as i32)
        .bind(&request.last_error)
        .bind(request.created_at)
        .bind(request.processed_at)
        .bind(request.transaction_ref.map(|tx_ref| tx_ref.as_slice().to_vec()))
        .execute(&self.pool)
        .await
        .map_err(|err| {
            map_unique_violation(err, IN_FLIGHT_CONSTRAINT, || StorageError::InFlightExists {
                wallet: request.wallet,
                issuance_type: request.issuance_type,
            })
        })?;

        Ok(())
    }

    async fn read_request(&self, id: RequestId) -> Result<Option<IssuanceRequest>> {
        let row = sqlx::query("SELECT * FROM issuance_requests WHERE id = $1")
            .bind(id.as_slice())
            .fetch_optional(&self.pool)
            .await
            .map_err(eyre::Error::from)?;

        row.as_ref().map(row_to_request).transpose()
    }

    #[instrument(skip_all, fields(id = %id))]
    async fn cancel_request(&self, id: RequestId, user_id: &str) -> Result<bool> {
        let exists = sqlx::query("SELECT 1 FROM issuance_requests WHERE id = $1")
            .bind(id.as_slice())
            .fetch_optional(&self.pool)
            .await
            .map_err(eyre::Error::from)?;
        if exists.is_none() {
            return Err(StorageError::UnknownRequest(id));
        }

        let result = sqlx::query(
            r#"
            UPDATE issuance_requests
            SET status = 'cancelled', processed_at = NOW()
            WHERE id = $1 AND user_id = $2 AND status = 'pending'
            "#,
        )
        .bind(id.as_slice())
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(eyre::Error::from)?;

        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip_all)]
    async fn claim_batch(&self, max: usize) -> Result<Vec<IssuanceRequest>> {
        // Single conditional update; two concurrent schedulers can never pick the same row.
        let rows = sqlx::query(
            r#"
            WITH picked AS (
                SELECT id FROM issuance_requests
                WHERE status = 'pending'
                ORDER BY created_at ASC
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE issuance_requests AS r
            SET status = 'in_batch'
            FROM picked
            WHERE r.id = picked.id
            RETURNING r.*
            "#,
        )
        .bind(max as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(eyre::Error::from)?;

        let mut batch =
            rows.iter().map(row_to_request).collect::<Result<Vec<_>>>()?;
        batch.sort_by_key(|request| request.created_at);
        Ok(batch)
    }

    async fn mark_submitted(&self, ids: &[RequestId], tx_ref: TxRef) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE issuance_requests
            SET status = 'submitted', transaction_ref = $2
            WHERE id = ANY($1) AND status = 'in_batch'
            "#,
        )
        .bind(id_params(ids))
        .bind(tx_ref.as_slice())
        .execute(&self.pool)
        .await
        .map_err(eyre::Error::from)?;

        Ok(())
    }

    async fn mark_completed(&self, ids: &[RequestId]) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE issuance_requests
            SET status = 'completed', processed_at = NOW()
            WHERE id = ANY($1) AND status = 'submitted'
            "#,
        )
        .bind(id_params(ids))
        .execute(&self.pool)
        .await
        .map_err(eyre::Error::from)?;

        Ok(())
    }

    async fn mark_failed(&self, ids: &[RequestId], reason: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE issuance_requests
            SET status = 'failed', last_error = $2, processed_at = NOW(), transaction_ref = NULL
            WHERE id = ANY($1) AND status IN ('in_batch', 'submitted')
            "#,
        )
        .bind(id_params(ids))
        .bind(reason)
        .execute(&self.pool)
        .await
        .map_err(eyre::Error::from)?;

        Ok(())
    }

    async fn revert_to_pending(&self, ids: &[RequestId], reason: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE issuance_requests
            SET status = 'pending', retry_count = retry_count + 1, last_error = $2
            WHERE id = ANY($1) AND status = 'in_batch'
            "#,
        )
        .bind(id_params(ids))
        .bind(reason)
        .execute(&self.pool)
        .await
        .map_err(eyre::Error::from)?;

        Ok(())
    }

    async fn read_submitted(&self) -> Result<Vec<IssuanceRequest>> {
        let rows = sqlx::query(
            "SELECT * FROM issuance_requests WHERE status = 'submitted' ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(eyre::Error::from)?;

        rows.iter().map(row_to_request).collect()
    }

    async fn pending_count(&self) -> Result<usize> {
        let row =
            sqlx::query("SELECT COUNT(*) AS depth FROM issuance_requests WHERE status = 'pending'")
                .fetch_one(&self.pool)
                .await
                .map_err(eyre::Error::from)?;

        Ok(row.try_get::<i64, _>("depth").map_err(eyre::Error::from)? as usize)
    }

    #[instrument(skip_all, fields(wallet = %record.wallet))]
    async fn write_record(&self, record: &IssuanceRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO issuance_records
                (wallet, issuance_type, amount, transaction_ref, device_id, settled_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(record.wallet.as_slice())
        .bind(record.issuance_type.as_str())
        .bind(record.amount.to_string())
        .bind(record.transaction_ref.as_slice())
        .bind(&record.device_id)
        .bind(record.timestamp)
        .execute(&self.pool)
        .await
        .map_err(|err| {
            map_unique_violation(err, FIRST_RECORD_CONSTRAINT, || {
                StorageError::DuplicateFirstRecord(record.wallet)
            })
        })?;

        Ok(())
    }

    async fn read_records(&self, wallet: Address) -> Result<Vec<IssuanceRecord>> {
        let rows = sqlx::query(
            "SELECT * FROM issuance_records WHERE wallet = $1 ORDER BY settled_at ASC",
        )
        .bind(wallet.as_slice())
        .fetch_all(&self.pool)
        .await
        .map_err(eyre::Error::from)?;

        rows.iter().map(row_to_record).collect()
    }

    async fn last_record(
        &self,
        wallet: Address,
        issuance_type: IssuanceType,
    ) -> Result<Option<IssuanceRecord>> {
        let row = sqlx::query(
            r#"
            SELECT * FROM issuance_records
            WHERE wallet = $1 AND issuance_type = $2
            ORDER BY settled_at DESC
            LIMIT 1
            "#,
        )
        .bind(wallet.as_slice())
        .bind(issuance_type.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(eyre::Error::from)?;

        row.as_ref().map(row_to_record).transpose()
    }
}
