//! Issuance request intake and queue invariants.
//!
//! The queue owns [`IssuanceRequest`]s: it validates device binding and eligibility at intake,
//! enforces the single-in-flight invariant through the store, and signals the settlement loop
//! when the backlog crosses the configured depth.

use crate::{
    binding::DeviceRegistry,
    constants::COMMITMENT_ROOT_TTL,
    eligibility,
    endpoints::EndpointRegistry,
    error::{IntakeError, LedgerError, StorageError},
    ledger::LedgerApi,
    metrics::IntakeMetrics,
    storage::{IssuerStorage, StorageApi},
    types::{IssuanceRecord, IssuanceRequest, IssuanceType, RequestId},
};
use alloy::primitives::{Address, B256, Bytes, ChainId};
use chrono::Utc;
use std::{
    sync::Arc,
    time::Instant,
};
use tokio::sync::{Notify, RwLock};
use tracing::{info, warn};

/// The issuance queue.
#[derive(Debug)]
pub struct IssuanceQueue {
    storage: IssuerStorage,
    devices: Arc<dyn DeviceRegistry>,
    ledger: Arc<dyn LedgerApi>,
    endpoints: Arc<EndpointRegistry>,
    /// The network whose published commitment root gates first issuance.
    network: ChainId,
    /// Pending depth at which the settlement loop is woken ahead of its timer.
    depth_threshold: usize,
    depth_signal: Arc<Notify>,
    /// The commitment root is re-read at most once per [`COMMITMENT_ROOT_TTL`].
    root_cache: RwLock<Option<(B256, Instant)>>,
    metrics: IntakeMetrics,
}

impl IssuanceQueue {
    /// Creates a new queue.
    pub fn new(
        storage: IssuerStorage,
        devices: Arc<dyn DeviceRegistry>,
        ledger: Arc<dyn LedgerApi>,
        endpoints: Arc<EndpointRegistry>,
        network: ChainId,
        depth_threshold: usize,
        depth_signal: Arc<Notify>,
    ) -> Self {
        Self {
            storage,
            devices,
            ledger,
            endpoints,
            network,
            depth_threshold,
            depth_signal,
            root_cache: RwLock::new(None),
            metrics: IntakeMetrics::default(),
        }
    }

    /// Enqueues a first issuance request.
    ///
    /// The membership proof is verified against the commitment root current at intake and frozen
    /// on the request; the ledger contract remains the final authority at submission time.
    pub async fn enqueue_first(
        &self,
        wallet: Address,
        user_id: String,
        device_id: String,
        proof: Bytes,
    ) -> Result<IssuanceRequest, IntakeError> {
        self.check_device(&device_id, wallet).await?;

        if self.storage.last_record(wallet, IssuanceType::First).await?.is_some() {
            return Err(self.rejected(wallet, IssuanceType::First, IntakeError::AlreadyIssued));
        }

        let root = self.commitment_root().await?;
        if !eligibility::verify_first(wallet, &proof, root) {
            return Err(self.rejected(wallet, IssuanceType::First, IntakeError::NotEligible));
        }

        self.insert(IssuanceRequest::new(
            wallet,
            user_id,
            device_id,
            IssuanceType::First,
            Some(proof),
        ))
        .await
    }

    /// Enqueues a periodic issuance request.
    pub async fn enqueue_periodic(
        &self,
        wallet: Address,
        user_id: String,
        device_id: String,
    ) -> Result<IssuanceRequest, IntakeError> {
        self.check_device(&device_id, wallet).await?;

        // First issuance must precede any periodic one.
        if self.storage.last_record(wallet, IssuanceType::First).await?.is_none() {
            return Err(self.rejected(wallet, IssuanceType::Periodic, IntakeError::NotEligible));
        }

        if let Some(last) = self.storage.last_record(wallet, IssuanceType::Periodic).await? {
            if !eligibility::verify_periodic(last.timestamp, Utc::now()) {
                return Err(self.rejected(
                    wallet,
                    IssuanceType::Periodic,
                    IntakeError::NotEligible,
                ));
            }
        }

        self.insert(IssuanceRequest::new(wallet, user_id, device_id, IssuanceType::Periodic, None))
            .await
    }

    /// Cancels a pending request owned by `user_id`.
    ///
    /// Returns `false` once the request has been picked up by a batch; callers poll
    /// [`Self::status`] instead.
    pub async fn cancel(&self, id: RequestId, user_id: &str) -> Result<bool, IntakeError> {
        let cancelled = match self.storage.cancel_request(id, user_id).await {
            Ok(cancelled) => cancelled,
            Err(StorageError::UnknownRequest(id)) => {
                return Err(IntakeError::UnknownRequest(id));
            }
            Err(err) => return Err(err.into()),
        };

        if cancelled {
            info!(target: "issuer::queue", %id, "Request cancelled");
            self.metrics.cancelled.increment(1);
        }
        Ok(cancelled)
    }

    /// Current snapshot of a request.
    pub async fn status(&self, id: RequestId) -> Result<IssuanceRequest, IntakeError> {
        self.storage.read_request(id).await?.ok_or(IntakeError::UnknownRequest(id))
    }

    /// Settled issuance records for a wallet, oldest first.
    pub async fn history(&self, wallet: Address) -> Result<Vec<IssuanceRecord>, IntakeError> {
        Ok(self.storage.read_records(wallet).await?)
    }

    async fn check_device(&self, device_id: &str, wallet: Address) -> Result<(), IntakeError> {
        if self
            .devices
            .is_device_bound_to_wallet(device_id, wallet)
            .await
            .map_err(IntakeError::Internal)?
        {
            Ok(())
        } else {
            warn!(target: "issuer::queue", %wallet, device_id, "Device mismatch at intake");
            self.metrics.rejected.increment(1);
            Err(IntakeError::DeviceMismatch)
        }
    }

    async fn insert(&self, request: IssuanceRequest) -> Result<IssuanceRequest, IntakeError> {
        match self.storage.create_request(&request).await {
            Ok(()) => {
                info!(
                    target: "issuer::queue",
                    id = %request.id,
                    wallet = %request.wallet,
                    issuance_type = %request.issuance_type,
                    "Request accepted"
                );
                self.metrics.accepted.increment(1);
                self.maybe_signal_depth().await;
                Ok(request)
            }
            Err(StorageError::InFlightExists { wallet, issuance_type }) => {
                Err(self.rejected(wallet, issuance_type, IntakeError::AlreadyInFlight))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn rejected(
        &self,
        wallet: Address,
        issuance_type: IssuanceType,
        err: IntakeError,
    ) -> IntakeError {
        warn!(
            target: "issuer::queue",
            %wallet,
            %issuance_type,
            %err,
            "Request rejected at intake"
        );
        self.metrics.rejected.increment(1);
        err
    }

    /// The commitment root current at intake, re-read through the best endpoint when the cached
    /// value expires.
    async fn commitment_root(&self) -> Result<B256, IntakeError> {
        if let Some((root, fetched_at)) = *self.root_cache.read().await {
            if fetched_at.elapsed() < COMMITMENT_ROOT_TTL {
                return Ok(root);
            }
        }

        let endpoint = self
            .endpoints
            .select(self.network)
            .map_err(|err| IntakeError::Ledger(LedgerError::Unreachable(err.to_string())))?;

        let started = Instant::now();
        match self.ledger.commitment_root(&endpoint).await {
            Ok(root) => {
                self.endpoints.report_outcome(&endpoint, true, Some(started.elapsed()));
                *self.root_cache.write().await = Some((root, Instant::now()));
                Ok(root)
            }
            Err(err) => {
                self.endpoints.report_outcome(&endpoint, false, None);
                Err(err.into())
            }
        }
    }

    async fn maybe_signal_depth(&self) {
        if let Ok(depth) = self.storage.pending_count().await {
            if depth >= self.depth_threshold {
                self.depth_signal.notify_one();
            }
        }
    }
}
