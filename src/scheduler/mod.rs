//! Batch settlement scheduler.
//!
//! A single recurring control loop drains the queue into bounded batches, submits them through
//! the best available ledger endpoint and reconciles the outcome back into the store. Ticks are
//! strictly serial; a trigger that lands while a tick is running coalesces into at most one
//! immediate follow-up.

use crate::{
    config::{IssuanceConfig, SchedulerConfig},
    constants::{CONFIRMATION_BACKOFF, CONFIRMATION_MAX_ATTEMPTS},
    endpoints::{Endpoint, EndpointRegistry},
    ledger::{LedgerApi, MintEntry},
    metrics::SchedulerMetrics,
    storage::{IssuerStorage, StorageApi},
    types::{IssuanceRecord, IssuanceRequest, IssuanceType, RequestId, TxRef},
};
use chrono::Utc;
use std::{collections::HashMap, sync::Arc, time::Instant};
use tokio::{sync::Notify, task::JoinHandle, time::MissedTickBehavior};
use tracing::{error, info, warn};

/// The batch settlement scheduler.
#[derive(Debug)]
pub struct SettlementScheduler {
    storage: IssuerStorage,
    ledger: Arc<dyn LedgerApi>,
    endpoints: Arc<EndpointRegistry>,
    config: SchedulerConfig,
    issuance: IssuanceConfig,
    /// Signalled by the queue when the pending depth crosses the configured threshold.
    depth_signal: Arc<Notify>,
    metrics: SchedulerMetrics,
    /// Consecutive ticks that found no healthy endpoint.
    exhausted_ticks: u32,
}

impl SettlementScheduler {
    /// Creates a new scheduler.
    pub fn new(
        storage: IssuerStorage,
        ledger: Arc<dyn LedgerApi>,
        endpoints: Arc<EndpointRegistry>,
        config: SchedulerConfig,
        issuance: IssuanceConfig,
        depth_signal: Arc<Notify>,
    ) -> Self {
        Self {
            storage,
            ledger,
            endpoints,
            config,
            issuance,
            depth_signal,
            metrics: SchedulerMetrics::default(),
            exhausted_ticks: 0,
        }
    }

    /// Spawns the recurring control loop.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        let mut timer = tokio::time::interval(self.config.tick_interval);
        // The select below only resumes once the previous tick returned, so ticks never overlap;
        // Skip drops timer fires that land mid-tick instead of queueing them.
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        timer.tick().await;

        loop {
            tokio::select! {
                _ = timer.tick() => {}
                _ = self.depth_signal.notified() => {}
            }

            if let Err(err) = self.tick().await {
                error!(target: "issuer::scheduler", %err, "Settlement tick failed");
            }
        }
    }

    /// Runs one settlement tick.
    pub async fn tick(&mut self) -> eyre::Result<()> {
        self.reconcile_submitted().await?;

        let batch = self.storage.claim_batch(self.config.max_batch_size).await?;
        self.metrics.queue_depth.set(self.storage.pending_count().await? as f64);
        if batch.is_empty() {
            return Ok(());
        }
        self.metrics.batch_size.record(batch.len() as f64);

        // The ledger has distinct mint entry points per type. Insertion order is preserved
        // within each partition.
        let (first, periodic): (Vec<_>, Vec<_>) =
            batch.into_iter().partition(|request| request.issuance_type == IssuanceType::First);

        let mut exhausted = false;
        for (issuance_type, partition) in
            [(IssuanceType::First, first), (IssuanceType::Periodic, periodic)]
        {
            if partition.is_empty() {
                continue;
            }
            exhausted |= !self.settle_partition(issuance_type, partition).await?;
        }

        if exhausted {
            self.note_exhausted();
        } else {
            self.exhausted_ticks = 0;
        }
        Ok(())
    }

    /// Submits one partition, returning `false` when no healthy endpoint was available.
    async fn settle_partition(
        &mut self,
        issuance_type: IssuanceType,
        partition: Vec<IssuanceRequest>,
    ) -> eyre::Result<bool> {
        let endpoint = match self.endpoints.select(self.issuance.network) {
            Ok(endpoint) => endpoint,
            Err(err) => {
                self.handle_transient(&partition, &err.to_string()).await?;
                return Ok(false);
            }
        };

        let entries: Vec<_> = partition
            .iter()
            .map(|request| MintEntry { wallet: request.wallet, proof: request.proof.clone() })
            .collect();
        let ids = request_ids(&partition);

        let started = Instant::now();
        match self.ledger.submit_batch_mint(&endpoint, issuance_type, &entries).await {
            Ok(tx_ref) => {
                self.endpoints.report_outcome(&endpoint, true, Some(started.elapsed()));
                self.storage.mark_submitted(&ids, tx_ref).await?;
                self.metrics.batches_submitted.increment(1);
                info!(
                    target: "issuer::scheduler",
                    %tx_ref,
                    %issuance_type,
                    size = partition.len(),
                    endpoint = %endpoint.url,
                    "Batch submitted"
                );
                self.finalize(&endpoint, tx_ref, &partition).await?;
            }
            Err(err) if err.is_transient() => {
                self.endpoints.report_outcome(&endpoint, false, None);
                warn!(
                    target: "issuer::scheduler",
                    %err,
                    %issuance_type,
                    endpoint = %endpoint.url,
                    "Transient settlement failure"
                );
                self.handle_transient(&partition, &err.to_string()).await?;
            }
            Err(err) => {
                // The endpoint answered; the ledger itself rejected the batch.
                self.endpoints.report_outcome(&endpoint, true, Some(started.elapsed()));
                self.storage.mark_failed(&ids, &err.to_string()).await?;
                self.metrics.requests_failed.increment(ids.len() as u64);
                error!(
                    target: "issuer::scheduler",
                    %err,
                    %issuance_type,
                    size = partition.len(),
                    "Batch permanently rejected"
                );
            }
        }
        Ok(true)
    }

    /// Polls a submitted batch to confirmation with bounded backoff.
    ///
    /// A batch still unconfirmed when the attempts run out stays `submitted`; the next tick picks
    /// it up again in [`Self::reconcile_submitted`].
    async fn finalize(
        &mut self,
        endpoint: &Endpoint,
        tx_ref: TxRef,
        partition: &[IssuanceRequest],
    ) -> eyre::Result<()> {
        let submitted_at = Instant::now();
        let mut delay = CONFIRMATION_BACKOFF;

        for attempt in 0..CONFIRMATION_MAX_ATTEMPTS {
            match self.ledger.get_confirmation(endpoint, tx_ref).await {
                Ok(confirmation) if confirmation.confirmed => {
                    self.complete(tx_ref, partition).await?;
                    self.metrics
                        .confirmation_time
                        .record(submitted_at.elapsed().as_millis() as f64);
                    return Ok(());
                }
                Ok(confirmation) => {
                    if let Some(reason) = confirmation.reverted {
                        self.fail_reverted(tx_ref, partition, &reason).await?;
                        return Ok(());
                    }
                }
                Err(err) => {
                    warn!(target: "issuer::scheduler", %err, %tx_ref, attempt, "Confirmation poll failed");
                }
            }

            if attempt + 1 < CONFIRMATION_MAX_ATTEMPTS {
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
        }

        info!(target: "issuer::scheduler", %tx_ref, "Batch not confirmed yet, deferring to next tick");
        Ok(())
    }

    /// Re-polls batches left `submitted` by earlier ticks (or a previous run of the process).
    async fn reconcile_submitted(&mut self) -> eyre::Result<()> {
        let submitted = self.storage.read_submitted().await?;
        if submitted.is_empty() {
            return Ok(());
        }
        let Ok(endpoint) = self.endpoints.select(self.issuance.network) else {
            return Ok(());
        };

        let mut batches: HashMap<TxRef, Vec<IssuanceRequest>> = HashMap::new();
        for request in submitted {
            if let Some(tx_ref) = request.transaction_ref {
                batches.entry(tx_ref).or_default().push(request);
            }
        }

        for (tx_ref, requests) in batches {
            match self.ledger.get_confirmation(&endpoint, tx_ref).await {
                Ok(confirmation) if confirmation.confirmed => {
                    self.complete(tx_ref, &requests).await?;
                }
                Ok(confirmation) => {
                    if let Some(reason) = confirmation.reverted {
                        self.fail_reverted(tx_ref, &requests, &reason).await?;
                    }
                }
                Err(err) => {
                    warn!(target: "issuer::scheduler", %err, %tx_ref, "Reconciliation poll failed");
                }
            }
        }
        Ok(())
    }

    /// Writes the issuance records for a confirmed batch and completes its requests.
    async fn complete(&mut self, tx_ref: TxRef, partition: &[IssuanceRequest]) -> eyre::Result<()> {
        for request in partition {
            let record = IssuanceRecord {
                wallet: request.wallet,
                issuance_type: request.issuance_type,
                amount: self.issuance.amount,
                transaction_ref: tx_ref,
                device_id: request.device_id.clone(),
                timestamp: Utc::now(),
            };
            if let Err(err) = self.storage.write_record(&record).await {
                // An existing record means an earlier run already settled this wallet; the
                // request transition below still has to happen.
                warn!(
                    target: "issuer::scheduler",
                    %err,
                    wallet = %request.wallet,
                    "Skipping issuance record write"
                );
            }
        }

        self.storage.mark_completed(&request_ids(partition)).await?;
        self.metrics.requests_completed.increment(partition.len() as u64);
        info!(
            target: "issuer::scheduler",
            %tx_ref,
            size = partition.len(),
            "Batch confirmed and completed"
        );
        Ok(())
    }

    async fn fail_reverted(
        &mut self,
        tx_ref: TxRef,
        partition: &[IssuanceRequest],
        reason: &str,
    ) -> eyre::Result<()> {
        self.storage
            .mark_failed(&request_ids(partition), &format!("reverted on ledger: {reason}"))
            .await?;
        self.metrics.requests_failed.increment(partition.len() as u64);
        error!(
            target: "issuer::scheduler",
            %tx_ref,
            reason,
            size = partition.len(),
            "Batch reverted on ledger"
        );
        Ok(())
    }

    /// Reverts a partition for retry, failing requests whose retry budget is spent.
    async fn handle_transient(
        &mut self,
        partition: &[IssuanceRequest],
        reason: &str,
    ) -> eyre::Result<()> {
        let (spent, retryable): (Vec<_>, Vec<_>) = partition
            .iter()
            .partition(|request| request.retry_count >= self.config.max_retries);

        if !spent.is_empty() {
            let ids: Vec<_> = spent.iter().map(|request| request.id).collect();
            self.storage.mark_failed(&ids, &format!("retries exhausted: {reason}")).await?;
            self.metrics.requests_failed.increment(ids.len() as u64);
            error!(
                target: "issuer::scheduler",
                count = ids.len(),
                reason,
                "Requests failed after exhausting retries"
            );
        }

        if !retryable.is_empty() {
            let ids: Vec<_> = retryable.iter().map(|request| request.id).collect();
            self.storage.revert_to_pending(&ids, reason).await?;
            self.metrics.requests_retried.increment(ids.len() as u64);
        }
        Ok(())
    }

    fn note_exhausted(&mut self) {
        self.exhausted_ticks += 1;
        self.metrics.exhausted_ticks.increment(1);
        if self.exhausted_ticks >= self.config.exhausted_tick_alert {
            error!(
                target: "issuer::scheduler",
                consecutive = self.exhausted_ticks,
                "No healthy ledger endpoint for consecutive settlement ticks"
            );
        }
    }
}

fn request_ids(requests: &[IssuanceRequest]) -> Vec<RequestId> {
    requests.iter().map(|request| request.id).collect()
}
