//! Scriptable in-memory ledger. Used for testing.

use super::{Confirmation, LedgerApi, MintEntry};
use crate::{
    endpoints::Endpoint,
    error::LedgerError,
    types::{IssuanceType, TxRef},
};
use alloy::primitives::{B256, keccak256};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::{
    Mutex, RwLock,
    atomic::{AtomicBool, AtomicU64, Ordering},
};
use url::Url;

/// How a mock endpoint responds to requests.
#[derive(Debug, Clone)]
pub enum EndpointBehavior {
    /// Requests succeed.
    Ok,
    /// Requests time out.
    Timeout,
    /// The endpoint is unreachable.
    Unreachable,
    /// The endpoint throttles requests.
    RateLimited,
    /// The ledger rejects submissions with the given reason.
    Reject(String),
}

/// A batch recorded by the mock on submission.
#[derive(Debug, Clone)]
pub struct SubmittedBatch {
    /// Endpoint the batch was submitted through.
    pub endpoint: Url,
    /// Issuance type of the partition.
    pub issuance_type: IssuanceType,
    /// Entries in submission order.
    pub entries: Vec<MintEntry>,
    /// Reference assigned to the batch.
    pub tx_ref: TxRef,
}

/// [`LedgerApi`] implementation backed by scriptable per-endpoint behavior.
#[derive(Debug)]
pub struct MockLedger {
    behaviors: DashMap<Url, EndpointBehavior>,
    root: RwLock<B256>,
    submissions: Mutex<Vec<SubmittedBatch>>,
    confirmations: DashMap<TxRef, Confirmation>,
    /// When set, submissions are immediately confirmed.
    auto_confirm: AtomicBool,
    counter: AtomicU64,
}

impl MockLedger {
    /// Creates a mock ledger publishing the given commitment root.
    pub fn new(root: B256) -> Self {
        Self {
            behaviors: DashMap::new(),
            root: RwLock::new(root),
            submissions: Mutex::new(Vec::new()),
            confirmations: DashMap::new(),
            auto_confirm: AtomicBool::new(true),
            counter: AtomicU64::new(0),
        }
    }

    /// Scripts how the endpoint at `url` responds from now on.
    pub fn set_behavior(&self, url: &Url, behavior: EndpointBehavior) {
        self.behaviors.insert(url.clone(), behavior);
    }

    /// Replaces the published commitment root.
    pub fn set_root(&self, root: B256) {
        *self.root.write().unwrap() = root;
    }

    /// Controls whether submissions confirm immediately.
    pub fn set_auto_confirm(&self, on: bool) {
        self.auto_confirm.store(on, Ordering::Relaxed);
    }

    /// Marks a previously submitted batch as confirmed.
    pub fn confirm(&self, tx_ref: TxRef) {
        self.confirmations.insert(
            tx_ref,
            Confirmation { confirmed: true, block_height: Some(1), reverted: None },
        );
    }

    /// Marks a previously submitted batch as reverted.
    pub fn revert(&self, tx_ref: TxRef, reason: &str) {
        self.confirmations.insert(
            tx_ref,
            Confirmation { confirmed: false, block_height: None, reverted: Some(reason.into()) },
        );
    }

    /// All batches submitted so far, in submission order.
    pub fn submissions(&self) -> Vec<SubmittedBatch> {
        self.submissions.lock().unwrap().clone()
    }

    fn check(&self, endpoint: &Endpoint) -> Result<(), LedgerError> {
        match self.behaviors.get(&endpoint.url).map(|b| b.clone()) {
            None | Some(EndpointBehavior::Ok) => Ok(()),
            Some(EndpointBehavior::Timeout) => Err(LedgerError::Timeout),
            Some(EndpointBehavior::Unreachable) => {
                Err(LedgerError::Unreachable("connection refused".into()))
            }
            Some(EndpointBehavior::RateLimited) => Err(LedgerError::RateLimited),
            Some(EndpointBehavior::Reject(reason)) => Err(LedgerError::Rejected { reason }),
        }
    }

    fn next_ref(&self) -> TxRef {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        TxRef(keccak256(n.to_be_bytes()))
    }
}

#[async_trait]
impl LedgerApi for MockLedger {
    async fn submit_batch_mint(
        &self,
        endpoint: &Endpoint,
        issuance_type: IssuanceType,
        entries: &[MintEntry],
    ) -> Result<TxRef, LedgerError> {
        self.check(endpoint)?;

        let tx_ref = self.next_ref();
        self.submissions.lock().unwrap().push(SubmittedBatch {
            endpoint: endpoint.url.clone(),
            issuance_type,
            entries: entries.to_vec(),
            tx_ref,
        });
        self.confirmations.insert(
            tx_ref,
            Confirmation {
                confirmed: self.auto_confirm.load(Ordering::Relaxed),
                block_height: Some(1),
                reverted: None,
            },
        );
        Ok(tx_ref)
    }

    async fn get_confirmation(
        &self,
        endpoint: &Endpoint,
        tx_ref: TxRef,
    ) -> Result<Confirmation, LedgerError> {
        self.check(endpoint)?;
        Ok(self
            .confirmations
            .get(&tx_ref)
            .map(|c| c.clone())
            .unwrap_or(Confirmation { confirmed: false, block_height: None, reverted: None }))
    }

    async fn commitment_root(&self, endpoint: &Endpoint) -> Result<B256, LedgerError> {
        self.check(endpoint)?;
        Ok(*self.root.read().unwrap())
    }

    async fn probe(&self, endpoint: &Endpoint) -> Result<(), LedgerError> {
        self.check(endpoint)
    }
}
