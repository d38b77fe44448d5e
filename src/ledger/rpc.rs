//! JSON-RPC ledger client.

use super::{Confirmation, LedgerApi, MintEntry};
use crate::{
    endpoints::Endpoint,
    error::LedgerError,
    types::{IssuanceType, TxRef},
};
use alloy::primitives::{Address, B256};
use async_trait::async_trait;
use dashmap::DashMap;
use jsonrpsee::{
    core::RpcResult,
    http_client::{HttpClient, HttpClientBuilder},
    proc_macros::rpc,
};
use std::{fmt, time::Duration};
use url::Url;

/// The ledger's `ledger_` wire API.
///
/// Distinct mint entry points per issuance type; periodic mints carry no proofs.
#[rpc(client, namespace = "ledger")]
trait LedgerRpc {
    /// Mints first issuance for a batch of wallets with membership proofs.
    #[method(name = "mintFirstBatch")]
    async fn mint_first_batch(&self, entries: Vec<MintEntry>) -> RpcResult<TxRef>;

    /// Mints periodic issuance for a batch of wallets.
    #[method(name = "mintPeriodicBatch")]
    async fn mint_periodic_batch(&self, wallets: Vec<Address>) -> RpcResult<TxRef>;

    /// Confirmation state of a submitted batch.
    #[method(name = "getConfirmation")]
    async fn get_confirmation(&self, tx_ref: TxRef) -> RpcResult<Confirmation>;

    /// The currently published commitment root.
    #[method(name = "commitmentRoot")]
    async fn commitment_root(&self) -> RpcResult<B256>;

    /// Current ledger block height. Used as a liveness probe.
    #[method(name = "blockHeight")]
    async fn block_height(&self) -> RpcResult<u64>;
}

/// [`LedgerApi`] implementation over per-endpoint JSON-RPC HTTP clients.
///
/// Clients are built lazily per endpoint URL and cached; every request carries the configured
/// bounded timeout, so a stuck endpoint surfaces as [`LedgerError::Timeout`] rather than hanging
/// a scheduler tick.
pub struct RpcLedger {
    request_timeout: Duration,
    clients: DashMap<Url, HttpClient>,
}

impl RpcLedger {
    /// Creates a new ledger client with the given per-request timeout.
    pub fn new(request_timeout: Duration) -> Self {
        Self { request_timeout, clients: DashMap::new() }
    }

    fn client(&self, endpoint: &Endpoint) -> Result<HttpClient, LedgerError> {
        if let Some(client) = self.clients.get(&endpoint.url) {
            return Ok(client.clone());
        }

        let client = HttpClientBuilder::default()
            .request_timeout(self.request_timeout)
            .build(endpoint.url.as_str())?;
        self.clients.insert(endpoint.url.clone(), client.clone());
        Ok(client)
    }
}

impl fmt::Debug for RpcLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcLedger")
            .field("request_timeout", &self.request_timeout)
            .field("clients", &self.clients.len())
            .finish()
    }
}

#[async_trait]
impl LedgerApi for RpcLedger {
    async fn submit_batch_mint(
        &self,
        endpoint: &Endpoint,
        issuance_type: IssuanceType,
        entries: &[MintEntry],
    ) -> Result<TxRef, LedgerError> {
        let client = self.client(endpoint)?;
        match issuance_type {
            IssuanceType::First => {
                client.mint_first_batch(entries.to_vec()).await.map_err(LedgerError::from)
            }
            IssuanceType::Periodic => {
                let wallets = entries.iter().map(|entry| entry.wallet).collect();
                client.mint_periodic_batch(wallets).await.map_err(LedgerError::from)
            }
        }
    }

    async fn get_confirmation(
        &self,
        endpoint: &Endpoint,
        tx_ref: TxRef,
    ) -> Result<Confirmation, LedgerError> {
        Ok(self.client(endpoint)?.get_confirmation(tx_ref).await?)
    }

    async fn commitment_root(&self, endpoint: &Endpoint) -> Result<B256, LedgerError> {
        Ok(self.client(endpoint)?.commitment_root().await?)
    }

    async fn probe(&self, endpoint: &Endpoint) -> Result<(), LedgerError> {
        self.client(endpoint)?.block_height().await?;
        Ok(())
    }
}
