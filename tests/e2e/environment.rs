//! In-process test environment: in-memory storage, mock ledger, two-endpoint pool and a
//! manually ticked settlement scheduler.

use super::MembershipTree;
use alloy::primitives::{Address, B256, ChainId, U256};
use chrono::{Duration as ChronoDuration, Utc};
use issuer::{
    binding::{DeviceRegistry, StaticDeviceRegistry},
    config::{IssuanceConfig, SchedulerConfig},
    endpoints::EndpointRegistry,
    error::IntakeError,
    ledger::{LedgerApi, MockLedger},
    queue::IssuanceQueue,
    scheduler::SettlementScheduler,
    storage::{IssuerStorage, StorageApi},
    types::{IssuanceRecord, IssuanceRequest, IssuanceType, RequestId, TxRef},
};
use std::{sync::Arc, time::Duration};
use tokio::sync::Notify;
use url::Url;

/// The network every test settles on.
pub const NETWORK: ChainId = 1;

pub fn url_a() -> Url {
    "http://ledger-a:8545/".parse().unwrap()
}

pub fn url_b() -> Url {
    "http://ledger-b:8545/".parse().unwrap()
}

pub fn device(wallet: Address) -> String {
    format!("device-{wallet}")
}

pub fn user(wallet: Address) -> String {
    format!("user-{wallet}")
}

pub struct Environment {
    pub storage: IssuerStorage,
    pub queue: Arc<IssuanceQueue>,
    pub scheduler: SettlementScheduler,
    pub ledger: Arc<MockLedger>,
    pub endpoints: Arc<EndpointRegistry>,
    pub devices: Arc<StaticDeviceRegistry>,
    pub tree: MembershipTree,
}

impl Environment {
    /// An environment whose membership tree contains `wallets`, each bound to its own device.
    pub fn new(wallets: &[Address]) -> Self {
        Self::with_scheduler_config(wallets, SchedulerConfig {
            max_batch_size: 10,
            tick_interval: Duration::from_millis(10),
            queue_depth_threshold: 1000,
            max_retries: 3,
            exhausted_tick_alert: 2,
        })
    }

    pub fn with_scheduler_config(wallets: &[Address], config: SchedulerConfig) -> Self {
        let tree = MembershipTree::new(wallets);
        let ledger = Arc::new(MockLedger::new(tree.root()));
        let endpoints =
            Arc::new(EndpointRegistry::new([(NETWORK, vec![url_a(), url_b()])], 2));
        let storage = IssuerStorage::in_memory();

        let devices = Arc::new(StaticDeviceRegistry::default());
        for wallet in wallets {
            devices.bind(device(*wallet), *wallet);
        }

        let depth_signal = Arc::new(Notify::new());
        let issuance = IssuanceConfig { network: NETWORK, amount: U256::from(100) };

        let devices_dyn: Arc<dyn DeviceRegistry> = devices.clone();
        let ledger_dyn: Arc<dyn LedgerApi> = ledger.clone();
        let queue = Arc::new(IssuanceQueue::new(
            storage.clone(),
            devices_dyn,
            ledger_dyn.clone(),
            endpoints.clone(),
            NETWORK,
            config.queue_depth_threshold,
            depth_signal.clone(),
        ));

        let scheduler = SettlementScheduler::new(
            storage.clone(),
            ledger_dyn,
            endpoints.clone(),
            config,
            issuance,
            depth_signal,
        );

        Self { storage, queue, scheduler, ledger, endpoints, devices, tree }
    }

    /// Enqueues a first issuance with the wallet's valid membership proof.
    pub async fn enqueue_first(&self, wallet: Address) -> Result<IssuanceRequest, IntakeError> {
        self.queue
            .enqueue_first(wallet, user(wallet), device(wallet), self.tree.proof(wallet))
            .await
    }

    pub async fn enqueue_periodic(&self, wallet: Address) -> Result<IssuanceRequest, IntakeError> {
        self.queue.enqueue_periodic(wallet, user(wallet), device(wallet)).await
    }

    /// Runs one settlement tick.
    pub async fn tick(&mut self) {
        self.scheduler.tick().await.expect("settlement tick failed");
    }

    pub async fn status(&self, id: RequestId) -> IssuanceRequest {
        self.queue.status(id).await.expect("unknown request")
    }

    /// Seeds a settled issuance record `age_days` in the past.
    pub async fn seed_record(&self, wallet: Address, issuance_type: IssuanceType, age_days: i64) {
        self.storage
            .write_record(&IssuanceRecord {
                wallet,
                issuance_type,
                amount: U256::from(100),
                transaction_ref: TxRef(B256::with_last_byte(0xfe)),
                device_id: device(wallet),
                timestamp: Utc::now() - ChronoDuration::days(age_days),
            })
            .await
            .expect("seeding record failed");
    }
}
