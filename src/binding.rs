//! Device binding boundary.
//!
//! The authentication layer owns the device-to-wallet binding; the issuer only consults it before
//! accepting a request. A mismatch is rejected before any queue mutation occurs.

use alloy::primitives::Address;
use async_trait::async_trait;
use dashmap::DashMap;
use std::fmt::Debug;

/// Device binding lookup.
#[async_trait]
pub trait DeviceRegistry: Debug + Send + Sync {
    /// Whether `device_id` is bound to `wallet` in the authentication layer.
    async fn is_device_bound_to_wallet(
        &self,
        device_id: &str,
        wallet: Address,
    ) -> eyre::Result<bool>;
}

/// In-memory device bindings. Used for development and testing.
#[derive(Debug, Default)]
pub struct StaticDeviceRegistry {
    bindings: DashMap<String, Address>,
}

impl StaticDeviceRegistry {
    /// Binds a device to a wallet.
    pub fn bind(&self, device_id: impl Into<String>, wallet: Address) {
        self.bindings.insert(device_id.into(), wallet);
    }
}

#[async_trait]
impl DeviceRegistry for StaticDeviceRegistry {
    async fn is_device_bound_to_wallet(
        &self,
        device_id: &str,
        wallet: Address,
    ) -> eyre::Result<bool> {
        Ok(self.bindings.get(device_id).is_some_and(|bound| *bound == wallet))
    }
}

/// Accepts every device. Used when no binding service is wired up.
#[derive(Debug, Default)]
pub struct OpenDeviceRegistry;

#[async_trait]
impl DeviceRegistry for OpenDeviceRegistry {
    async fn is_device_bound_to_wallet(&self, _: &str, _: Address) -> eyre::Result<bool> {
        Ok(true)
    }
}
