//! Device fingerprinting and per-device account limits

use std::sync::Arc;

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::db::JsonStore;
use crate::models::{DeviceBinding, DeviceSignals};
use crate::utils::error::{AppError, AppResult};

/// Tracks which accounts were registered from which device
#[derive(Clone)]
pub struct DeviceTracker {
    store: Arc<JsonStore>,
    max_accounts_per_device: usize,
}

impl DeviceTracker {
    pub fn new(store: Arc<JsonStore>, max_accounts_per_device: usize) -> Self {
        Self {
            store,
            max_accounts_per_device,
        }
    }

    pub fn max_accounts_per_device(&self) -> usize {
        self.max_accounts_per_device
    }

    /// SHA-256 hex of `"{user_agent}-{remote_addr}"`. Deterministic and
    /// spoofable; a best-effort abuse limiter, not an identity claim.
    pub fn derive_device_id(signals: &DeviceSignals) -> String {
        let mut hasher = Sha256::new();
        hasher.update(signals.user_agent.as_bytes());
        hasher.update(b"-");
        hasher.update(signals.remote_addr.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Number of accounts currently bound to the device
    pub async fn account_count(&self, device_id: &str) -> AppResult<usize> {
        let bindings = self.store.devices().read().await?;
        Ok(bindings
            .iter()
            .find(|b| b.device_id == device_id)
            .map(|b| b.accounts.len())
            .unwrap_or(0))
    }

    /// Bind an account to a device, enforcing the per-device cap. This is
    /// the authoritative check; any earlier count read is advisory only.
    pub async fn bind_account(&self, device_id: &str, account: Uuid) -> AppResult<()> {
        let mut guard = self.store.devices().write().await?;

        match guard.records.iter_mut().find(|b| b.device_id == device_id) {
            Some(binding) => {
                if binding.accounts.len() >= self.max_accounts_per_device {
                    return Err(AppError::DeviceAccountLimit {
                        max: self.max_accounts_per_device,
                    });
                }
                binding.accounts.push(account);
            }
            None => {
                guard
                    .records
                    .push(DeviceBinding::new(device_id.to_string(), account));
            }
        }

        guard.commit().await
    }
}
