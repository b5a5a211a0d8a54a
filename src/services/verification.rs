//! Key verification
//!
//! The verify path is the hot path and the only one that mutates key
//! records outside admin operations. The whole check-then-update cycle runs
//! under the keys collection lock so two devices racing for the last slot
//! can never both win it.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::db::JsonStore;
use crate::models::{KeyInfo, VerifyOutcome, ADMIN_OWNER};
use crate::services::signing::SigningService;
use crate::utils::error::{AppError, AppResult};

#[derive(Clone)]
pub struct VerificationService {
    store: Arc<JsonStore>,
    signing: SigningService,
}

impl VerificationService {
    pub fn new(store: Arc<JsonStore>, signing: SigningService) -> Self {
        Self { store, signing }
    }

    /// Verify a key for a device.
    ///
    /// Checks run in a fixed order: existence, signature, expiry, device
    /// membership, capacity. Expiry and exhausted capacity are soft
    /// outcomes; an unknown code or a bad signature is an error. Every
    /// successful verification bumps the key's counters, including repeat
    /// verifications from an already-bound device.
    pub async fn verify(&self, key_code: &str, device_id: &str) -> AppResult<VerifyOutcome> {
        let now = Utc::now();
        let mut guard = self.store.keys().write().await?;

        let key = guard
            .records
            .iter_mut()
            .find(|k| k.key_code == key_code)
            .ok_or_else(|| AppError::KeyNotFound(key_code.to_string()))?;

        if !self.signing.verify(&key.key_code, &key.signature) {
            warn!(key_code = %key.key_code, "Stored key signature does not match");
            return Err(AppError::SignatureMismatch(key.key_code.clone()));
        }

        if key.is_expired_at(now) {
            return Ok(VerifyOutcome::Expired {
                expired_at: key.expires_at,
            });
        }

        let known_device = key.devices.iter().any(|d| d == device_id);
        if !known_device {
            if key.devices.len() >= key.allowed_devices as usize {
                return Ok(VerifyOutcome::DeviceLimitReached {
                    devices_used: key.devices.len(),
                    devices_allowed: key.allowed_devices,
                });
            }
            key.devices.push(device_id.to_string());
        }

        key.total_verifications += 1;
        key.last_verified = Some(now);

        let outcome = VerifyOutcome::Valid {
            key_type: key.key_type.clone(),
            expires_at: key.expires_at,
            devices_remaining: key.devices_remaining(),
            alias: key.alias_name.clone(),
        };
        let owner_id = key.owner_id.clone();

        guard.commit().await?;
        info!(key_code, new_device = !known_device, "Key verified");

        self.bump_owner_verifications(&owner_id).await;
        Ok(outcome)
    }

    /// Read-only key details; never mutates the record
    pub async fn info(&self, key_code: &str) -> AppResult<KeyInfo> {
        let now = Utc::now();
        let keys = self.store.keys().read().await?;
        let key = keys
            .iter()
            .find(|k| k.key_code == key_code)
            .ok_or_else(|| AppError::KeyNotFound(key_code.to_string()))?;

        if !self.signing.verify(&key.key_code, &key.signature) {
            return Err(AppError::SignatureMismatch(key.key_code.clone()));
        }

        Ok(KeyInfo {
            key_type: key.key_type.clone(),
            created_at: key.created_at,
            expires_at: key.expires_at,
            is_expired: key.is_expired_at(now),
            days_remaining: key.days_remaining(now),
            devices_used: key.devices.len(),
            devices_allowed: key.allowed_devices,
            require_api_key: key.require_api_key,
            total_verifications: key.total_verifications,
            last_verified: key.last_verified,
            is_custom: key.is_custom,
            alias_name: key.alias_name.clone(),
        })
    }

    /// Best-effort owner counter bump; admin-owned keys have no user record
    async fn bump_owner_verifications(&self, owner_id: &str) {
        if owner_id == ADMIN_OWNER {
            return;
        }
        let result = async {
            let mut guard = self.store.users().write().await?;
            if let Some(user) = guard
                .records
                .iter_mut()
                .find(|u| u.id.to_string() == owner_id)
            {
                user.total_verifications += 1;
                guard.commit().await?;
            }
            Ok::<_, AppError>(())
        }
        .await;

        if let Err(err) = result {
            warn!(owner = %owner_id, error = %err, "Failed to update owner verification counter");
        }
    }
}
