//! Key lifecycle: creation, listing, deletion, expiry sweep, stats

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::db::JsonStore;
use crate::models::{
    Actor, BulkCreateKeysRequest, CreateKeyRequest, KeyRecord, KeySummary, SystemStats,
    ADMIN_OWNER,
};
use crate::services::keygen::KeyFactory;
use crate::services::signing::SigningService;
use crate::services::ActivityLog;
use crate::utils::error::{AppError, AppResult};
use crate::utils::validation::{validate_custom_code, validate_type_tag};

const DEFAULT_KEY_TYPE: &str = "KEY";

#[derive(Clone)]
pub struct KeyLifecycleService {
    store: Arc<JsonStore>,
    signing: SigningService,
    factory: KeyFactory,
    activity: ActivityLog,
}

impl KeyLifecycleService {
    pub fn new(store: Arc<JsonStore>, signing: SigningService, activity: ActivityLog) -> Self {
        Self {
            store,
            signing,
            factory: KeyFactory::new(),
            activity,
        }
    }

    /// Create a single key owned by the actor. Admin-created keys are owned
    /// by the `"admin"` sentinel and bypass per-user counters.
    pub async fn create_key(
        &self,
        actor: &Actor,
        request: &CreateKeyRequest,
    ) -> AppResult<KeyRecord> {
        request.validate()?;
        self.ensure_active_owner(actor).await?;
        self.enforce_max_days(actor, request.days).await?;

        let key_type = resolve_key_type(request.key_type.as_deref())?;
        let lifetime = key_lifetime(request.days)?;

        let record = {
            let mut guard = self.store.keys().write().await?;

            let (key_code, is_custom) = match request.custom_code.as_deref() {
                Some(code) => {
                    if !validate_custom_code(code) {
                        return Err(AppError::Validation(
                            "Custom key code must be non-empty and at most 128 characters"
                                .to_string(),
                        ));
                    }
                    let code = code.trim().to_string();
                    if guard.records.iter().any(|k| k.key_code == code) {
                        return Err(AppError::DuplicateKeyCode(code));
                    }
                    (code, true)
                }
                None => {
                    let existing: HashSet<String> =
                        guard.records.iter().map(|k| k.key_code.clone()).collect();
                    (self.factory.generate_key_code(&key_type, &existing)?, false)
                }
            };

            let now = Utc::now();
            let record = KeyRecord {
                id: Uuid::new_v4(),
                signature: self.signing.sign(&key_code),
                key_code,
                key_type,
                created_at: now,
                expires_at: now + lifetime,
                allowed_devices: request.devices,
                devices: Vec::new(),
                owner_id: owner_id(actor),
                owner_username: actor.username.clone(),
                require_api_key: false,
                total_verifications: 0,
                last_verified: None,
                is_custom,
                auto_delete: request.auto_delete,
                alias_name: request.alias.clone(),
            };
            guard.records.push(record.clone());
            guard.commit().await?;
            record
        };

        if !actor.is_admin() {
            self.bump_owner_counters(actor, 1).await;
        }

        info!(key_code = %record.key_code, owner = %record.owner_username, "Created key");
        self.activity
            .record(
                actor,
                "create_key",
                serde_json::json!({
                    "key_code": record.key_code,
                    "type": record.key_type,
                    "days": request.days,
                    "devices": request.devices,
                }),
            )
            .await;

        Ok(record)
    }

    /// Create a batch of generated keys in one atomic store update
    pub async fn bulk_create_keys(
        &self,
        actor: &Actor,
        request: &BulkCreateKeysRequest,
    ) -> AppResult<Vec<KeyRecord>> {
        request.validate()?;
        self.ensure_active_owner(actor).await?;
        self.enforce_max_days(actor, request.days).await?;

        let key_type = resolve_key_type(request.key_type.as_deref())?;
        let lifetime = key_lifetime(request.days)?;

        let created = {
            let mut guard = self.store.keys().write().await?;
            let mut existing: HashSet<String> =
                guard.records.iter().map(|k| k.key_code.clone()).collect();

            let now = Utc::now();
            let expires_at = now + lifetime;
            let mut created = Vec::with_capacity(request.count as usize);

            for _ in 0..request.count {
                let key_code = self.factory.generate_key_code(&key_type, &existing)?;
                existing.insert(key_code.clone());
                created.push(KeyRecord {
                    id: Uuid::new_v4(),
                    signature: self.signing.sign(&key_code),
                    key_code,
                    key_type: key_type.clone(),
                    created_at: now,
                    expires_at,
                    allowed_devices: request.devices,
                    devices: Vec::new(),
                    owner_id: owner_id(actor),
                    owner_username: actor.username.clone(),
                    require_api_key: false,
                    total_verifications: 0,
                    last_verified: None,
                    is_custom: false,
                    auto_delete: request.auto_delete,
                    alias_name: request.alias.clone(),
                });
            }

            guard.records.extend(created.iter().cloned());
            guard.commit().await?;
            created
        };

        if !actor.is_admin() {
            self.bump_owner_counters(actor, created.len() as u64).await;
        }

        info!(count = created.len(), owner = %actor.username, "Bulk-created keys");
        self.activity
            .record(
                actor,
                "bulk_create_keys",
                serde_json::json!({
                    "count": created.len(),
                    "type": key_type,
                    "days": request.days,
                }),
            )
            .await;

        Ok(created)
    }

    /// Delete a key by code. Non-admin actors may only delete their own.
    pub async fn delete_key(&self, actor: &Actor, key_code: &str) -> AppResult<()> {
        let removed = {
            let mut guard = self.store.keys().write().await?;
            let position = guard
                .records
                .iter()
                .position(|k| k.key_code == key_code)
                .ok_or_else(|| AppError::KeyNotFound(key_code.to_string()))?;

            if !actor.is_admin() && guard.records[position].owner_id != actor.id {
                // Do not leak whether a foreign key code exists
                return Err(AppError::KeyNotFound(key_code.to_string()));
            }

            let removed = guard.records.remove(position);
            guard.commit().await?;
            removed
        };

        if removed.owner_id != ADMIN_OWNER {
            self.decrement_key_count(&removed.owner_id, 1).await;
        }

        self.activity
            .record(
                actor,
                "delete_key",
                serde_json::json!({ "key_code": removed.key_code }),
            )
            .await;
        Ok(())
    }

    /// Remove every key owned by the user; used when the account is deleted
    pub async fn delete_keys_for_owner(&self, owner_id: &str) -> AppResult<usize> {
        let mut guard = self.store.keys().write().await?;
        let before = guard.records.len();
        guard.records.retain(|k| k.owner_id != owner_id);
        let removed = before - guard.records.len();
        if removed > 0 {
            guard.commit().await?;
        }
        Ok(removed)
    }

    /// Keys owned by the actor, as owner-facing summaries
    pub async fn list_for_owner(&self, actor: &Actor) -> AppResult<Vec<KeySummary>> {
        let now = Utc::now();
        let keys = self.store.keys().read().await?;
        Ok(keys
            .iter()
            .filter(|k| k.owner_id == actor.id)
            .map(|k| KeySummary::from_record(k, now))
            .collect())
    }

    /// Every key in the store; admin-only in the outer layer
    pub async fn list_all(&self) -> AppResult<Vec<KeyRecord>> {
        self.store.keys().read().await
    }

    /// Purge keys that are both expired and flagged for auto-deletion.
    /// Expired keys without the flag are retained indefinitely.
    pub async fn sweep_expired(&self) -> AppResult<usize> {
        let now = Utc::now();
        let mut guard = self.store.keys().write().await?;
        let before = guard.records.len();
        guard
            .records
            .retain(|k| !(k.auto_delete && k.is_expired_at(now)));
        let removed = before - guard.records.len();
        if removed > 0 {
            guard.commit().await?;
            info!(removed, "Expiry sweep purged keys");
        }
        Ok(removed)
    }

    /// Aggregate counts recomputed from the collections, not the cached
    /// per-user counters.
    pub async fn stats(&self) -> AppResult<SystemStats> {
        let now = Utc::now();
        let users = self.store.users().read().await?;
        let keys = self.store.keys().read().await?;

        let expired_keys = keys.iter().filter(|k| k.is_expired_at(now)).count();
        Ok(SystemStats {
            total_users: users.len(),
            active_users: users.iter().filter(|u| u.is_active && !u.is_banned).count(),
            banned_users: users.iter().filter(|u| u.is_banned).count(),
            total_keys: keys.len(),
            active_keys: keys.len() - expired_keys,
            expired_keys,
            total_verifications: keys.iter().map(|k| k.total_verifications).sum(),
        })
    }

    /// Non-admin key creation requires a live, unbanned owner account
    async fn ensure_active_owner(&self, actor: &Actor) -> AppResult<()> {
        if actor.is_admin() {
            return Ok(());
        }
        let users = self.store.users().read().await?;
        let user = users
            .iter()
            .find(|u| u.id.to_string() == actor.id)
            .ok_or_else(|| AppError::UserNotFound(actor.id.clone()))?;
        if user.is_banned {
            return Err(AppError::AccountBanned);
        }
        if !user.is_active {
            return Err(AppError::AccountDisabled);
        }
        Ok(())
    }

    async fn enforce_max_days(&self, actor: &Actor, days: i64) -> AppResult<()> {
        if actor.is_admin() {
            return Ok(());
        }
        let settings = self.store.settings().read().await?;
        if days > settings.max_key_days {
            return Err(AppError::MaxDaysExceeded {
                requested: days,
                max: settings.max_key_days,
            });
        }
        Ok(())
    }

    /// Counter updates are best-effort; a failure here leaves cached counts
    /// stale but never rolls back the key write.
    async fn bump_owner_counters(&self, actor: &Actor, count: u64) {
        let result = async {
            let mut guard = self.store.users().write().await?;
            if let Some(user) = guard
                .records
                .iter_mut()
                .find(|u| u.id.to_string() == actor.id)
            {
                user.key_count += count;
                user.total_keys_created += count;
                guard.commit().await?;
            }
            Ok::<_, AppError>(())
        }
        .await;

        if let Err(err) = result {
            warn!(owner = %actor.id, error = %err, "Failed to update owner key counters");
        }
    }

    async fn decrement_key_count(&self, owner_id: &str, count: u64) {
        let result = async {
            let mut guard = self.store.users().write().await?;
            if let Some(user) = guard
                .records
                .iter_mut()
                .find(|u| u.id.to_string() == owner_id)
            {
                user.key_count = user.key_count.saturating_sub(count);
                guard.commit().await?;
            }
            Ok::<_, AppError>(())
        }
        .await;

        if let Err(err) = result {
            warn!(owner = %owner_id, error = %err, "Failed to update owner key counters");
        }
    }
}

fn owner_id(actor: &Actor) -> String {
    if actor.is_admin() {
        ADMIN_OWNER.to_string()
    } else {
        actor.id.clone()
    }
}

/// Turn a day count into a lifetime, rejecting values that would overflow
/// instead of panicking.
fn key_lifetime(days: i64) -> AppResult<Duration> {
    days.checked_mul(crate::models::SECONDS_PER_DAY)
        .and_then(Duration::try_seconds)
        .ok_or_else(|| {
            AppError::Validation(format!("Key duration of {} days is out of range", days))
        })
}

fn resolve_key_type(requested: Option<&str>) -> AppResult<String> {
    match requested {
        None => Ok(DEFAULT_KEY_TYPE.to_string()),
        Some(tag) => {
            let tag = tag.trim().to_uppercase();
            if !validate_type_tag(&tag) {
                return Err(AppError::Validation(
                    "Key type must be 1-12 uppercase alphanumeric characters".to_string(),
                ));
            }
            Ok(tag)
        }
    }
}
