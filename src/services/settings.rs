//! Runtime settings service
//!
//! Settings live in the store as a single document rather than as process
//! globals, so updates take effect immediately and survive restarts.

use std::sync::Arc;

use crate::db::JsonStore;
use crate::models::{Actor, RuntimeSettings, UpdateSettingsRequest};
use crate::services::ActivityLog;
use crate::utils::error::AppResult;

#[derive(Clone)]
pub struct SettingsService {
    store: Arc<JsonStore>,
    activity: ActivityLog,
}

impl SettingsService {
    pub fn new(store: Arc<JsonStore>, activity: ActivityLog) -> Self {
        Self { store, activity }
    }

    pub async fn get(&self) -> AppResult<RuntimeSettings> {
        self.store.settings().read().await
    }

    /// Merge a partial update into the stored settings
    pub async fn update(
        &self,
        actor: &Actor,
        patch: &UpdateSettingsRequest,
    ) -> AppResult<RuntimeSettings> {
        let updated = {
            let mut guard = self.store.settings().write().await?;
            guard.value.apply(patch);
            let updated = guard.value.clone();
            guard.commit().await?;
            updated
        };

        self.activity
            .record(
                actor,
                "update_settings",
                serde_json::json!({
                    "maintenance_mode": updated.maintenance_mode,
                    "registration_enabled": updated.registration_enabled,
                    "max_key_days": updated.max_key_days,
                }),
            )
            .await;
        Ok(updated)
    }
}
