//! keymint
//!
//! Core engine of a license-key issuance and verification service: key
//! creation and signing, device-bound verification, user accounts, runtime
//! settings, activity logging, and store maintenance over a JSON-file
//! record store.

use std::sync::Arc;

pub mod config;
pub mod db;
pub mod models;
pub mod services;
pub mod utils;

pub use config::AppConfig;
pub use utils::error::{AppError, AppResult, FaultKind};

use db::JsonStore;
use services::{
    start_maintenance, ActivityLog, AuthService, BackupService, DeviceTracker,
    KeyLifecycleService, MaintenanceState, SettingsService, SigningService, VerificationService,
};

/// Application state shared across the service layer
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// JSON-file record store
    pub store: Arc<JsonStore>,
    signing: SigningService,
    activity: ActivityLog,
}

impl AppState {
    /// Open the store and wire up the shared services
    pub async fn new(config: AppConfig) -> AppResult<Self> {
        let store = Arc::new(JsonStore::open(&config.storage.data_dir).await?);
        let signing = SigningService::new(config.signing.hmac_secret.clone());
        let activity = ActivityLog::new(store.clone());

        Ok(Self {
            config,
            store,
            signing,
            activity,
        })
    }

    pub fn keys(&self) -> KeyLifecycleService {
        KeyLifecycleService::new(self.store.clone(), self.signing.clone(), self.activity.clone())
    }

    pub fn verification(&self) -> VerificationService {
        VerificationService::new(self.store.clone(), self.signing.clone())
    }

    pub fn devices(&self) -> DeviceTracker {
        DeviceTracker::new(self.store.clone(), self.config.policy.max_accounts_per_device)
    }

    pub fn auth(&self) -> AuthService {
        AuthService::new(self.store.clone(), self.devices(), self.activity.clone())
    }

    pub fn settings(&self) -> SettingsService {
        SettingsService::new(self.store.clone(), self.activity.clone())
    }

    pub fn backup(&self) -> BackupService {
        BackupService::new(
            self.store.clone(),
            self.config.storage.effective_backup_dir(),
            self.config.backup.retention_days,
        )
    }

    pub fn activity(&self) -> &ActivityLog {
        &self.activity
    }

    /// Spawn the expiry sweep and backup background tasks
    pub fn start_maintenance(&self) -> MaintenanceState {
        start_maintenance(
            self.keys(),
            self.backup(),
            &self.config.maintenance,
            &self.config.backup,
        )
    }
}
