//! Background maintenance tasks
//!
//! Spawns the periodic expiry sweep and, when enabled, the backup schedule.
//! Both tasks check a shared running flag each tick so they can be stopped
//! cleanly in tests and on shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::interval;
use tracing::{error, info};

use crate::config::{BackupConfig, MaintenanceConfig};
use crate::services::backup::BackupService;
use crate::services::keys::KeyLifecycleService;

/// Handle to the running maintenance tasks
#[derive(Clone)]
pub struct MaintenanceState {
    running: Arc<RwLock<bool>>,
}

impl MaintenanceState {
    fn new() -> Self {
        Self {
            running: Arc::new(RwLock::new(true)),
        }
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Ask the tasks to stop at their next tick
    pub async fn stop(&self) {
        let mut running = self.running.write().await;
        *running = false;
        info!("Maintenance tasks stop requested");
    }
}

/// Start the expiry sweep and backup tasks
pub fn start_maintenance(
    keys: KeyLifecycleService,
    backup: BackupService,
    maintenance_config: &MaintenanceConfig,
    backup_config: &BackupConfig,
) -> MaintenanceState {
    let state = MaintenanceState::new();

    let sweep_state = state.clone();
    let sweep_interval = Duration::from_secs(maintenance_config.sweep_interval_mins * 60);
    tokio::spawn(async move {
        sweep_task(sweep_state, keys, sweep_interval).await;
    });

    if backup_config.enabled {
        let backup_state = state.clone();
        let backup_interval = Duration::from_secs(backup_config.interval_hours * 3600);
        tokio::spawn(async move {
            backup_task(backup_state, backup, backup_interval).await;
        });
    }

    info!("Maintenance tasks started");
    state
}

/// Periodically purge expired auto-delete keys. The first tick fires
/// immediately, so a restart never postpones an overdue sweep.
async fn sweep_task(state: MaintenanceState, keys: KeyLifecycleService, period: Duration) {
    let mut timer = interval(period);
    loop {
        timer.tick().await;
        if !state.is_running().await {
            info!("Expiry sweep task stopping");
            break;
        }
        if let Err(e) = keys.sweep_expired().await {
            error!("Expiry sweep failed: {}", e);
        }
    }
}

/// Periodically snapshot the store and prune old snapshots
async fn backup_task(state: MaintenanceState, backup: BackupService, period: Duration) {
    let mut timer = interval(period);
    loop {
        timer.tick().await;
        if !state.is_running().await {
            info!("Backup task stopping");
            break;
        }
        if let Err(e) = backup.snapshot().await {
            error!("Store backup failed: {}", e);
        }
        if let Err(e) = backup.prune_old().await {
            error!("Backup pruning failed: {}", e);
        }
    }
}
