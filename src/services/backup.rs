//! Store backup service
//!
//! Snapshots every collection file into a timestamped directory and prunes
//! snapshots past the retention window.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::Utc;
use tracing::info;

use crate::db::JsonStore;
use crate::utils::error::AppResult;

const SECONDS_PER_RETENTION_DAY: u64 = 86_400;

#[derive(Clone)]
pub struct BackupService {
    store: Arc<JsonStore>,
    backup_dir: PathBuf,
    retention_days: u64,
}

impl BackupService {
    pub fn new(store: Arc<JsonStore>, backup_dir: PathBuf, retention_days: u64) -> Self {
        Self {
            store,
            backup_dir,
            retention_days,
        }
    }

    /// Snapshot every collection into `<backup_dir>/<timestamp>/`.
    /// Each file is copied under its collection lock, so individual files
    /// are consistent; the snapshot as a whole is not a point-in-time cut
    /// across collections.
    pub async fn snapshot(&self) -> AppResult<PathBuf> {
        let name = Utc::now().format("%Y-%m-%dT%H-%M-%S").to_string();
        let dest = self.backup_dir.join(name);
        tokio::fs::create_dir_all(&dest).await?;

        self.store.keys().copy_to(&dest).await?;
        self.store.users().copy_to(&dest).await?;
        self.store.devices().copy_to(&dest).await?;
        self.store.activity().copy_to(&dest).await?;
        self.store.settings().copy_to(&dest).await?;

        info!(path = %dest.display(), "Created store backup");
        Ok(dest)
    }

    /// Delete snapshot directories older than the retention window
    pub async fn prune_old(&self) -> AppResult<usize> {
        let cutoff = SystemTime::now()
            .checked_sub(Duration::from_secs(
                self.retention_days * SECONDS_PER_RETENTION_DAY,
            ))
            .unwrap_or(SystemTime::UNIX_EPOCH);

        let mut removed = 0;
        let mut entries = match tokio::fs::read_dir(&self.backup_dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(err.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_dir() {
                continue;
            }
            if metadata.modified()? < cutoff {
                tokio::fs::remove_dir_all(entry.path()).await?;
                removed += 1;
            }
        }

        if removed > 0 {
            info!(removed, "Pruned expired backups");
        }
        Ok(removed)
    }
}
