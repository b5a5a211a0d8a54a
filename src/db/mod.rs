//! JSON collection record store
//!
//! Each entity collection is one JSON document on disk, read fully into
//! memory and rewritten atomically (write-to-temp-then-rename) on every
//! mutation. There is no row-level locking, so every read-modify-write goes
//! through a per-collection mutex held from load to save; without it,
//! concurrent create and verify calls would race and lose updates.
//! Read-only paths may read the latest durable snapshot without the lock.
//!
//! No operation holds two collection locks at once: multi-collection flows
//! commit and release one collection before locking the next, applying
//! cross-collection effects sequentially.

use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

use crate::models::{ActivityEntry, DeviceBinding, KeyRecord, RuntimeSettings, User};
use crate::utils::error::AppResult;

/// One on-disk collection holding an ordered sequence of records
pub struct Collection<T> {
    name: &'static str,
    path: PathBuf,
    lock: Mutex<()>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Collection<T>
where
    T: Serialize + DeserializeOwned,
{
    fn new(dir: &Path, name: &'static str) -> Self {
        Self {
            name,
            path: dir.join(format!("{}.json", name)),
            lock: Mutex::new(()),
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the latest durable snapshot without taking the write lock.
    /// A missing file is an empty collection.
    pub async fn read(&self) -> AppResult<Vec<T>> {
        load_records(&self.path).await
    }

    /// Lock the collection and load it for a read-modify-write cycle.
    /// Nothing is persisted unless the returned guard is committed.
    pub async fn write(&self) -> AppResult<CollectionGuard<'_, T>> {
        let guard = self.lock.lock().await;
        let records = load_records(&self.path).await?;
        Ok(CollectionGuard {
            path: &self.path,
            records,
            _guard: guard,
        })
    }

    /// Copy the collection file into `dest_dir`, holding the collection lock
    /// so the copy never observes a half-written file. Missing files (never
    /// persisted yet) are skipped.
    pub async fn copy_to(&self, dest_dir: &Path) -> AppResult<()> {
        let _guard = self.lock.lock().await;
        if tokio::fs::try_exists(&self.path).await? {
            let dest = dest_dir.join(format!("{}.json", self.name));
            tokio::fs::copy(&self.path, &dest).await?;
            debug!(collection = self.name, "Copied collection snapshot");
        }
        Ok(())
    }
}

/// A locked, in-memory working copy of a collection.
///
/// Mutate `records` freely, then call [`commit`](Self::commit) to persist
/// atomically. Dropping the guard without committing discards every change.
pub struct CollectionGuard<'a, T> {
    path: &'a Path,
    pub records: Vec<T>,
    _guard: MutexGuard<'a, ()>,
}

impl<T> CollectionGuard<'_, T>
where
    T: Serialize,
{
    /// Atomically replace the on-disk collection with the working copy
    pub async fn commit(self) -> AppResult<()> {
        save_json(self.path, &self.records).await
    }
}

/// A single JSON document (not a record sequence) with the same locking and
/// atomic-replace contract as [`Collection`]. A missing file reads as
/// `T::default()`.
pub struct Document<T> {
    name: &'static str,
    path: PathBuf,
    lock: Mutex<()>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Document<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    fn new(dir: &Path, name: &'static str) -> Self {
        Self {
            name,
            path: dir.join(format!("{}.json", name)),
            lock: Mutex::new(()),
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the latest durable value without taking the write lock
    pub async fn read(&self) -> AppResult<T> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
            Err(err) => Err(err.into()),
        }
    }

    /// Lock the document and load it for a read-modify-write cycle
    pub async fn write(&self) -> AppResult<DocumentGuard<'_, T>> {
        let guard = self.lock.lock().await;
        let value = match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => T::default(),
            Err(err) => return Err(err.into()),
        };
        Ok(DocumentGuard {
            path: &self.path,
            value,
            _guard: guard,
        })
    }

    /// Copy the document file into `dest_dir` under the document lock
    pub async fn copy_to(&self, dest_dir: &Path) -> AppResult<()> {
        let _guard = self.lock.lock().await;
        if tokio::fs::try_exists(&self.path).await? {
            let dest = dest_dir.join(format!("{}.json", self.name));
            tokio::fs::copy(&self.path, &dest).await?;
        }
        Ok(())
    }
}

/// A locked working copy of a document; same commit contract as
/// [`CollectionGuard`]
pub struct DocumentGuard<'a, T> {
    path: &'a Path,
    pub value: T,
    _guard: MutexGuard<'a, ()>,
}

impl<T> DocumentGuard<'_, T>
where
    T: Serialize,
{
    pub async fn commit(self) -> AppResult<()> {
        save_json(self.path, &self.value).await
    }
}

async fn load_records<T: DeserializeOwned>(path: &Path) -> AppResult<Vec<T>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(err) => Err(err.into()),
    }
}

/// Serialize and write atomically: write a sibling temp file, then rename
/// over the target. Crash-safe; readers only ever see a complete document.
async fn save_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> AppResult<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, &bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

/// The durable store: one collection per entity type plus the runtime
/// settings document, all under one data directory.
pub struct JsonStore {
    data_dir: PathBuf,
    keys: Collection<KeyRecord>,
    users: Collection<User>,
    devices: Collection<DeviceBinding>,
    activity: Collection<ActivityEntry>,
    settings: Document<RuntimeSettings>,
}

impl JsonStore {
    /// Open the store, creating the data directory and missing collection
    /// files.
    pub async fn open(data_dir: &Path) -> AppResult<Self> {
        tokio::fs::create_dir_all(data_dir).await?;

        let store = Self {
            data_dir: data_dir.to_path_buf(),
            keys: Collection::new(data_dir, "keys"),
            users: Collection::new(data_dir, "users"),
            devices: Collection::new(data_dir, "devices"),
            activity: Collection::new(data_dir, "activity_logs"),
            settings: Document::new(data_dir, "settings"),
        };

        store.init_missing_files().await?;
        Ok(store)
    }

    /// Seed empty collection files so backups always have something to copy
    async fn init_missing_files(&self) -> AppResult<()> {
        for path in [
            self.keys.path(),
            self.users.path(),
            self.devices.path(),
            self.activity.path(),
        ] {
            if !tokio::fs::try_exists(path).await? {
                save_json(path, &Vec::<serde_json::Value>::new()).await?;
            }
        }
        if !tokio::fs::try_exists(self.settings.path()).await? {
            save_json(self.settings.path(), &RuntimeSettings::default()).await?;
        }
        Ok(())
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn keys(&self) -> &Collection<KeyRecord> {
        &self.keys
    }

    pub fn users(&self) -> &Collection<User> {
        &self.users
    }

    pub fn devices(&self) -> &Collection<DeviceBinding> {
        &self.devices
    }

    pub fn activity(&self) -> &Collection<ActivityEntry> {
        &self.activity
    }

    pub fn settings(&self) -> &Document<RuntimeSettings> {
        &self.settings
    }
}

impl std::fmt::Debug for JsonStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonStore")
            .field("data_dir", &self.data_dir)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn open_store() -> (JsonStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(dir.path()).await.unwrap();
        (store, dir)
    }

    fn sample_entry() -> ActivityEntry {
        ActivityEntry::new("test", "actor", "actor", serde_json::json!({}))
    }

    #[tokio::test]
    async fn test_open_seeds_collection_files() {
        let (store, _dir) = open_store().await;
        assert!(store.keys().path().exists());
        assert!(store.users().path().exists());
        assert!(store.settings().path().exists());
    }

    #[tokio::test]
    async fn test_commit_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = JsonStore::open(dir.path()).await.unwrap();
            let mut guard = store.activity().write().await.unwrap();
            guard.records.push(sample_entry());
            guard.commit().await.unwrap();
        }

        let store = JsonStore::open(dir.path()).await.unwrap();
        let entries = store.activity().read().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, "test");
    }

    #[tokio::test]
    async fn test_drop_without_commit_discards_changes() {
        let (store, _dir) = open_store().await;
        {
            let mut guard = store.activity().write().await.unwrap();
            guard.records.push(sample_entry());
            // guard dropped here without commit
        }

        let entries = store.activity().read().await.unwrap();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn test_no_temp_file_left_behind() {
        let (store, _dir) = open_store().await;
        let mut guard = store.activity().write().await.unwrap();
        guard.records.push(sample_entry());
        guard.commit().await.unwrap();

        let tmp = store.activity().path().with_extension("json.tmp");
        assert!(!tmp.exists());
    }

    #[tokio::test]
    async fn test_document_defaults_and_update() {
        let (store, _dir) = open_store().await;
        let settings = store.settings().read().await.unwrap();
        assert_eq!(settings, crate::models::RuntimeSettings::default());

        let mut guard = store.settings().write().await.unwrap();
        guard.value.max_key_days = 30;
        guard.commit().await.unwrap();

        let settings = store.settings().read().await.unwrap();
        assert_eq!(settings.max_key_days, 30);
    }

    #[tokio::test]
    async fn test_concurrent_writers_serialize() {
        use std::sync::Arc;

        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonStore::open(dir.path()).await.unwrap());

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let mut guard = store.activity().write().await.unwrap();
                guard.records.push(ActivityEntry::new(
                    &format!("action-{}", i),
                    "actor",
                    "actor",
                    serde_json::json!({}),
                ));
                guard.commit().await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        // Without the per-collection lock this would lose updates
        let entries = store.activity().read().await.unwrap();
        assert_eq!(entries.len(), 8);
    }

    #[tokio::test]
    async fn test_copy_to_snapshot() {
        let (store, dir) = open_store().await;
        let mut guard = store.users().write().await.unwrap();
        guard.records.push(User::new(
            "alice".to_string(),
            "a@b.c".to_string(),
            "hash".to_string(),
            "API-00".to_string(),
            "device".to_string(),
        ));
        guard.commit().await.unwrap();

        let dest = dir.path().join("snap");
        tokio::fs::create_dir_all(&dest).await.unwrap();
        store.users().copy_to(&dest).await.unwrap();

        let copied = tokio::fs::read(dest.join("users.json")).await.unwrap();
        let users: Vec<User> = serde_json::from_slice(&copied).unwrap();
        assert_eq!(users.len(), 1);
    }
}
