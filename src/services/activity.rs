//! Activity log service
//!
//! Best-effort audit trail. Recording never fails the operation being
//! audited; persistence errors are logged and swallowed.

use std::sync::Arc;

use tracing::warn;

use crate::db::JsonStore;
use crate::models::{ActivityEntry, Actor};
use crate::utils::error::AppResult;

/// Most recent entries kept; older ones are dropped on append
const MAX_ENTRIES: usize = 1000;

#[derive(Clone)]
pub struct ActivityLog {
    store: Arc<JsonStore>,
}

impl ActivityLog {
    pub fn new(store: Arc<JsonStore>) -> Self {
        Self { store }
    }

    /// Append an entry, trimming the log to its cap. Failures are logged,
    /// never propagated.
    pub async fn record(&self, actor: &Actor, action: &str, details: serde_json::Value) {
        if let Err(err) = self.try_record(actor, action, details).await {
            warn!(action, error = %err, "Failed to record activity entry");
        }
    }

    async fn try_record(
        &self,
        actor: &Actor,
        action: &str,
        details: serde_json::Value,
    ) -> AppResult<()> {
        let mut guard = self.store.activity().write().await?;
        guard
            .records
            .push(ActivityEntry::new(action, &actor.id, &actor.username, details));
        if guard.records.len() > MAX_ENTRIES {
            let excess = guard.records.len() - MAX_ENTRIES;
            guard.records.drain(..excess);
        }
        guard.commit().await
    }

    /// Most recent entries, newest first
    pub async fn recent(&self, limit: usize) -> AppResult<Vec<ActivityEntry>> {
        let mut entries = self.store.activity().read().await?;
        entries.reverse();
        entries.truncate(limit);
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::JsonStore;

    async fn setup() -> (ActivityLog, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonStore::open(dir.path()).await.unwrap());
        (ActivityLog::new(store), dir)
    }

    #[tokio::test]
    async fn test_record_and_recent_newest_first() {
        let (log, _dir) = setup().await;
        let actor = Actor::admin();

        log.record(&actor, "first", serde_json::json!({})).await;
        log.record(&actor, "second", serde_json::json!({})).await;

        let entries = log.recent(10).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, "second");
        assert_eq!(entries[1].action, "first");
    }

    #[tokio::test]
    async fn test_log_capped_at_max_entries() {
        let (log, _dir) = setup().await;
        let actor = Actor::admin();

        for i in 0..(MAX_ENTRIES + 5) {
            log.record(&actor, &format!("action-{}", i), serde_json::json!({}))
                .await;
        }

        let entries = log.recent(MAX_ENTRIES + 10).await.unwrap();
        assert_eq!(entries.len(), MAX_ENTRIES);
        // Oldest entries were dropped
        assert_eq!(entries.last().unwrap().action, "action-5");
    }

    #[tokio::test]
    async fn test_recent_limit() {
        let (log, _dir) = setup().await;
        let actor = Actor::admin();
        for i in 0..5 {
            log.record(&actor, &format!("a{}", i), serde_json::json!({}))
                .await;
        }
        let entries = log.recent(2).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, "a4");
    }
}
