//! Activity log model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One structured activity event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: Uuid,
    pub action: String,
    pub actor_id: String,
    pub actor_name: String,
    #[serde(default)]
    pub details: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl ActivityEntry {
    pub fn new(
        action: &str,
        actor_id: &str,
        actor_name: &str,
        details: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            action: action.to_string(),
            actor_id: actor_id.to_string(),
            actor_name: actor_name.to_string(),
            details,
            timestamp: Utc::now(),
        }
    }
}
