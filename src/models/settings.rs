//! Runtime settings document
//!
//! Operator-tunable knobs that admins change while the service runs. They
//! live in the store as a single document and are only touched through the
//! settings service accessors; process-level configuration stays in
//! [`AppConfig`](crate::config::AppConfig).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Runtime-tunable settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeSettings {
    /// When set, the outer layer rejects non-admin traffic
    #[serde(default)]
    pub maintenance_mode: bool,
    #[serde(default = "default_registration_enabled")]
    pub registration_enabled: bool,
    /// Longest key lifetime a non-admin may request, in days
    #[serde(default = "default_max_key_days")]
    pub max_key_days: i64,
    /// Free-tier quota, carried for the outer layer; the core does not
    /// enforce it
    #[serde(default = "default_free_user_key_limit")]
    pub free_user_key_limit: u32,
    /// AI feature daily quota (outer-layer concern, threaded through)
    #[serde(default = "default_ai_daily_limit")]
    pub ai_daily_limit: u32,
    /// AI feature rate limit in milliseconds (outer-layer concern)
    #[serde(default = "default_ai_rate_limit_ms")]
    pub ai_rate_limit_ms: u64,
    /// Users exempt from the free-tier API-code requirement
    #[serde(default)]
    pub premium_users: Vec<Uuid>,
}

/// Partial update applied to the settings document
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateSettingsRequest {
    pub maintenance_mode: Option<bool>,
    pub registration_enabled: Option<bool>,
    pub max_key_days: Option<i64>,
    pub free_user_key_limit: Option<u32>,
    pub ai_daily_limit: Option<u32>,
    pub ai_rate_limit_ms: Option<u64>,
    pub premium_users: Option<Vec<Uuid>>,
}

impl RuntimeSettings {
    /// Merge a partial update into the current settings
    pub fn apply(&mut self, patch: &UpdateSettingsRequest) {
        if let Some(v) = patch.maintenance_mode {
            self.maintenance_mode = v;
        }
        if let Some(v) = patch.registration_enabled {
            self.registration_enabled = v;
        }
        if let Some(v) = patch.max_key_days {
            self.max_key_days = v;
        }
        if let Some(v) = patch.free_user_key_limit {
            self.free_user_key_limit = v;
        }
        if let Some(v) = patch.ai_daily_limit {
            self.ai_daily_limit = v;
        }
        if let Some(v) = patch.ai_rate_limit_ms {
            self.ai_rate_limit_ms = v;
        }
        if let Some(ref v) = patch.premium_users {
            self.premium_users = v.clone();
        }
    }

    /// Whether the user is on the premium list
    pub fn is_premium(&self, user_id: Uuid) -> bool {
        self.premium_users.contains(&user_id)
    }
}

fn default_registration_enabled() -> bool {
    true
}

fn default_max_key_days() -> i64 {
    365
}

fn default_free_user_key_limit() -> u32 {
    10
}

fn default_ai_daily_limit() -> u32 {
    100
}

fn default_ai_rate_limit_ms() -> u64 {
    3000
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            maintenance_mode: false,
            registration_enabled: default_registration_enabled(),
            max_key_days: default_max_key_days(),
            free_user_key_limit: default_free_user_key_limit(),
            ai_daily_limit: default_ai_daily_limit(),
            ai_rate_limit_ms: default_ai_rate_limit_ms(),
            premium_users: Vec::new(),
        }
    }
}
