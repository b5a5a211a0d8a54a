//! Device binding model
//!
//! A device id is a best-effort client fingerprint derived from
//! client-supplied signals. It is deterministic but spoofable, and distinct
//! real devices can collide; it is never treated as an authentication
//! factor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Accounts registered from one fingerprinted device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceBinding {
    pub device_id: String,
    /// Size bounded by the per-device account cap, enforced at registration
    /// time only
    #[serde(default)]
    pub accounts: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl DeviceBinding {
    pub fn new(device_id: String, first_account: Uuid) -> Self {
        Self {
            device_id,
            accounts: vec![first_account],
            created_at: Utc::now(),
        }
    }
}

/// Client-supplied identifying signals used to derive a device id
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceSignals {
    pub user_agent: String,
    pub remote_addr: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_binding_holds_first_account() {
        let account = Uuid::new_v4();
        let binding = DeviceBinding::new("abc".to_string(), account);
        assert_eq!(binding.accounts, vec![account]);
    }
}
