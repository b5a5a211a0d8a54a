//! Key record model and key-facing request/response types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Seconds in one key-duration day. Expiry arithmetic uses fixed 86 400
/// second days everywhere, never calendar months.
pub const SECONDS_PER_DAY: i64 = 86_400;

/// A license/activation key record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyRecord {
    pub id: Uuid,
    /// Unique across the whole store
    pub key_code: String,
    #[serde(rename = "type")]
    pub key_type: String,
    /// Hex HMAC-SHA256 of `key_code`; must match at all times
    pub signature: String,
    pub created_at: DateTime<Utc>,
    /// Immutable after creation
    pub expires_at: DateTime<Utc>,
    pub allowed_devices: u32,
    /// Device ids that have redeemed this key; len never exceeds
    /// `allowed_devices`
    #[serde(default)]
    pub devices: Vec<String>,
    /// User id string, or the `"admin"` sentinel for admin-created keys
    pub owner_id: String,
    pub owner_username: String,
    #[serde(default)]
    pub require_api_key: bool,
    /// Monotonic; never decreases
    #[serde(default)]
    pub total_verifications: u64,
    #[serde(default)]
    pub last_verified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_custom: bool,
    /// When set, the record is purged by the expiry sweep once expired.
    /// Without it the key is retained indefinitely after expiry.
    #[serde(default)]
    pub auto_delete: bool,
    #[serde(default)]
    pub alias_name: Option<String>,
}

impl KeyRecord {
    /// Whether the key is expired at the given instant
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Unused device slots
    pub fn devices_remaining(&self) -> u32 {
        self.allowed_devices
            .saturating_sub(self.devices.len() as u32)
    }

    /// Whole days until expiry (ceiling), 0 once expired. The ceiling is
    /// taken over milliseconds so any unexpired key reports at least one
    /// day left.
    pub fn days_remaining(&self, now: DateTime<Utc>) -> i64 {
        if self.is_expired_at(now) {
            return 0;
        }
        let millis = (self.expires_at - now).num_milliseconds();
        let millis_per_day = SECONDS_PER_DAY * 1000;
        (millis + millis_per_day - 1) / millis_per_day
    }
}

/// Upper bound on requested key lifetimes (100 years); keeps expiry
/// arithmetic far away from `DateTime` range limits
pub const MAX_KEY_LIFETIME_DAYS: i64 = 36_500;

/// Request to create a single key
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateKeyRequest {
    /// Key lifetime in days
    #[validate(range(min = 1, max = 36_500))]
    pub days: i64,
    /// Device slot capacity
    #[validate(range(min = 1))]
    pub devices: u32,
    /// Type tag embedded in generated codes; defaults to "KEY"
    #[serde(default)]
    pub key_type: Option<String>,
    /// Caller-chosen code instead of a generated one
    #[serde(default)]
    pub custom_code: Option<String>,
    #[serde(default)]
    pub auto_delete: bool,
    /// Optional display label
    #[serde(default)]
    pub alias: Option<String>,
}

/// Request to create a batch of keys
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BulkCreateKeysRequest {
    /// Batch size, bounded to keep one call from growing the store without
    /// limit
    #[validate(range(min = 1, max = 100))]
    pub count: u32,
    #[validate(range(min = 1, max = 36_500))]
    pub days: i64,
    #[validate(range(min = 1))]
    pub devices: u32,
    #[serde(default)]
    pub key_type: Option<String>,
    #[serde(default)]
    pub auto_delete: bool,
    #[serde(default)]
    pub alias: Option<String>,
}

/// Owner-facing key listing entry
#[derive(Debug, Clone, Serialize)]
pub struct KeySummary {
    pub key_code: String,
    pub key_type: String,
    pub alias: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_expired: bool,
    pub devices_used: usize,
    pub devices_allowed: u32,
    pub total_verifications: u64,
    pub is_custom: bool,
}

impl KeySummary {
    pub fn from_record(record: &KeyRecord, now: DateTime<Utc>) -> Self {
        Self {
            key_code: record.key_code.clone(),
            key_type: record.key_type.clone(),
            alias: record.alias_name.clone(),
            created_at: record.created_at,
            expires_at: record.expires_at,
            is_expired: record.is_expired_at(now),
            devices_used: record.devices.len(),
            devices_allowed: record.allowed_devices,
            total_verifications: record.total_verifications,
            is_custom: record.is_custom,
        }
    }
}

/// Read-only projection returned by the key-info operation
#[derive(Debug, Clone, Serialize)]
pub struct KeyInfo {
    pub key_type: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_expired: bool,
    pub days_remaining: i64,
    pub devices_used: usize,
    pub devices_allowed: u32,
    pub require_api_key: bool,
    pub total_verifications: u64,
    pub last_verified: Option<DateTime<Utc>>,
    pub is_custom: bool,
    pub alias_name: Option<String>,
}

/// Outcome of verifying a key against a device id
///
/// Expired keys and exhausted device capacity are soft failures reported to
/// the client as data, not faults; the structured errors (`KEY_NOT_FOUND`,
/// `SIGNATURE_MISMATCH`) are raised through `AppError` instead.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VerifyOutcome {
    Valid {
        key_type: String,
        expires_at: DateTime<Utc>,
        devices_remaining: u32,
        alias: Option<String>,
    },
    Expired {
        expired_at: DateTime<Utc>,
    },
    DeviceLimitReached {
        devices_used: usize,
        devices_allowed: u32,
    },
}

impl VerifyOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, VerifyOutcome::Valid { .. })
    }

    /// Wire error code for soft failures, None on success
    pub fn error_code(&self) -> Option<&'static str> {
        match self {
            VerifyOutcome::Valid { .. } => None,
            VerifyOutcome::Expired { .. } => Some("KEY_EXPIRED"),
            VerifyOutcome::DeviceLimitReached { .. } => Some("DEVICE_LIMIT_REACHED"),
        }
    }
}

/// Aggregate store statistics for the admin dashboard
#[derive(Debug, Clone, Serialize)]
pub struct SystemStats {
    pub total_users: usize,
    pub active_users: usize,
    pub banned_users: usize,
    pub total_keys: usize,
    pub active_keys: usize,
    pub expired_keys: usize,
    pub total_verifications: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_record(expires_in_secs: i64) -> KeyRecord {
        let now = Utc::now();
        KeyRecord {
            id: Uuid::new_v4(),
            key_code: "KEY-ABC123-XY01".to_string(),
            key_type: "KEY".to_string(),
            signature: "deadbeef".to_string(),
            created_at: now,
            expires_at: now + Duration::seconds(expires_in_secs),
            allowed_devices: 2,
            devices: vec![],
            owner_id: "admin".to_string(),
            owner_username: "admin".to_string(),
            require_api_key: false,
            total_verifications: 0,
            last_verified: None,
            is_custom: false,
            auto_delete: false,
            alias_name: None,
        }
    }

    #[test]
    fn test_days_remaining_is_ceiling() {
        let now = Utc::now();
        // Half a day left still counts as one day
        let record = sample_record(SECONDS_PER_DAY / 2);
        assert_eq!(record.days_remaining(now), 1);

        let record = sample_record(SECONDS_PER_DAY * 3);
        assert_eq!(record.days_remaining(now), 3);
    }

    #[test]
    fn test_days_remaining_subsecond_remainder_counts_as_a_day() {
        let now = Utc::now();
        let record = KeyRecord {
            expires_at: now + chrono::TimeDelta::milliseconds(500),
            ..sample_record(1)
        };
        assert!(!record.is_expired_at(now));
        assert_eq!(record.days_remaining(now), 1);
    }

    #[test]
    fn test_days_remaining_zero_when_expired() {
        let now = Utc::now();
        let record = sample_record(-60);
        assert!(record.is_expired_at(now));
        assert_eq!(record.days_remaining(now), 0);
    }

    #[test]
    fn test_devices_remaining_saturates() {
        let mut record = sample_record(SECONDS_PER_DAY);
        record.devices = vec!["a".into(), "b".into(), "c".into()];
        assert_eq!(record.devices_remaining(), 0);
    }

    #[test]
    fn test_record_serde_defaults() {
        // Fields added over time deserialize from older records
        let json = r#"{
            "id": "550e8400-e29b-41d4-a716-446655440000",
            "key_code": "KEY-AAAAAA-BBBB",
            "type": "KEY",
            "signature": "00",
            "created_at": "2025-01-01T00:00:00Z",
            "expires_at": "2025-02-01T00:00:00Z",
            "allowed_devices": 1,
            "owner_id": "admin",
            "owner_username": "admin"
        }"#;
        let record: KeyRecord = serde_json::from_str(json).unwrap();
        assert!(record.devices.is_empty());
        assert_eq!(record.total_verifications, 0);
        assert!(!record.auto_delete);
        assert!(record.alias_name.is_none());
    }

    #[test]
    fn test_verify_outcome_codes() {
        let outcome = VerifyOutcome::DeviceLimitReached {
            devices_used: 2,
            devices_allowed: 2,
        };
        assert!(!outcome.is_valid());
        assert_eq!(outcome.error_code(), Some("DEVICE_LIMIT_REACHED"));

        let outcome = VerifyOutcome::Expired {
            expired_at: Utc::now(),
        };
        assert_eq!(outcome.error_code(), Some("KEY_EXPIRED"));
    }

    #[test]
    fn test_days_bounded_above() {
        use validator::Validate;

        let req = CreateKeyRequest {
            days: MAX_KEY_LIFETIME_DAYS,
            devices: 1,
            key_type: None,
            custom_code: None,
            auto_delete: false,
            alias: None,
        };
        assert!(req.validate().is_ok());

        let req = CreateKeyRequest {
            days: MAX_KEY_LIFETIME_DAYS + 1,
            ..req
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_bulk_request_bounds() {
        use validator::Validate;

        let ok = BulkCreateKeysRequest {
            count: 100,
            days: 30,
            devices: 1,
            key_type: None,
            auto_delete: false,
            alias: None,
        };
        assert!(ok.validate().is_ok());

        let too_many = BulkCreateKeysRequest { count: 101, ..ok.clone() };
        assert!(too_many.validate().is_err());

        let zero = BulkCreateKeysRequest { count: 0, ..ok };
        assert!(zero.validate().is_err());
    }
}
