//! User account model and caller identity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Owner id recorded on keys created by an administrator. Admin-created keys
/// bypass per-user key-count accounting.
pub const ADMIN_OWNER: &str = "admin";

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

/// User entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    /// Stored as given; the service performs no email verification
    pub email: String,
    /// Argon2 PHC string; only [`UserPublic`] is safe to expose
    pub password_hash: String,
    #[serde(default)]
    pub role: Role,
    pub is_active: bool,
    pub is_banned: bool,
    /// Cached count of owned keys; may drift from the keys collection and is
    /// never recomputed in place
    #[serde(default)]
    pub key_count: u64,
    #[serde(default)]
    pub total_keys_created: u64,
    #[serde(default)]
    pub total_verifications: u64,
    /// Opaque per-user API credential (`API-<hex>`)
    pub api_code: String,
    /// Fingerprint of the device the account registered from
    pub device_id: String,
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Create a new active, unbanned user account
    pub fn new(
        username: String,
        email: String,
        password_hash: String,
        api_code: String,
        device_id: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            username,
            email,
            password_hash,
            role: Role::User,
            is_active: true,
            is_banned: false,
            key_count: 0,
            total_keys_created: 0,
            total_verifications: 0,
            api_code,
            device_id,
            last_login: None,
            created_at: Utc::now(),
        }
    }
}

/// User without password hash for safe serialization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPublic {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub is_active: bool,
    pub is_banned: bool,
    pub key_count: u64,
    pub total_keys_created: u64,
    pub total_verifications: u64,
    pub api_code: String,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserPublic {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
            is_active: user.is_active,
            is_banned: user.is_banned,
            key_count: user.key_count,
            total_keys_created: user.total_keys_created,
            total_verifications: user.total_verifications,
            api_code: user.api_code,
            last_login: user.last_login,
            created_at: user.created_at,
        }
    }
}

/// Request to register a new account
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 32))]
    pub username: String,
    #[validate(length(min = 6, max = 128))]
    pub password: String,
    /// Required but never verified
    #[validate(length(min = 1, max = 255))]
    pub email: String,
}

/// Authenticated caller identity, resolved upstream by the session layer.
/// The core trusts the `(id, role)` pair as given.
#[derive(Debug, Clone)]
pub struct Actor {
    pub id: String,
    pub username: String,
    pub role: Role,
}

impl Actor {
    /// The administrator identity
    pub fn admin() -> Self {
        Self {
            id: ADMIN_OWNER.to_string(),
            username: ADMIN_OWNER.to_string(),
            role: Role::Admin,
        }
    }

    /// Identity of a regular user
    pub fn for_user(user: &User) -> Self {
        Self {
            id: user.id.to_string(),
            username: user.username.clone(),
            role: user.role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
