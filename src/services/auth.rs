//! Account service
//!
//! Registration, password authentication, and admin account management.
//! Password hashing uses Argon2id with per-hash random salts.

use std::sync::Arc;

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use rand::rngs::OsRng;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::db::JsonStore;
use crate::models::{Actor, RegisterRequest, User, UserPublic};
use crate::services::devices::DeviceTracker;
use crate::services::keygen::KeyFactory;
use crate::services::keys::KeyLifecycleService;
use crate::services::ActivityLog;
use crate::utils::error::{AppError, AppResult};
use crate::utils::validation::validate_username;

#[derive(Clone)]
pub struct AuthService {
    store: Arc<JsonStore>,
    devices: DeviceTracker,
    factory: KeyFactory,
    activity: ActivityLog,
}

impl AuthService {
    pub fn new(store: Arc<JsonStore>, devices: DeviceTracker, activity: ActivityLog) -> Self {
        Self {
            store,
            devices,
            factory: KeyFactory::new(),
            activity,
        }
    }

    /// Hash a password using Argon2id
    pub fn hash_password(password: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
        Ok(hash.to_string())
    }

    /// Verify a password against a stored hash
    pub fn verify_password(password: &str, password_hash: &str) -> AppResult<bool> {
        let parsed = PasswordHash::new(password_hash)
            .map_err(|e| AppError::Internal(format!("Invalid password hash format: {}", e)))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }

    /// Register a new account from a fingerprinted device.
    ///
    /// The device cap is pre-checked before the expensive password hash,
    /// then enforced authoritatively when the account is bound; a bind
    /// rejection rolls the just-created user back.
    pub async fn register(
        &self,
        request: &RegisterRequest,
        device_id: &str,
    ) -> AppResult<UserPublic> {
        request.validate()?;
        if !validate_username(&request.username) {
            return Err(AppError::Validation(
                "Username may only contain letters, digits, and ._-".to_string(),
            ));
        }

        let settings = self.store.settings().read().await?;
        if !settings.registration_enabled {
            return Err(AppError::RegistrationDisabled);
        }

        // Advisory early check; the bind below is the real gate
        if self.devices.account_count(device_id).await? >= self.max_accounts_per_device() {
            return Err(AppError::DeviceAccountLimit {
                max: self.max_accounts_per_device(),
            });
        }

        let password_hash = Self::hash_password(&request.password)?;
        let api_code = self.factory.generate_api_code();

        let user = {
            let mut guard = self.store.users().write().await?;
            if guard
                .records
                .iter()
                .any(|u| u.username.eq_ignore_ascii_case(&request.username))
            {
                return Err(AppError::UsernameTaken(request.username.clone()));
            }
            let user = User::new(
                request.username.clone(),
                request.email.clone(),
                password_hash,
                api_code,
                device_id.to_string(),
            );
            guard.records.push(user.clone());
            guard.commit().await?;
            user
        };

        if let Err(err) = self.devices.bind_account(device_id, user.id).await {
            self.remove_user_record(user.id).await?;
            return Err(err);
        }

        info!(username = %user.username, "Registered user");
        self.activity
            .record(
                &Actor::for_user(&user),
                "register",
                serde_json::json!({ "username": user.username }),
            )
            .await;

        Ok(user.into())
    }

    /// Authenticate by username and password; updates last-login on success
    pub async fn authenticate(&self, username: &str, password: &str) -> AppResult<UserPublic> {
        let user = {
            let mut guard = self.store.users().write().await?;
            let user = guard
                .records
                .iter_mut()
                .find(|u| u.username.eq_ignore_ascii_case(username))
                .ok_or(AppError::InvalidCredentials)?;

            if !Self::verify_password(password, &user.password_hash)? {
                return Err(AppError::InvalidCredentials);
            }
            if user.is_banned {
                return Err(AppError::AccountBanned);
            }
            if !user.is_active {
                return Err(AppError::AccountDisabled);
            }

            user.last_login = Some(Utc::now());
            let user = user.clone();
            guard.commit().await?;
            user
        };

        self.activity
            .record(
                &Actor::for_user(&user),
                "login",
                serde_json::json!({ "username": user.username }),
            )
            .await;
        Ok(user.into())
    }

    /// Look up a user by id
    pub async fn get_user(&self, user_id: Uuid) -> AppResult<UserPublic> {
        let users = self.store.users().read().await?;
        users
            .into_iter()
            .find(|u| u.id == user_id)
            .map(UserPublic::from)
            .ok_or_else(|| AppError::UserNotFound(user_id.to_string()))
    }

    /// Every account, without password hashes
    pub async fn list_users(&self) -> AppResult<Vec<UserPublic>> {
        let users = self.store.users().read().await?;
        Ok(users.into_iter().map(UserPublic::from).collect())
    }

    pub async fn ban_user(&self, actor: &Actor, user_id: Uuid) -> AppResult<()> {
        self.set_banned(actor, user_id, true).await
    }

    pub async fn unban_user(&self, actor: &Actor, user_id: Uuid) -> AppResult<()> {
        self.set_banned(actor, user_id, false).await
    }

    /// Delete an account along with its keys and device binding
    pub async fn delete_user(
        &self,
        actor: &Actor,
        user_id: Uuid,
        keys: &KeyLifecycleService,
    ) -> AppResult<()> {
        let user = {
            let mut guard = self.store.users().write().await?;
            let position = guard
                .records
                .iter()
                .position(|u| u.id == user_id)
                .ok_or_else(|| AppError::UserNotFound(user_id.to_string()))?;
            let user = guard.records.remove(position);
            guard.commit().await?;
            user
        };

        // Device bindings are intentionally left in place: the per-device
        // cap counts registrations, not live accounts.
        let removed_keys = keys.delete_keys_for_owner(&user.id.to_string()).await?;

        info!(username = %user.username, removed_keys, "Deleted user");
        self.activity
            .record(
                actor,
                "delete_user",
                serde_json::json!({
                    "username": user.username,
                    "removed_keys": removed_keys,
                }),
            )
            .await;
        Ok(())
    }

    async fn set_banned(&self, actor: &Actor, user_id: Uuid, banned: bool) -> AppResult<()> {
        let username = {
            let mut guard = self.store.users().write().await?;
            let user = guard
                .records
                .iter_mut()
                .find(|u| u.id == user_id)
                .ok_or_else(|| AppError::UserNotFound(user_id.to_string()))?;
            user.is_banned = banned;
            let username = user.username.clone();
            guard.commit().await?;
            username
        };

        let action = if banned { "ban_user" } else { "unban_user" };
        self.activity
            .record(actor, action, serde_json::json!({ "username": username }))
            .await;
        Ok(())
    }

    async fn remove_user_record(&self, user_id: Uuid) -> AppResult<()> {
        let mut guard = self.store.users().write().await?;
        guard.records.retain(|u| u.id != user_id);
        guard.commit().await
    }

    fn max_accounts_per_device(&self) -> usize {
        self.devices.max_accounts_per_device()
    }
}
