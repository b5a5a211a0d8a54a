//! Shared test fixtures

use keymint::config::AppConfig;
use keymint::models::{DeviceSignals, RegisterRequest, UserPublic};
use keymint::services::DeviceTracker;
use keymint::AppState;
use tempfile::TempDir;

/// A fresh application state backed by a temporary data directory
pub async fn test_state() -> (AppState, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let mut config = AppConfig::default();
    config.storage.data_dir = dir.path().join("data");
    config.signing.hmac_secret = "test-secret".to_string();

    let state = AppState::new(config).await.unwrap();
    (state, dir)
}

pub fn signals(ua: &str, addr: &str) -> DeviceSignals {
    DeviceSignals {
        user_agent: ua.to_string(),
        remote_addr: addr.to_string(),
    }
}

/// Register a user from the given device signals
pub async fn register_user(state: &AppState, username: &str, sig: &DeviceSignals) -> UserPublic {
    let device_id = DeviceTracker::derive_device_id(sig);
    state
        .auth()
        .register(
            &RegisterRequest {
                username: username.to_string(),
                password: "correct-horse".to_string(),
                email: format!("{}@example.com", username),
            },
            &device_id,
        )
        .await
        .unwrap()
}
