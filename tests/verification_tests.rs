mod common;

use chrono::{Duration, Utc};
use keymint::models::{Actor, CreateKeyRequest, VerifyOutcome};
use keymint::{AppError, AppState};
use pretty_assertions::assert_eq;

async fn create_key(state: &AppState, days: i64, devices: u32) -> String {
    let request = CreateKeyRequest {
        days,
        devices,
        key_type: None,
        custom_code: None,
        auto_delete: false,
        alias: None,
    };
    state
        .keys()
        .create_key(&Actor::admin(), &request)
        .await
        .unwrap()
        .key_code
}

#[tokio::test]
async fn device_slots_fill_then_reject() {
    let (state, _dir) = common::test_state().await;
    let code = create_key(&state, 30, 2).await;
    let verification = state.verification();

    match verification.verify(&code, "device-a").await.unwrap() {
        VerifyOutcome::Valid {
            devices_remaining, ..
        } => assert_eq!(devices_remaining, 1),
        other => panic!("unexpected outcome: {:?}", other),
    }

    match verification.verify(&code, "device-b").await.unwrap() {
        VerifyOutcome::Valid {
            devices_remaining, ..
        } => assert_eq!(devices_remaining, 0),
        other => panic!("unexpected outcome: {:?}", other),
    }

    match verification.verify(&code, "device-c").await.unwrap() {
        VerifyOutcome::DeviceLimitReached {
            devices_used,
            devices_allowed,
        } => {
            assert_eq!(devices_used, 2);
            assert_eq!(devices_allowed, 2);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[tokio::test]
async fn known_device_verifies_again_and_bumps_counter() {
    let (state, _dir) = common::test_state().await;
    let code = create_key(&state, 30, 1).await;
    let verification = state.verification();

    assert!(verification.verify(&code, "device-a").await.unwrap().is_valid());
    // Same device again: still valid even though capacity is exhausted
    assert!(verification.verify(&code, "device-a").await.unwrap().is_valid());

    let info = verification.info(&code).await.unwrap();
    assert_eq!(info.total_verifications, 2);
    assert_eq!(info.devices_used, 1);
    assert!(info.last_verified.is_some());
}

#[tokio::test]
async fn unknown_code_is_an_error() {
    let (state, _dir) = common::test_state().await;
    let err = state
        .verification()
        .verify("KEY-NOPE01-XX00", "device-a")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::KeyNotFound(_)));
    assert!(!err.kind().is_server_fault());
}

#[tokio::test]
async fn expired_key_is_a_soft_outcome() {
    let (state, _dir) = common::test_state().await;
    let code = create_key(&state, 30, 1).await;

    // Backdate the expiry directly in the store
    {
        let mut guard = state.store.keys().write().await.unwrap();
        let key = guard
            .records
            .iter_mut()
            .find(|k| k.key_code == code)
            .unwrap();
        key.expires_at = Utc::now() - Duration::seconds(60);
        guard.commit().await.unwrap();
    }

    match state.verification().verify(&code, "device-a").await.unwrap() {
        VerifyOutcome::Expired { expired_at } => assert!(expired_at < Utc::now()),
        other => panic!("unexpected outcome: {:?}", other),
    }

    // The expired attempt must not bind the device or bump counters
    let info = state.verification().info(&code).await.unwrap();
    assert!(info.is_expired);
    assert_eq!(info.devices_used, 0);
    assert_eq!(info.total_verifications, 0);
}

#[tokio::test]
async fn tampered_record_is_a_server_fault() {
    let (state, _dir) = common::test_state().await;
    let code = create_key(&state, 30, 1).await;

    {
        let mut guard = state.store.keys().write().await.unwrap();
        let key = guard
            .records
            .iter_mut()
            .find(|k| k.key_code == code)
            .unwrap();
        key.signature = "00".repeat(32);
        guard.commit().await.unwrap();
    }

    let err = state
        .verification()
        .verify(&code, "device-a")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::SignatureMismatch(_)));
    assert_eq!(err.error_code(), "SIGNATURE_MISMATCH");
    assert!(err.kind().is_server_fault());
}

#[tokio::test]
async fn limit_reached_outcome_never_mutates() {
    let (state, _dir) = common::test_state().await;
    let code = create_key(&state, 30, 1).await;
    let verification = state.verification();

    verification.verify(&code, "device-a").await.unwrap();
    verification.verify(&code, "device-b").await.unwrap();

    let info = verification.info(&code).await.unwrap();
    assert_eq!(info.devices_used, 1);
    // Only the successful verification counted
    assert_eq!(info.total_verifications, 1);
}

#[tokio::test]
async fn info_reports_ceiling_days_remaining() {
    let (state, _dir) = common::test_state().await;
    let code = create_key(&state, 30, 1).await;

    let info = state.verification().info(&code).await.unwrap();
    assert_eq!(info.days_remaining, 30);
    assert!(!info.is_expired);

    // Shave half a day off: still 30 days by ceiling
    {
        let mut guard = state.store.keys().write().await.unwrap();
        let key = guard
            .records
            .iter_mut()
            .find(|k| k.key_code == code)
            .unwrap();
        key.expires_at = key.expires_at - Duration::hours(12);
        guard.commit().await.unwrap();
    }
    let info = state.verification().info(&code).await.unwrap();
    assert_eq!(info.days_remaining, 30);
}

#[tokio::test]
async fn info_never_mutates_the_record() {
    let (state, _dir) = common::test_state().await;
    let code = create_key(&state, 30, 1).await;

    state.verification().info(&code).await.unwrap();
    state.verification().info(&code).await.unwrap();

    let info = state.verification().info(&code).await.unwrap();
    assert_eq!(info.total_verifications, 0);
    assert!(info.last_verified.is_none());
}

#[tokio::test]
async fn owner_verification_counter_tracks_successes() {
    let (state, _dir) = common::test_state().await;
    let user = common::register_user(&state, "owner1", &common::signals("ua", "1.2.3.4")).await;

    let users = state.auth().list_users().await.unwrap();
    let actor = {
        let stored = users.iter().find(|u| u.id == user.id).unwrap();
        Actor {
            id: stored.id.to_string(),
            username: stored.username.clone(),
            role: stored.role,
        }
    };

    let request = CreateKeyRequest {
        days: 10,
        devices: 1,
        key_type: None,
        custom_code: None,
        auto_delete: false,
        alias: None,
    };
    let key = state.keys().create_key(&actor, &request).await.unwrap();
    state
        .verification()
        .verify(&key.key_code, "device-a")
        .await
        .unwrap();

    let refreshed = state.auth().get_user(user.id).await.unwrap();
    assert_eq!(refreshed.total_verifications, 1);
}
