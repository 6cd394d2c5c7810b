//! Integration tests for periodic re-validation
//!
//! These use short real intervals; assertions leave generous slack for slow
//! CI machines.

mod common;

use common::harness;
use local_auth::types::SessionsOptions;
use local_auth::{LocalAuthOptions, RefreshScheduler, TransportError};
use serde_json::json;
use std::time::Duration;

const INTERVAL: Duration = Duration::from_millis(40);

fn options() -> LocalAuthOptions {
    LocalAuthOptions::builder().origin(common::ORIGIN).build()
}

#[tokio::test]
async fn test_ticks_while_signed_in() {
    let h = harness(options());
    h.http
        .on("auth/signIn", Ok(json!({"token": "T1"})))
        .on("users/me", Ok(json!({"id": 1})));
    h.client.sign_in(&json!({}), None).await.unwrap();

    let _scheduler = RefreshScheduler::start(h.client.clone(), INTERVAL);
    let before = h.http.calls("users/me").len();
    tokio::time::sleep(INTERVAL * 6).await;

    let ticks = h.http.calls("users/me").len() - before;
    assert!(ticks >= 2, "expected periodic checks, got {ticks}");
    // One ticker only: two would roughly double the count
    assert!(ticks <= 7, "too many checks: {ticks}");
}

#[tokio::test]
async fn test_idle_without_token_and_starts_after_sign_in() {
    let h = harness(options());
    h.http
        .on("auth/signIn", Ok(json!({"token": "T1"})))
        .on("users/me", Ok(json!({"id": 1})));

    let _scheduler = RefreshScheduler::start(h.client.clone(), INTERVAL);
    tokio::time::sleep(INTERVAL * 3).await;
    assert!(h.http.requests().is_empty());

    h.client.sign_in(&json!({}), None).await.unwrap();
    let after_sign_in = h.http.calls("users/me").len();
    tokio::time::sleep(INTERVAL * 5).await;

    assert!(h.http.calls("users/me").len() > after_sign_in);
}

#[tokio::test]
async fn test_sign_out_stops_ticking() {
    let h = harness(options());
    h.http
        .on("auth/signIn", Ok(json!({"token": "T1"})))
        .on("users/me", Ok(json!({"id": 1})));
    h.client.sign_in(&json!({}), None).await.unwrap();

    let scheduler = RefreshScheduler::start(h.client.clone(), INTERVAL);
    tokio::time::sleep(INTERVAL * 3).await;

    h.client.sign_out(None).await.unwrap();
    tokio::time::sleep(INTERVAL).await;
    let after_sign_out = h.http.requests().len();
    tokio::time::sleep(INTERVAL * 4).await;

    assert_eq!(h.http.requests().len(), after_sign_out);
    assert!(!scheduler.is_stopped());
}

#[tokio::test]
async fn test_rejected_check_signs_out_and_stops() {
    let h = harness(options());
    h.http
        .on("auth/signIn", Ok(json!({"token": "T1"})))
        .on("users/me", Ok(json!({"id": 1})))
        .on("users/me", Err(TransportError::rejected(401, None)));
    h.client.sign_in(&json!({}), None).await.unwrap();

    let _scheduler = RefreshScheduler::start(h.client.clone(), INTERVAL);
    tokio::time::sleep(INTERVAL * 4).await;

    assert_eq!(h.client.store().token(), None);
    assert_eq!(h.http.calls("users/me").len(), 2);
}

#[tokio::test]
async fn test_stop_and_drop() {
    let h = harness(options());
    h.http
        .on("auth/signIn", Ok(json!({"token": "T1"})))
        .on("users/me", Ok(json!({"id": 1})));
    h.client.sign_in(&json!({}), None).await.unwrap();

    let scheduler = RefreshScheduler::start(h.client.clone(), INTERVAL);
    scheduler.stop();
    assert!(scheduler.is_stopped());
    tokio::time::sleep(INTERVAL * 3).await;
    assert_eq!(h.http.calls("users/me").len(), 1);

    let dropped = RefreshScheduler::start(h.client.clone(), INTERVAL);
    drop(dropped);
    tokio::time::sleep(INTERVAL * 3).await;
    assert_eq!(h.http.calls("users/me").len(), 1);
}

#[tokio::test]
async fn test_zero_interval_returns_stopped_scheduler() {
    let h = harness(options());
    h.http
        .on("auth/signIn", Ok(json!({"token": "T1"})))
        .on("users/me", Ok(json!({"id": 1})));
    h.client.sign_in(&json!({}), None).await.unwrap();

    let scheduler = RefreshScheduler::start(h.client.clone(), Duration::ZERO);
    assert!(scheduler.is_stopped());
    tokio::time::sleep(INTERVAL * 3).await;

    assert_eq!(h.http.calls("users/me").len(), 1);
    assert!(h.client.store().is_authorized());
    // Stopping again is harmless
    scheduler.stop();
}

#[tokio::test]
async fn test_initialize_starts_scheduler_when_configured() {
    let options = LocalAuthOptions::builder()
        .origin(common::ORIGIN)
        .sessions(SessionsOptions::builder().refresh_every(40).build())
        .build();
    let h = harness(options);
    h.client.store().soft_save_meta("T1".into(), None);
    h.http.on("users/me", Ok(json!({"id": 1})));

    let scheduler = h.client.initialize().await;

    assert!(scheduler.is_some());
    assert!(h.client.store().is_authorized());
    tokio::time::sleep(INTERVAL * 4).await;
    assert!(h.http.calls("users/me").len() >= 2);
}
