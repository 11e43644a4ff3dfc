//! HTTP control API endpoints.

use chrono::{Duration as ChronoDuration, Utc};
use muezzin::api::ApiState;
use muezzin::{AzanSettings, ScheduleStore};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::common::TestRig;

async fn serve_rig(rig: &TestRig) -> (String, JoinHandle<()>) {
    let state = ApiState {
        handle: rig.handle.clone(),
        store: Arc::clone(&rig.store),
        playback: rig.playback.clone(),
        settings: AzanSettings::default(),
    };
    let app = muezzin::api::router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let task = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), task)
}

fn in_an_hour_ms() -> i64 {
    (Utc::now() + ChronoDuration::hours(1)).timestamp_millis()
}

#[tokio::test]
async fn test_health_endpoint() {
    let rig = TestRig::start().await;
    let (base, server) = serve_rig(&rig).await;

    let body: Value = reqwest::get(format!("{}/health", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");

    server.abort();
    rig.shutdown().await;
}

#[tokio::test]
async fn test_schedule_list_and_status() {
    let rig = TestRig::start().await;
    let (base, server) = serve_rig(&rig).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/alarms", base))
        .json(&json!({
            "slot": "fajr",
            "fire_at_ms": in_an_hour_ms(),
            "track": "azan_fajr",
            "vibrate": true
        }))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    let alarms: Value = client
        .get(format!("{}/alarms", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(alarms["count"], 1);
    assert_eq!(alarms["alarms"][0]["slot"], "Fajr");
    assert_eq!(alarms["alarms"][0]["track"], "azan_fajr");

    let status: Value = client
        .get(format!("{}/status", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["is_running"], true);
    assert_eq!(status["armed_alarms"], 1);
    assert_eq!(status["needs_reschedule"], false);

    server.abort();
    rig.shutdown().await;
}

#[tokio::test]
async fn test_unknown_slot_is_bad_request() {
    let rig = TestRig::start().await;
    let (base, server) = serve_rig(&rig).await;

    let response = reqwest::Client::new()
        .post(format!("{}/alarms", base))
        .json(&json!({ "slot": "sunrise", "fire_at_ms": in_an_hour_ms() }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

    server.abort();
    rig.shutdown().await;
}

#[tokio::test]
async fn test_cancel_endpoints() {
    let rig = TestRig::start().await;
    let (base, server) = serve_rig(&rig).await;
    let client = reqwest::Client::new();

    for slot in ["fajr", "dhuhr"] {
        client
            .post(format!("{}/alarms", base))
            .json(&json!({ "slot": slot, "fire_at_ms": in_an_hour_ms() }))
            .send()
            .await
            .unwrap();
    }
    client
        .post(format!("{}/reminders", base))
        .json(&json!({ "slot": "fajr", "fire_at_ms": in_an_hour_ms() }))
        .send()
        .await
        .unwrap();
    assert_eq!(rig.store.list_alarms().await.unwrap().len(), 3);

    let response = client
        .delete(format!("{}/alarms/fajr", base))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    assert_eq!(rig.store.list_alarms().await.unwrap().len(), 2);

    client
        .delete(format!("{}/reminders", base))
        .send()
        .await
        .unwrap();
    assert_eq!(rig.store.list_alarms().await.unwrap().len(), 1);

    client
        .delete(format!("{}/alarms", base))
        .send()
        .await
        .unwrap();
    assert!(rig.store.list_alarms().await.unwrap().is_empty());

    server.abort();
    rig.shutdown().await;
}

#[tokio::test]
async fn test_playback_test_and_stop() {
    let rig = TestRig::start().await;
    let (base, server) = serve_rig(&rig).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/playback/test", base))
        .json(&json!({ "track": "azan_makkah" }))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    assert!(rig.playback.is_playing().await);
    // test playback never mutates the schedule store
    assert!(rig.store.list_alarms().await.unwrap().is_empty());

    client
        .post(format!("{}/playback/stop", base))
        .send()
        .await
        .unwrap();
    assert!(!rig.playback.is_playing().await);

    server.abort();
    rig.shutdown().await;
}

#[tokio::test]
async fn test_missing_track_is_not_found() {
    let rig = TestRig::start().await;
    let (base, server) = serve_rig(&rig).await;

    let response = reqwest::Client::new()
        .post(format!("{}/playback/test", base))
        .json(&json!({ "track": "ghost" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);

    server.abort();
    rig.shutdown().await;
}

#[tokio::test]
async fn test_reschedule_ack_clears_flag() {
    let rig = TestRig::start().await;
    let (base, server) = serve_rig(&rig).await;

    rig.store.set_needs_reschedule(true).await.unwrap();

    let response = reqwest::Client::new()
        .post(format!("{}/reschedule/ack", base))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    assert!(!rig.handle.needs_reschedule().await.unwrap());

    server.abort();
    rig.shutdown().await;
}
