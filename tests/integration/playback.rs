//! Playback control surface: test playback, stop, failure handling.

use muezzin::{PrayerSlot, ScheduleStore, TrackId};
use std::sync::Arc;
use std::time::Duration;

use crate::common::{wait_for, TestRig};

/// test_azan plays immediately regardless of scheduler state and does
/// not mutate the schedule store.
#[tokio::test]
async fn test_test_azan_bypasses_scheduler() {
    let rig = TestRig::start().await;

    let handle = rig
        .playback
        .test_azan(&TrackId::new("azan_makkah"), 0.8)
        .await
        .unwrap();

    assert!(handle.is_active());
    assert_eq!(rig.audio.play_count(), 1);
    assert!(rig.store.list_alarms().await.unwrap().is_empty());

    rig.shutdown().await;
}

/// Stopping through stop_current ends the session, dismisses its
/// notification, and is a no-op when nothing plays.
#[tokio::test]
async fn test_stop_current_dismisses_notification() {
    let rig = TestRig::start().await;

    rig.playback
        .test_azan(&TrackId::new("azan"), 0.8)
        .await
        .unwrap();
    assert_eq!(rig.notifier.active_count(), 1);

    rig.playback.stop_current().await;
    assert_eq!(rig.notifier.active_count(), 0);
    assert!(!rig.playback.is_playing().await);

    // second stop with nothing playing is a no-op
    rig.playback.stop_current().await;

    rig.shutdown().await;
}

/// A missing asset aborts the session before any notification shows.
#[tokio::test]
async fn test_missing_asset_aborts_cleanly() {
    let rig = TestRig::start().await;

    let result = rig.playback.test_azan(&TrackId::new("ghost"), 0.8).await;
    assert!(result.is_err());
    assert_eq!(rig.audio.play_count(), 0);
    assert_eq!(rig.notifier.active_count(), 0);
    assert!(!rig.playback.is_playing().await);

    rig.shutdown().await;
}

/// Natural completion dismisses the notification like an explicit stop.
#[tokio::test]
async fn test_auto_stop_equivalent_to_explicit_stop() {
    let rig = TestRig::start().await;

    let session = rig
        .playback
        .test_azan(&TrackId::new("azan"), 0.8)
        .await
        .unwrap();
    assert_eq!(rig.notifier.active_count(), 1);

    rig.audio.complete_current();

    let notifier = Arc::clone(&rig.notifier);
    wait_for("notification dismissal", Duration::from_secs(2), move || {
        notifier.active_count() == 0
    })
    .await;
    assert!(!session.is_active());

    rig.shutdown().await;
}

/// A fired azan plays at the volume and track it was scheduled with.
#[tokio::test]
async fn test_session_uses_scheduled_track() {
    let rig = TestRig::start().await;

    rig.handle
        .schedule_alarm(
            PrayerSlot::Fajr,
            chrono::Utc::now() + chrono::Duration::milliseconds(40),
            TrackId::new("azan_fajr"),
            false,
        )
        .await
        .unwrap();

    let audio = Arc::clone(&rig.audio);
    wait_for("session start", Duration::from_secs(2), move || {
        audio.play_count() == 1
    })
    .await;

    let (path, volume) = rig.audio.last_play().unwrap();
    assert!(path.ends_with("azan_fajr.mp3"));
    assert!(volume > 0.0);

    rig.shutdown().await;
}
