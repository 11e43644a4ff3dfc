//! Dispatch scenarios: firing order, preemption, reminders.

use chrono::{Duration as ChronoDuration, Utc};
use muezzin::{PrayerSlot, TrackId};
use std::sync::Arc;
use std::time::Duration;

use crate::common::{wait_for, TestRig};

/// Fajr fires, its session completes naturally, then Dhuhr fires and
/// gets its own session with its own track.
#[tokio::test]
async fn test_consecutive_prayers_get_consecutive_sessions() {
    let rig = TestRig::start().await;

    rig.handle
        .schedule_alarm(
            PrayerSlot::Fajr,
            Utc::now() + ChronoDuration::milliseconds(40),
            TrackId::new("azan_fajr"),
            false,
        )
        .await
        .unwrap();
    rig.handle
        .schedule_alarm(
            PrayerSlot::Dhuhr,
            Utc::now() + ChronoDuration::milliseconds(250),
            TrackId::new("azan"),
            false,
        )
        .await
        .unwrap();

    let audio = Arc::clone(&rig.audio);
    wait_for("Fajr session", Duration::from_secs(2), move || {
        audio.play_count() == 1
    })
    .await;
    assert_eq!(rig.playback.current_slot().await, Some(PrayerSlot::Fajr));

    // Fajr finishes on its own before Dhuhr's time arrives
    rig.audio.complete_current();

    let audio = Arc::clone(&rig.audio);
    wait_for("Dhuhr session", Duration::from_secs(2), move || {
        audio.play_count() == 2
    })
    .await;
    assert_eq!(rig.playback.current_slot().await, Some(PrayerSlot::Dhuhr));

    let paths = rig.audio.played_paths();
    assert!(paths[0].ends_with("azan_fajr.mp3"));
    assert!(paths[1].ends_with("azan.mp3"));
    // only the second session is still live
    assert_eq!(rig.audio.active_count(), 1);

    rig.shutdown().await;
}

/// A firing that arrives while another session plays preempts it:
/// last wins, nothing is queued.
#[tokio::test]
async fn test_overlapping_firings_last_wins() {
    let rig = TestRig::start().await;

    rig.handle
        .schedule_alarm(
            PrayerSlot::Maghrib,
            Utc::now() + ChronoDuration::milliseconds(40),
            TrackId::new("azan"),
            false,
        )
        .await
        .unwrap();
    rig.handle
        .schedule_alarm(
            PrayerSlot::Isha,
            Utc::now() + ChronoDuration::milliseconds(120),
            TrackId::new("azan_makkah"),
            false,
        )
        .await
        .unwrap();

    let audio = Arc::clone(&rig.audio);
    wait_for("both firings", Duration::from_secs(2), move || {
        audio.play_count() == 2
    })
    .await;

    // the Maghrib session was stopped by the Isha firing
    assert_eq!(rig.audio.active_count(), 1);
    assert_eq!(rig.playback.current_slot().await, Some(PrayerSlot::Isha));

    rig.shutdown().await;
}

/// A fired reminder shows a notification naming its slot and never
/// touches playback.
#[tokio::test]
async fn test_reminder_shows_notification_without_playback() {
    let rig = TestRig::start().await;

    rig.handle
        .schedule_reminder(
            PrayerSlot::Fajr,
            Utc::now() + ChronoDuration::milliseconds(40),
        )
        .await
        .unwrap();

    let notifier = Arc::clone(&rig.notifier);
    wait_for("reminder notification", Duration::from_secs(2), move || {
        notifier.shown_count() == 1
    })
    .await;

    let titles = rig.notifier.shown_titles();
    assert!(titles[0].contains("Fajr"));
    assert_eq!(rig.audio.play_count(), 0);
    assert!(!rig.playback.is_playing().await);

    rig.shutdown().await;
}

/// Cancellation is safe against an already-dispatched firing: the
/// running session is unaffected.
#[tokio::test]
async fn test_cancel_does_not_stop_dispatched_session() {
    let rig = TestRig::start().await;

    rig.handle
        .schedule_alarm(
            PrayerSlot::Asr,
            Utc::now() + ChronoDuration::milliseconds(40),
            TrackId::new("azan"),
            false,
        )
        .await
        .unwrap();

    let audio = Arc::clone(&rig.audio);
    wait_for("Asr session", Duration::from_secs(2), move || {
        audio.play_count() == 1
    })
    .await;

    rig.handle.cancel(PrayerSlot::Asr).await.unwrap();

    // the session keeps playing; cancellation only affects future
    // registrations
    assert!(rig.playback.is_playing().await);
    assert_eq!(rig.audio.active_count(), 1);

    rig.shutdown().await;
}

/// The wake hold taken during dispatch is released after handoff.
#[tokio::test]
async fn test_wake_hold_released_after_handoff() {
    let rig = TestRig::start().await;

    rig.handle
        .schedule_alarm(
            PrayerSlot::Fajr,
            Utc::now() + ChronoDuration::milliseconds(40),
            TrackId::new("azan"),
            false,
        )
        .await
        .unwrap();

    let audio = Arc::clone(&rig.audio);
    wait_for("session start", Duration::from_secs(2), move || {
        audio.play_count() == 1
    })
    .await;

    let wake = rig.wake.clone();
    wait_for("wake hold release", Duration::from_secs(2), move || {
        wake.active_holds() == 0
    })
    .await;

    rig.shutdown().await;
}

/// Vibration runs with the session and stops with it.
#[tokio::test]
async fn test_vibration_follows_session_lifecycle() {
    let rig = TestRig::start().await;

    rig.handle
        .schedule_alarm(
            PrayerSlot::Isha,
            Utc::now() + ChronoDuration::milliseconds(40),
            TrackId::new("azan"),
            true,
        )
        .await
        .unwrap();

    let vibrator = Arc::clone(&rig.vibrator);
    wait_for("vibration start", Duration::from_secs(2), move || {
        vibrator.is_vibrating()
    })
    .await;

    rig.playback.stop_current().await;
    assert!(!rig.vibrator.is_vibrating());

    rig.shutdown().await;
}
