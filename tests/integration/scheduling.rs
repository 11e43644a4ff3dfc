//! Scheduling semantics: replacement, idempotency, cancellation.

use chrono::{Duration as ChronoDuration, Timelike, Utc};
use muezzin::timesource::DayTimes;
use muezzin::{AlarmTimer, AzanSettings, PrayerSlot, ScheduleStore, TrackId};
use std::time::Duration;

use crate::common::{wait_for, TestRig};

/// Build a timetable whose slots all land about one hour from now.
fn future_day() -> (chrono::NaiveDate, DayTimes) {
    let base = Utc::now() + ChronoDuration::hours(1);
    let t = base.time();
    let mut times = DayTimes::new();
    for slot in PrayerSlot::ALL {
        times.set(
            slot,
            chrono::NaiveTime::from_hms_opt(t.hour(), t.minute(), 0).unwrap(),
        );
    }
    (base.date_naive(), times)
}

/// After schedule_day, at most one registration exists per slot even
/// when called repeatedly with identical input.
#[tokio::test]
async fn test_schedule_day_repeated_leaves_one_registration_per_slot() {
    let rig = TestRig::start().await;
    let (date, times) = future_day();

    for _ in 0..3 {
        rig.handle
            .schedule_day(date, times.clone(), AzanSettings::default())
            .await
            .unwrap();
    }

    let alarms = rig.store.list_alarms().await.unwrap();
    assert_eq!(alarms.len(), 10, "five azans and five reminders");
    assert_eq!(rig.timer.armed_count(), 10);

    for slot in PrayerSlot::ALL {
        assert!(rig.timer.is_armed(slot.alarm_key()));
        assert!(rig.timer.is_armed(slot.reminder_key()));
    }

    rig.shutdown().await;
}

/// Scheduling t1 then t2 for the same slot arms exactly t2; nothing
/// fires at t1.
#[tokio::test]
async fn test_replacement_never_fires_at_old_time() {
    let rig = TestRig::start().await;

    let t1 = Utc::now() + ChronoDuration::milliseconds(60);
    let t2 = Utc::now() + ChronoDuration::hours(6);
    rig.handle
        .schedule_alarm(PrayerSlot::Dhuhr, t1, TrackId::new("azan"), false)
        .await
        .unwrap();
    rig.handle
        .schedule_alarm(PrayerSlot::Dhuhr, t2, TrackId::new("azan"), false)
        .await
        .unwrap();

    // let t1 pass; the replaced registration must not dispatch
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(rig.audio.play_count(), 0);
    assert!(!rig.playback.is_playing().await);

    let record = rig
        .store
        .get_alarm(PrayerSlot::Dhuhr.alarm_key())
        .await
        .unwrap();
    assert_eq!(record.fire_at, t2);

    rig.shutdown().await;
}

/// Cancelling a slot then advancing past its fire time produces no
/// dispatch.
#[tokio::test]
async fn test_cancel_then_fire_time_passes_silently() {
    let rig = TestRig::start().await;

    let fire_at = Utc::now() + ChronoDuration::milliseconds(60);
    rig.handle
        .schedule_alarm(PrayerSlot::Asr, fire_at, TrackId::new("azan"), false)
        .await
        .unwrap();
    rig.handle.cancel(PrayerSlot::Asr).await.unwrap();

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(rig.audio.play_count(), 0);
    assert_eq!(rig.notifier.shown_count(), 0);

    rig.shutdown().await;
}

/// cancel_all sweeps the whole fixed key range and clears the store.
#[tokio::test]
async fn test_cancel_all_clears_everything() {
    let rig = TestRig::start().await;
    let (date, times) = future_day();
    rig.handle
        .schedule_day(date, times, AzanSettings::default())
        .await
        .unwrap();

    rig.handle.cancel_all().await.unwrap();

    assert!(rig.store.list_alarms().await.unwrap().is_empty());
    assert_eq!(rig.timer.armed_count(), 0);

    rig.shutdown().await;
}

/// A reminder whose lead time has already elapsed is not armed, while
/// the azan itself still is.
#[tokio::test]
async fn test_elapsed_lead_skips_reminder_only() {
    let rig = TestRig::start().await;

    // prayer in two minutes: its five-minute reminder window is gone
    let fire_at = Utc::now() + ChronoDuration::minutes(2);
    let t = fire_at.time();
    let times = DayTimes::new().with(
        PrayerSlot::Fajr,
        chrono::NaiveTime::from_hms_opt(t.hour(), t.minute(), t.second()).unwrap(),
    );

    let armed = rig
        .handle
        .schedule_day(fire_at.date_naive(), times, AzanSettings::default())
        .await
        .unwrap();

    assert_eq!(armed, 1);
    assert!(rig.timer.is_armed(PrayerSlot::Fajr.alarm_key()));
    assert!(!rig.timer.is_armed(PrayerSlot::Fajr.reminder_key()));

    rig.shutdown().await;
}

/// A fired azan prunes its store row once dispatched.
#[tokio::test]
async fn test_fired_alarm_pruned_from_store() {
    let rig = TestRig::start().await;

    let fire_at = Utc::now() + ChronoDuration::milliseconds(40);
    rig.handle
        .schedule_alarm(PrayerSlot::Maghrib, fire_at, TrackId::new("azan"), false)
        .await
        .unwrap();

    let audio = std::sync::Arc::clone(&rig.audio);
    wait_for("azan to fire", Duration::from_secs(2), move || {
        audio.play_count() == 1
    })
    .await;

    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        if rig.store.list_alarms().await.unwrap().is_empty() {
            break;
        }
        if tokio::time::Instant::now() > deadline {
            panic!("timeout waiting for store row to be pruned");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    rig.shutdown().await;
}
