//! Recovery scenarios: the reboot flag and restart re-arming.

use chrono::{Duration as ChronoDuration, Utc};
use muezzin::storage::StoredAlarm;
use muezzin::{
    AlarmTimer, EventBus, InMemoryStore, PrayerSlot, RebootRecoveryHook, ScheduleStore, TrackId,
};
use std::sync::Arc;

use crate::common::TestRig;

/// The boot signal sets needs_reschedule and nothing else.
#[tokio::test]
async fn test_boot_signal_sets_flag_only() {
    let rig = TestRig::start().await;

    let hook = RebootRecoveryHook::new(Arc::clone(&rig.store), Arc::new(EventBus::new()));
    hook.on_boot_signal().await.unwrap();

    assert!(rig.handle.needs_reschedule().await.unwrap());
    // the hook re-arms nothing itself
    assert_eq!(rig.timer.armed_count(), 0);

    rig.shutdown().await;
}

/// The flag is unaffected by unrelated operations: cancel and playback.
#[tokio::test]
async fn test_flag_survives_cancel_and_playback() {
    let rig = TestRig::start().await;

    let hook = RebootRecoveryHook::new(Arc::clone(&rig.store), Arc::new(EventBus::new()));
    hook.on_boot_signal().await.unwrap();

    rig.handle
        .schedule_alarm(
            PrayerSlot::Fajr,
            Utc::now() + ChronoDuration::hours(1),
            TrackId::new("azan"),
            false,
        )
        .await
        .unwrap();
    rig.handle.cancel(PrayerSlot::Fajr).await.unwrap();
    rig.handle.cancel_all().await.unwrap();

    rig.playback
        .test_azan(&TrackId::new("azan"), 0.8)
        .await
        .unwrap();
    rig.playback.stop_current().await;

    assert!(rig.handle.needs_reschedule().await.unwrap());

    rig.handle.clear_reschedule_flag().await.unwrap();
    assert!(!rig.handle.needs_reschedule().await.unwrap());

    rig.shutdown().await;
}

/// After a process restart, recover() re-arms persisted future alarms
/// and prunes expired ones.
#[tokio::test]
async fn test_restart_recovery_rearms_future_alarms() {
    // a store left behind by a previous run
    let store = Arc::new(InMemoryStore::new());
    store
        .upsert_alarm(StoredAlarm::azan(
            PrayerSlot::Isha,
            Utc::now() + ChronoDuration::hours(3),
            TrackId::new("azan"),
            0.8,
            true,
        ))
        .await
        .unwrap();
    store
        .upsert_alarm(StoredAlarm::reminder(
            PrayerSlot::Isha,
            Utc::now() + ChronoDuration::hours(3) - ChronoDuration::minutes(5),
        ))
        .await
        .unwrap();
    store
        .upsert_alarm(StoredAlarm::azan(
            PrayerSlot::Fajr,
            Utc::now() - ChronoDuration::hours(5),
            TrackId::new("azan_fajr"),
            0.8,
            true,
        ))
        .await
        .unwrap();

    // "restart": fresh engine over the surviving store
    let (fired_tx, _fired_rx) = tokio::sync::mpsc::channel(muezzin::timer::FIRED_CHANNEL_BUFFER);
    let timer = Arc::new(muezzin::SleepTimer::new(
        fired_tx,
        Arc::new(muezzin::platform::permissions::Unrestricted),
    ));
    let scheduler = muezzin::AzanScheduler::with_store(
        Arc::clone(&store),
        Arc::clone(&timer) as Arc<dyn muezzin::AlarmTimer>,
        Arc::new(muezzin::testing::FixedTimeSource::new(
            muezzin::DayTimes::new(),
        )),
    );
    let (handle, task) = scheduler.start().await;

    let rearmed = handle.recover().await.unwrap();
    assert_eq!(rearmed, 2, "azan and reminder for Isha");

    assert!(timer.is_armed(PrayerSlot::Isha.alarm_key()));
    assert!(timer.is_armed(PrayerSlot::Isha.reminder_key()));
    assert!(!timer.is_armed(PrayerSlot::Fajr.alarm_key()));

    // the expired Fajr record was pruned
    let remaining = store.list_alarms().await.unwrap();
    assert_eq!(remaining.len(), 2);
    assert!(remaining.iter().all(|a| a.slot == PrayerSlot::Isha));

    handle.shutdown().await.unwrap();
    let _ = task.await;
}

/// Recovery over an empty store is a clean no-op.
#[tokio::test]
async fn test_recovery_with_empty_store() {
    let rig = TestRig::start().await;
    let rearmed = rig.handle.recover().await.unwrap();
    assert_eq!(rearmed, 0);
    rig.shutdown().await;
}
