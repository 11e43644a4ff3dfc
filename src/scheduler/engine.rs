//! Scheduler engine implementation.
//!
//! The scheduler is responsible for:
//! - Converting a day's prayer times into timer registrations
//! - Replacing a slot's registration idempotently (most recent call wins)
//! - Falling back to best-effort delivery when exact wakes are denied
//! - Cancelling single slots or the whole fixed key range
//! - Driving the daily network refresh off the command loop
//! - Recovery after a process restart
//! - Event emission
//!
//! It is the only writer to the [`ScheduleStore`]; every mutation is
//! serialized through its command channel.

use chrono::{DateTime, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio::task::JoinHandle;

use crate::core::settings::AzanSettings;
use crate::core::slot::{sweep_keys, AlarmKey, PrayerSlot, REMINDER_KEY_RANGE};
use crate::core::types::{Coordinates, TrackId};
use crate::events::{ArmedKind, Event, EventBus};
use crate::storage::{ScheduleStore, StoreError, StoredAlarm};
use crate::timer::{AlarmPayload, AlarmTimer, Precision, Registration, TimerError};
use crate::timesource::{DayTimes, TimeSource, TimeSourceError};

/// Buffer size for the command channel between SchedulerHandle and engine.
const COMMAND_CHANNEL_BUFFER: usize = 32;

/// Errors that can occur in the scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Channel error.
    #[error("channel error: {0}")]
    Channel(String),

    /// Daily refresh aborted.
    #[error("schedule refresh failed: {0}")]
    Refresh(#[from] TimeSourceError),
}

/// State of the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Scheduler is processing commands.
    Running,
    /// Scheduler has shut down.
    Stopped,
}

/// Commands that can be sent to the scheduler.
enum SchedulerCommand {
    ScheduleDay {
        date: NaiveDate,
        times: DayTimes,
        settings: AzanSettings,
        response: oneshot::Sender<Result<usize, SchedulerError>>,
    },
    ScheduleAlarm {
        slot: PrayerSlot,
        fire_at: DateTime<Utc>,
        track: TrackId,
        vibrate: bool,
        response: oneshot::Sender<Result<(), SchedulerError>>,
    },
    ScheduleReminder {
        slot: PrayerSlot,
        fire_at: DateTime<Utc>,
        response: oneshot::Sender<Result<(), SchedulerError>>,
    },
    Cancel {
        slot: PrayerSlot,
        response: oneshot::Sender<Result<(), SchedulerError>>,
    },
    CancelAll {
        response: oneshot::Sender<Result<(), SchedulerError>>,
    },
    CancelAllReminders {
        response: oneshot::Sender<Result<(), SchedulerError>>,
    },
    Refresh {
        response: oneshot::Sender<Result<usize, SchedulerError>>,
    },
    Recover {
        response: oneshot::Sender<Result<usize, SchedulerError>>,
    },
    MarkFired {
        key: AlarmKey,
    },
    NeedsReschedule {
        response: oneshot::Sender<Result<bool, SchedulerError>>,
    },
    ClearRescheduleFlag {
        response: oneshot::Sender<Result<(), SchedulerError>>,
    },
    Shutdown {
        response: oneshot::Sender<()>,
    },
}

/// Handle for controlling the scheduler.
#[derive(Clone)]
pub struct SchedulerHandle {
    command_tx: mpsc::Sender<SchedulerCommand>,
    state: Arc<RwLock<SchedulerState>>,
}

impl SchedulerHandle {
    /// Helper to send a command that returns a result and wait for response.
    async fn send_result_command<T>(
        &self,
        build_command: impl FnOnce(oneshot::Sender<Result<T, SchedulerError>>) -> SchedulerCommand,
        operation: &str,
    ) -> Result<T, SchedulerError>
    where
        T: Send + 'static,
    {
        let (response_tx, response_rx) = oneshot::channel();
        self.command_tx
            .send(build_command(response_tx))
            .await
            .map_err(|_| {
                SchedulerError::Channel(format!("failed to send {} command", operation))
            })?;

        response_rx.await.map_err(|_| {
            SchedulerError::Channel(format!("failed to receive {} response", operation))
        })?
    }

    /// Arm the azan and reminder registrations for a day's timetable.
    ///
    /// Returns the number of azan registrations armed. Slots whose fire
    /// time already passed are skipped; per-slot failures are absorbed.
    pub async fn schedule_day(
        &self,
        date: NaiveDate,
        times: DayTimes,
        settings: AzanSettings,
    ) -> Result<usize, SchedulerError> {
        self.send_result_command(
            |response| SchedulerCommand::ScheduleDay {
                date,
                times,
                settings,
                response,
            },
            "schedule_day",
        )
        .await
    }

    /// Arm a single azan alarm, replacing any prior registration for
    /// the slot.
    pub async fn schedule_alarm(
        &self,
        slot: PrayerSlot,
        fire_at: DateTime<Utc>,
        track: TrackId,
        vibrate: bool,
    ) -> Result<(), SchedulerError> {
        self.send_result_command(
            |response| SchedulerCommand::ScheduleAlarm {
                slot,
                fire_at,
                track,
                vibrate,
                response,
            },
            "schedule_alarm",
        )
        .await
    }

    /// Arm a single reminder, replacing any prior reminder for the slot.
    pub async fn schedule_reminder(
        &self,
        slot: PrayerSlot,
        fire_at: DateTime<Utc>,
    ) -> Result<(), SchedulerError> {
        self.send_result_command(
            |response| SchedulerCommand::ScheduleReminder {
                slot,
                fire_at,
                response,
            },
            "schedule_reminder",
        )
        .await
    }

    /// Cancel one slot's azan registration without touching others.
    pub async fn cancel(&self, slot: PrayerSlot) -> Result<(), SchedulerError> {
        self.send_result_command(|response| SchedulerCommand::Cancel { slot, response }, "cancel")
            .await
    }

    /// Cancel every alarm and reminder registration and clear the store.
    pub async fn cancel_all(&self) -> Result<(), SchedulerError> {
        self.send_result_command(
            |response| SchedulerCommand::CancelAll { response },
            "cancel_all",
        )
        .await
    }

    /// Cancel every reminder registration.
    pub async fn cancel_all_reminders(&self) -> Result<(), SchedulerError> {
        self.send_result_command(
            |response| SchedulerCommand::CancelAllReminders { response },
            "cancel_all_reminders",
        )
        .await
    }

    /// Fetch today's timetable from the time source and re-arm the day.
    ///
    /// Fetch or parse failures abort the cycle without touching armed
    /// registrations.
    pub async fn refresh(&self) -> Result<usize, SchedulerError> {
        self.send_result_command(|response| SchedulerCommand::Refresh { response }, "refresh")
            .await
    }

    /// Re-arm persisted future alarms after a process restart, pruning
    /// the ones whose fire time has passed.
    pub async fn recover(&self) -> Result<usize, SchedulerError> {
        self.send_result_command(|response| SchedulerCommand::Recover { response }, "recover")
            .await
    }

    /// Tell the scheduler a registration has fired so its store row can
    /// be pruned. Fire-and-forget.
    pub async fn mark_fired(&self, key: AlarmKey) {
        let _ = self
            .command_tx
            .send(SchedulerCommand::MarkFired { key })
            .await;
    }

    /// Read the needs-reschedule flag.
    pub async fn needs_reschedule(&self) -> Result<bool, SchedulerError> {
        self.send_result_command(
            |response| SchedulerCommand::NeedsReschedule { response },
            "needs_reschedule",
        )
        .await
    }

    /// Clear the needs-reschedule flag after the schedule was recomputed.
    pub async fn clear_reschedule_flag(&self) -> Result<(), SchedulerError> {
        self.send_result_command(
            |response| SchedulerCommand::ClearRescheduleFlag { response },
            "clear_reschedule_flag",
        )
        .await
    }

    /// Shutdown the scheduler.
    pub async fn shutdown(&self) -> Result<(), SchedulerError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.command_tx
            .send(SchedulerCommand::Shutdown {
                response: response_tx,
            })
            .await
            .map_err(|_| SchedulerError::Channel("failed to send shutdown command".into()))?;

        response_rx
            .await
            .map_err(|_| SchedulerError::Channel("failed to receive shutdown response".into()))
    }

    /// Get the current scheduler state.
    pub async fn state(&self) -> SchedulerState {
        *self.state.read().await
    }

    /// Check if the scheduler is running.
    pub async fn is_running(&self) -> bool {
        *self.state.read().await == SchedulerState::Running
    }
}

/// The alarm scheduling engine.
pub struct AzanScheduler<S: ScheduleStore> {
    /// Persistent alarm records and flags.
    store: Arc<S>,
    /// Timer service for wake registrations.
    timer: Arc<dyn AlarmTimer>,
    /// External supplier of the daily timetable.
    time_source: Arc<dyn TimeSource>,
    /// Event bus for emitting lifecycle events.
    events: Arc<EventBus>,
    /// Settings used by refresh and single-alarm scheduling.
    settings: AzanSettings,
    /// Location for timetable fetches.
    coordinates: Coordinates,
    /// Local timezone the timetable's wall-clock times refer to.
    timezone: Tz,
    /// Calculation method id passed to the time source.
    method: u32,
}

impl<S: ScheduleStore + 'static> AzanScheduler<S> {
    /// Create a scheduler over the given collaborators.
    pub fn new(store: S, timer: Arc<dyn AlarmTimer>, time_source: Arc<dyn TimeSource>) -> Self {
        Self::with_store(Arc::new(store), timer, time_source)
    }

    /// Create a scheduler with shared store ownership (for testing).
    pub fn with_store(
        store: Arc<S>,
        timer: Arc<dyn AlarmTimer>,
        time_source: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            store,
            timer,
            time_source,
            events: Arc::new(EventBus::new()),
            settings: AzanSettings::default(),
            coordinates: Coordinates::new(0.0, 0.0),
            timezone: chrono_tz::UTC,
            method: 20,
        }
    }

    /// Set the event bus.
    pub fn with_event_bus(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    /// Set the default settings used by refresh.
    pub fn with_settings(mut self, settings: AzanSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Set the location and timezone for timetable fetches.
    pub fn with_location(mut self, coordinates: Coordinates, timezone: Tz) -> Self {
        self.coordinates = coordinates;
        self.timezone = timezone;
        self
    }

    /// Set the calculation method id.
    pub fn with_method(mut self, method: u32) -> Self {
        self.method = method;
        self
    }

    /// Get the event bus.
    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Start the engine and return a handle for controlling it.
    pub async fn start(self) -> (SchedulerHandle, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_BUFFER);
        let state = Arc::new(RwLock::new(SchedulerState::Running));

        let handle = SchedulerHandle {
            command_tx,
            state: Arc::clone(&state),
        };

        let self_handle = handle.clone();
        let engine_task = tokio::spawn(async move {
            self.run(command_rx, state, self_handle).await;
        });

        (handle, engine_task)
    }

    /// Main command loop.
    async fn run(
        self,
        mut command_rx: mpsc::Receiver<SchedulerCommand>,
        state: Arc<RwLock<SchedulerState>>,
        self_handle: SchedulerHandle,
    ) {
        while let Some(command) = command_rx.recv().await {
            match command {
                SchedulerCommand::ScheduleDay {
                    date,
                    times,
                    settings,
                    response,
                } => {
                    let result = self.schedule_day(date, &times, &settings).await;
                    let _ = response.send(result);
                }
                SchedulerCommand::ScheduleAlarm {
                    slot,
                    fire_at,
                    track,
                    vibrate,
                    response,
                } => {
                    self.arm_azan(slot, fire_at, track, self.settings.volume, vibrate)
                        .await;
                    let _ = response.send(Ok(()));
                }
                SchedulerCommand::ScheduleReminder {
                    slot,
                    fire_at,
                    response,
                } => {
                    self.arm_reminder(slot, fire_at).await;
                    let _ = response.send(Ok(()));
                }
                SchedulerCommand::Cancel { slot, response } => {
                    let result = self.cancel_slot(slot).await;
                    let _ = response.send(result);
                }
                SchedulerCommand::CancelAll { response } => {
                    let result = self.cancel_all().await;
                    let _ = response.send(result);
                }
                SchedulerCommand::CancelAllReminders { response } => {
                    let result = self.cancel_all_reminders().await;
                    let _ = response.send(result);
                }
                SchedulerCommand::Refresh { response } => {
                    // Fetch runs detached so network latency never
                    // stalls command processing; the write phase
                    // re-enters through the handle.
                    self.spawn_refresh(self_handle.clone(), response);
                }
                SchedulerCommand::Recover { response } => {
                    let result = self.recover().await;
                    let _ = response.send(result);
                }
                SchedulerCommand::MarkFired { key } => {
                    match self.store.remove_alarm(key).await {
                        Ok(()) | Err(StoreError::NotFound(_)) => {}
                        Err(e) => {
                            tracing::warn!(key = %key, error = %e, "failed to prune fired alarm");
                        }
                    }
                }
                SchedulerCommand::NeedsReschedule { response } => {
                    let result = self.store.needs_reschedule().await.map_err(Into::into);
                    let _ = response.send(result);
                }
                SchedulerCommand::ClearRescheduleFlag { response } => {
                    let result = self
                        .store
                        .set_needs_reschedule(false)
                        .await
                        .map_err(Into::into);
                    let _ = response.send(result);
                }
                SchedulerCommand::Shutdown { response } => {
                    let mut s = state.write().await;
                    *s = SchedulerState::Stopped;
                    let _ = response.send(());
                    break;
                }
            }
        }
    }

    /// Arm azan and reminder registrations for each future slot.
    async fn schedule_day(
        &self,
        date: NaiveDate,
        times: &DayTimes,
        settings: &AzanSettings,
    ) -> Result<usize, SchedulerError> {
        let now = Utc::now();
        let mut armed = 0;

        for slot in PrayerSlot::ALL {
            let Some(local_time) = times.get(slot) else {
                continue;
            };

            let Some(fire_at) = self.fire_time(date, local_time) else {
                tracing::warn!(slot = %slot, %date, "local time does not exist, skipping slot");
                continue;
            };

            if fire_at <= now {
                tracing::debug!(slot = %slot, fire_at = %fire_at, "prayer time already passed");
                continue;
            }

            let track = settings.track_for(slot).clone();
            if self
                .arm_azan(slot, fire_at, track, settings.volume, settings.vibrate)
                .await
            {
                armed += 1;
            }

            let remind_at = fire_at
                - chrono::Duration::from_std(settings.reminder_lead)
                    .unwrap_or_else(|_| chrono::Duration::minutes(5));
            if remind_at > now {
                self.arm_reminder(slot, remind_at).await;
            } else {
                tracing::debug!(slot = %slot, "reminder lead already elapsed, not arming");
            }
        }

        Ok(armed)
    }

    /// Resolve a local wall-clock time to UTC. Returns None when the
    /// time falls into a DST gap; ambiguous times take the earlier side.
    fn fire_time(&self, date: NaiveDate, time: NaiveTime) -> Option<DateTime<Utc>> {
        match self.timezone.from_local_datetime(&date.and_time(time)) {
            LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
            LocalResult::Ambiguous(earlier, _) => Some(earlier.with_timezone(&Utc)),
            LocalResult::None => None,
        }
    }

    /// Arm an azan registration; returns whether it was armed.
    async fn arm_azan(
        &self,
        slot: PrayerSlot,
        fire_at: DateTime<Utc>,
        track: TrackId,
        volume: f32,
        vibrate: bool,
    ) -> bool {
        let registration = Registration {
            key: slot.alarm_key(),
            fire_at,
            payload: AlarmPayload::Azan {
                slot,
                track: track.clone(),
                volume,
                vibrate,
            },
        };

        let Some(precision) = self.arm_with_fallback(slot, ArmedKind::Azan, registration).await
        else {
            return false;
        };

        let record =
            StoredAlarm::azan(slot, fire_at, track, volume, vibrate).with_precision(precision);
        if let Err(e) = self.store.upsert_alarm(record).await {
            tracing::warn!(slot = %slot, error = %e, "failed to persist armed alarm");
        }

        self.events
            .emit(Event::alarm_armed(slot, ArmedKind::Azan, fire_at, precision))
            .await;
        true
    }

    /// Arm a reminder registration; returns whether it was armed.
    async fn arm_reminder(&self, slot: PrayerSlot, fire_at: DateTime<Utc>) -> bool {
        let registration = Registration {
            key: slot.reminder_key(),
            fire_at,
            payload: AlarmPayload::Reminder { slot },
        };

        let Some(precision) = self
            .arm_with_fallback(slot, ArmedKind::Reminder, registration)
            .await
        else {
            return false;
        };

        let record = StoredAlarm::reminder(slot, fire_at).with_precision(precision);
        if let Err(e) = self.store.upsert_alarm(record).await {
            tracing::warn!(slot = %slot, error = %e, "failed to persist armed reminder");
        }

        self.events
            .emit(Event::alarm_armed(
                slot,
                ArmedKind::Reminder,
                fire_at,
                precision,
            ))
            .await;
        true
    }

    /// Request exact delivery, falling back to best-effort when denied.
    ///
    /// An outright rejection leaves the slot unarmed and never
    /// propagates; other slots keep scheduling.
    async fn arm_with_fallback(
        &self,
        slot: PrayerSlot,
        kind: ArmedKind,
        registration: Registration,
    ) -> Option<Precision> {
        match self.timer.arm(registration.clone(), Precision::Exact) {
            Ok(granted) => Some(granted),
            Err(TimerError::ExactDenied) => {
                tracing::info!(
                    slot = %slot,
                    "exact wake delivery denied, falling back to best-effort"
                );
                match self.timer.arm(registration, Precision::BestEffort) {
                    Ok(granted) => Some(granted),
                    Err(e) => {
                        tracing::warn!(slot = %slot, error = %e, "timer rejected registration");
                        self.events
                            .emit(Event::registration_failed(slot, kind, e.to_string()))
                            .await;
                        None
                    }
                }
            }
            Err(e) => {
                tracing::warn!(slot = %slot, error = %e, "timer rejected registration");
                self.events
                    .emit(Event::registration_failed(slot, kind, e.to_string()))
                    .await;
                None
            }
        }
    }

    /// Cancel one slot's azan registration.
    async fn cancel_slot(&self, slot: PrayerSlot) -> Result<(), SchedulerError> {
        let key = slot.alarm_key();
        self.timer.cancel(key);
        match self.store.remove_alarm(key).await {
            Ok(()) | Err(StoreError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }
        self.events.emit(Event::alarm_cancelled(key)).await;
        Ok(())
    }

    /// Cancel the fixed key range covering all slots and reminders.
    async fn cancel_all(&self) -> Result<(), SchedulerError> {
        for key in sweep_keys() {
            self.timer.cancel(key);
        }
        self.store.clear_alarms().await?;
        tracing::info!("all alarm and reminder registrations cancelled");
        Ok(())
    }

    /// Cancel every reminder registration.
    async fn cancel_all_reminders(&self) -> Result<(), SchedulerError> {
        for raw in REMINDER_KEY_RANGE {
            let key = AlarmKey::new(raw);
            self.timer.cancel(key);
            match self.store.remove_alarm(key).await {
                Ok(()) | Err(StoreError::NotFound(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }
        tracing::info!("all reminder registrations cancelled");
        Ok(())
    }

    /// Re-arm persisted future alarms, pruning the expired ones.
    async fn recover(&self) -> Result<usize, SchedulerError> {
        let alarms = self.store.list_alarms().await?;
        let now = Utc::now();
        let mut rearmed = 0;

        for record in alarms {
            if record.fire_at <= now {
                tracing::debug!(key = %record.key, "pruning expired alarm record");
                match self.store.remove_alarm(record.key).await {
                    Ok(()) | Err(StoreError::NotFound(_)) => {}
                    Err(e) => {
                        tracing::warn!(key = %record.key, error = %e, "failed to prune record");
                    }
                }
                continue;
            }

            let payload = match &record.kind {
                crate::storage::AlarmKind::Azan {
                    track,
                    volume,
                    vibrate,
                } => AlarmPayload::Azan {
                    slot: record.slot,
                    track: track.clone(),
                    volume: *volume,
                    vibrate: *vibrate,
                },
                crate::storage::AlarmKind::Reminder => AlarmPayload::Reminder { slot: record.slot },
            };
            let kind = match record.kind {
                crate::storage::AlarmKind::Azan { .. } => ArmedKind::Azan,
                crate::storage::AlarmKind::Reminder => ArmedKind::Reminder,
            };

            let registration = Registration {
                key: record.key,
                fire_at: record.fire_at,
                payload,
            };
            if self
                .arm_with_fallback(record.slot, kind, registration)
                .await
                .is_some()
            {
                rearmed += 1;
            }
        }

        tracing::info!(rearmed, "recovery re-armed persisted alarms");
        Ok(rearmed)
    }

    /// Spawn the fetch-then-reschedule refresh task.
    fn spawn_refresh(
        &self,
        handle: SchedulerHandle,
        response: oneshot::Sender<Result<usize, SchedulerError>>,
    ) {
        let time_source = Arc::clone(&self.time_source);
        let events = Arc::clone(&self.events);
        let settings = self.settings.clone();
        let coordinates = self.coordinates;
        let timezone = self.timezone;
        let method = self.method;

        tokio::spawn(async move {
            let date = Utc::now().with_timezone(&timezone).date_naive();
            let result = match time_source.fetch(date, coordinates, method).await {
                Ok(times) => match handle.schedule_day(date, times, settings).await {
                    Ok(armed) => {
                        tracing::info!(%date, armed, "daily schedule refreshed");
                        events.emit(Event::schedule_refreshed(armed)).await;
                        Ok(armed)
                    }
                    Err(e) => Err(e),
                },
                Err(e) => {
                    tracing::warn!(error = %e, "schedule refresh aborted, keeping armed alarms");
                    events.emit(Event::refresh_failed(e.to_string())).await;
                    Err(SchedulerError::Refresh(e))
                }
            };
            let _ = response.send(result);
        });
    }
}
