//! Alarm dispatch: the callback side of the timer service.
//!
//! Fired registrations arrive over a channel (the fast, non-blocking
//! stage); the dispatcher holds a bounded wake guard while it resolves
//! the payload and hands playback off to the long-running session (the
//! slow stage). The dispatcher is back to Idle as soon as the handoff
//! completes; the session lifecycle belongs to the controller.
//!
//! If an azan fires while another session is playing, the new firing
//! wins: the current session is stopped, never queued behind.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::core::slot::PrayerSlot;
use crate::events::{ArmedKind, Event, EventBus};
use crate::notify::{Notification, Notifier};
use crate::playback::PlaybackController;
use crate::scheduler::SchedulerHandle;
use crate::timer::{AlarmPayload, FiredAlarm};

/// Default bound on the wake hold taken while starting playback.
pub const WAKE_HOLD: Duration = Duration::from_secs(60);

/// Dispatcher state, observable through the watch channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    /// No alarm is being dispatched.
    Idle,
    /// An azan firing is being handed off to playback.
    Firing(PrayerSlot),
}

/// Source of bounded wake holds.
///
/// A hold keeps the process awake between the timer callback and the
/// playback handoff; it auto-releases at its bound so a stuck handoff
/// cannot pin the device.
#[derive(Clone, Default)]
pub struct WakeSource {
    active: Arc<AtomicUsize>,
}

impl WakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a hold that auto-releases after `bound`.
    pub fn hold(&self, bound: Duration) -> WakeGuard {
        self.active.fetch_add(1, Ordering::SeqCst);
        let released = Arc::new(AtomicBool::new(false));

        let active = Arc::clone(&self.active);
        let released_flag = Arc::clone(&released);
        tokio::spawn(async move {
            tokio::time::sleep(bound).await;
            if !released_flag.swap(true, Ordering::SeqCst) {
                tracing::warn!(bound_secs = bound.as_secs(), "wake hold hit its bound");
                active.fetch_sub(1, Ordering::SeqCst);
            }
        });

        WakeGuard {
            active: Arc::clone(&self.active),
            released,
        }
    }

    /// Number of currently active holds.
    pub fn active_holds(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

/// An active wake hold; released on drop or at its bound.
pub struct WakeGuard {
    active: Arc<AtomicUsize>,
    released: Arc<AtomicBool>,
}

impl Drop for WakeGuard {
    fn drop(&mut self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            self.active.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

/// Dispatcher configuration.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Bound on the wake hold taken per firing.
    pub wake_hold: Duration,
    /// Lead minutes quoted in reminder notification text.
    pub reminder_lead_minutes: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            wake_hold: WAKE_HOLD,
            reminder_lead_minutes: 5,
        }
    }
}

/// Resolves fired registrations into playback or notifications.
pub struct AlarmDispatcher {
    playback: PlaybackController,
    notifier: Arc<dyn Notifier>,
    scheduler: SchedulerHandle,
    events: Arc<EventBus>,
    wake: WakeSource,
    config: DispatcherConfig,
    state_tx: watch::Sender<DispatchState>,
}

impl AlarmDispatcher {
    /// Create a dispatcher; the returned receiver observes state
    /// transitions.
    pub fn new(
        playback: PlaybackController,
        notifier: Arc<dyn Notifier>,
        scheduler: SchedulerHandle,
        events: Arc<EventBus>,
        wake: WakeSource,
        config: DispatcherConfig,
    ) -> (Self, watch::Receiver<DispatchState>) {
        let (state_tx, state_rx) = watch::channel(DispatchState::Idle);
        (
            Self {
                playback,
                notifier,
                scheduler,
                events,
                wake,
                config,
                state_tx,
            },
            state_rx,
        )
    }

    /// Run the dispatch loop on the given fired-alarm channel.
    pub fn spawn(self, fired_rx: mpsc::Receiver<FiredAlarm>) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run(fired_rx).await;
        })
    }

    async fn run(self, mut fired_rx: mpsc::Receiver<FiredAlarm>) {
        while let Some(fired) = fired_rx.recv().await {
            self.handle_fired(fired).await;
        }
        tracing::debug!("fired-alarm channel closed, dispatcher exiting");
    }

    async fn handle_fired(&self, fired: FiredAlarm) {
        match fired.payload {
            AlarmPayload::Azan {
                slot,
                track,
                volume,
                vibrate,
            } => {
                // Hold the wake guard until the session start is handed
                // off; the guard bounds itself even if playback stalls.
                let _wake = self.wake.hold(self.config.wake_hold);
                let _ = self.state_tx.send(DispatchState::Firing(slot));

                tracing::info!(slot = %slot, track = %track, "azan alarm fired");
                self.events
                    .emit(Event::alarm_fired(slot, ArmedKind::Azan))
                    .await;

                if let Err(e) = self.playback.start(slot, &track, volume, vibrate).await {
                    tracing::warn!(slot = %slot, error = %e, "playback did not start");
                }

                self.scheduler.mark_fired(fired.key).await;
                let _ = self.state_tx.send(DispatchState::Idle);
            }
            AlarmPayload::Reminder { slot } => {
                tracing::info!(slot = %slot, "reminder fired");
                self.events
                    .emit(Event::alarm_fired(slot, ArmedKind::Reminder))
                    .await;

                self.notifier.show(Notification::reminder(
                    slot,
                    self.config.reminder_lead_minutes,
                ));
                self.events.emit(Event::reminder_shown(slot)).await;
                self.scheduler.mark_fired(fired.key).await;
            }
        }
    }
}
