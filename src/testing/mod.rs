//! Testing utilities for users of the muezzin library.
//!
//! This module provides controllable doubles for every external
//! collaborator:
//!
//! - [`FakeAudioBackend`]: records plays, completes on command
//! - [`FixedTimeSource`] / [`FailingTimeSource`]: canned timetable fetches
//! - [`RecordingNotifier`]: captures shown and dismissed notifications
//! - [`CountingVibrator`]: tracks vibration start/cancel calls
//! - [`DenyExactProbe`]: forces the best-effort arming fallback

use async_trait::async_trait;
use chrono::NaiveDate;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

use crate::core::types::Coordinates;
use crate::notify::{Notification, NotificationId, Notifier};
use crate::platform::permissions::PermissionProbe;
use crate::playback::{AudioBackend, AudioError, AudioHandle, Vibrator};
use crate::timesource::{DayTimes, TimeSource, TimeSourceError};

/// One recorded play on the [`FakeAudioBackend`].
struct FakePlay {
    path: PathBuf,
    volume: f32,
    stop: Arc<AtomicBool>,
    finish: Arc<AtomicBool>,
}

/// Audio backend that plays nothing and completes when told to.
///
/// Each play spawns a watcher that signals completion once either the
/// controller's stop flag or the test's finish flag is set, mirroring
/// how a real backend reports both stop and natural end-of-track.
pub struct FakeAudioBackend {
    plays: Mutex<Vec<FakePlay>>,
}

impl FakeAudioBackend {
    pub fn new() -> Self {
        Self {
            plays: Mutex::new(Vec::new()),
        }
    }

    /// Number of plays started so far.
    pub fn play_count(&self) -> usize {
        self.plays.lock().expect("lock poisoned").len()
    }

    /// Path and volume of the most recent play.
    pub fn last_play(&self) -> Option<(PathBuf, f32)> {
        self.plays
            .lock()
            .expect("lock poisoned")
            .last()
            .map(|p| (p.path.clone(), p.volume))
    }

    /// Paths of every play, in start order.
    pub fn played_paths(&self) -> Vec<PathBuf> {
        self.plays
            .lock()
            .expect("lock poisoned")
            .iter()
            .map(|p| p.path.clone())
            .collect()
    }

    /// Let the most recent play reach natural completion.
    pub fn complete_current(&self) {
        if let Some(play) = self.plays.lock().expect("lock poisoned").last() {
            play.finish.store(true, Ordering::SeqCst);
        }
    }

    /// Number of plays that are still running.
    pub fn active_count(&self) -> usize {
        self.plays
            .lock()
            .expect("lock poisoned")
            .iter()
            .filter(|p| !p.stop.load(Ordering::SeqCst) && !p.finish.load(Ordering::SeqCst))
            .count()
    }
}

impl Default for FakeAudioBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for FakeAudioBackend {
    fn play(&self, path: &std::path::Path, volume: f32) -> Result<AudioHandle, AudioError> {
        let stop = Arc::new(AtomicBool::new(false));
        let finish = Arc::new(AtomicBool::new(false));
        let (done_tx, done_rx) = oneshot::channel();

        let stop_flag = Arc::clone(&stop);
        let finish_flag = Arc::clone(&finish);
        tokio::spawn(async move {
            while !stop_flag.load(Ordering::SeqCst) && !finish_flag.load(Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            let _ = done_tx.send(());
        });

        self.plays.lock().expect("lock poisoned").push(FakePlay {
            path: path.to_path_buf(),
            volume,
            stop: Arc::clone(&stop),
            finish,
        });

        Ok(AudioHandle::new(stop, done_rx))
    }
}

/// Time source that always returns the same timetable.
pub struct FixedTimeSource {
    times: DayTimes,
    fetches: AtomicUsize,
}

impl FixedTimeSource {
    pub fn new(times: DayTimes) -> Self {
        Self {
            times,
            fetches: AtomicUsize::new(0),
        }
    }

    /// Number of fetches served.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TimeSource for FixedTimeSource {
    async fn fetch(
        &self,
        _date: NaiveDate,
        _coordinates: Coordinates,
        _method: u32,
    ) -> Result<DayTimes, TimeSourceError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.times.clone())
    }
}

/// Time source that always fails with the given HTTP status.
pub struct FailingTimeSource {
    status: u16,
}

impl FailingTimeSource {
    pub fn new(status: u16) -> Self {
        Self { status }
    }
}

#[async_trait]
impl TimeSource for FailingTimeSource {
    async fn fetch(
        &self,
        _date: NaiveDate,
        _coordinates: Coordinates,
        _method: u32,
    ) -> Result<DayTimes, TimeSourceError> {
        Err(TimeSourceError::Status(self.status))
    }
}

/// Notifier that records every show and dismiss.
pub struct RecordingNotifier {
    shown: Mutex<Vec<(NotificationId, Notification)>>,
    dismissed: Mutex<Vec<NotificationId>>,
    next_id: AtomicUsize,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self {
            shown: Mutex::new(Vec::new()),
            dismissed: Mutex::new(Vec::new()),
            next_id: AtomicUsize::new(1),
        }
    }

    /// Titles of every shown notification, in order.
    pub fn shown_titles(&self) -> Vec<String> {
        self.shown
            .lock()
            .expect("lock poisoned")
            .iter()
            .map(|(_, n)| n.title.clone())
            .collect()
    }

    /// Notifications shown and not yet dismissed.
    pub fn active_count(&self) -> usize {
        let dismissed = self.dismissed.lock().expect("lock poisoned");
        self.shown
            .lock()
            .expect("lock poisoned")
            .iter()
            .filter(|(id, _)| !dismissed.contains(id))
            .count()
    }

    /// Total notifications shown.
    pub fn shown_count(&self) -> usize {
        self.shown.lock().expect("lock poisoned").len()
    }
}

impl Default for RecordingNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for RecordingNotifier {
    fn show(&self, notification: Notification) -> NotificationId {
        let raw = self.next_id.fetch_add(1, Ordering::SeqCst) as u32;
        let id = NotificationId::from_raw(raw);
        self.shown
            .lock()
            .expect("lock poisoned")
            .push((id, notification));
        id
    }

    fn dismiss(&self, id: NotificationId) {
        self.dismissed.lock().expect("lock poisoned").push(id);
    }
}

/// Vibrator that counts starts and cancels.
pub struct CountingVibrator {
    started: AtomicUsize,
    cancelled: AtomicUsize,
}

impl CountingVibrator {
    pub fn new() -> Self {
        Self {
            started: AtomicUsize::new(0),
            cancelled: AtomicUsize::new(0),
        }
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn cancelled(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Whether a waveform is running (more starts than cancels).
    pub fn is_vibrating(&self) -> bool {
        self.started() > self.cancelled()
    }
}

impl Default for CountingVibrator {
    fn default() -> Self {
        Self::new()
    }
}

impl Vibrator for CountingVibrator {
    fn start_waveform(&self, _pattern: &[Duration]) {
        self.started.fetch_add(1, Ordering::SeqCst);
    }

    fn cancel(&self) {
        self.cancelled.fetch_add(1, Ordering::SeqCst);
    }
}

/// Permission probe that refuses exact alarms, forcing the fallback.
pub struct DenyExactProbe;

impl PermissionProbe for DenyExactProbe {
    fn exact_alarms_allowed(&self) -> bool {
        false
    }
}
