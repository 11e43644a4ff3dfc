//! Azan playback sessions.
//!
//! At most one [`PlaybackSession`] is alive at any time. A session is
//! created by the dispatcher when an alarm fires (or directly through
//! `test_azan`), plays its track through an [`AudioBackend`], shows an
//! ongoing notification for its whole lifetime, and optionally drives a
//! repeating vibration waveform. Natural completion, an explicit stop,
//! and a failed start all tear the session down the same way.

mod assets;
mod audio;

pub use assets::AssetLibrary;
pub use audio::{AudioBackend, AudioError, AudioHandle, NullAudioBackend};
#[cfg(feature = "audio")]
pub use audio::RodioBackend;

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::core::slot::PrayerSlot;
use crate::core::types::{SessionId, TrackId};
use crate::events::{Event, EventBus};
use crate::notify::{Notification, NotificationId, Notifier};

/// Vibration waveform while the azan plays: 500 ms on / 500 ms off,
/// repeated until the session ends.
pub const VIBRATION_PATTERN: [Duration; 6] = [
    Duration::from_millis(0),
    Duration::from_millis(500),
    Duration::from_millis(500),
    Duration::from_millis(500),
    Duration::from_millis(500),
    Duration::from_millis(500),
];

/// Errors that end a playback session before it starts.
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// The requested track has no asset on disk. Not retried.
    #[error("audio track unavailable: {0}")]
    AssetUnavailable(String),

    /// The audio backend refused to start.
    #[error(transparent)]
    Audio(#[from] AudioError),
}

/// Device vibration.
pub trait Vibrator: Send + Sync {
    /// Start a repeating waveform of alternating off/on durations.
    fn start_waveform(&self, pattern: &[Duration]);

    /// Cancel any running vibration.
    fn cancel(&self);
}

/// Vibrator for hosts without a motor; logs at debug level.
pub struct NullVibrator;

impl Vibrator for NullVibrator {
    fn start_waveform(&self, pattern: &[Duration]) {
        tracing::debug!(segments = pattern.len(), "vibration started");
    }

    fn cancel(&self) {
        tracing::debug!("vibration cancelled");
    }
}

/// Handle to a playback session.
///
/// Stays valid after the session ends; stopping a finished session is a
/// no-op.
#[derive(Clone)]
pub struct SessionHandle {
    id: SessionId,
    alive: Arc<AtomicBool>,
}

impl SessionHandle {
    /// The session's unique id.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Whether the session is still playing.
    pub fn is_active(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }
}

/// The live playback state owned by the controller.
struct PlaybackSession {
    id: SessionId,
    slot: Option<PrayerSlot>,
    track: TrackId,
    stop: Arc<AtomicBool>,
    alive: Arc<AtomicBool>,
    notification: NotificationId,
    vibrating: bool,
    #[allow(dead_code)]
    started_at: DateTime<Utc>,
}

struct Inner {
    audio: Arc<dyn AudioBackend>,
    vibrator: Arc<dyn Vibrator>,
    notifier: Arc<dyn Notifier>,
    assets: AssetLibrary,
    events: Arc<EventBus>,
    current: Mutex<Option<PlaybackSession>>,
}

impl Inner {
    /// Tear a session down: stop audio and vibration, dismiss the
    /// notification, mark the handle dead, emit the stop event.
    async fn end_session(&self, session: PlaybackSession, completed: bool) {
        session.stop.store(true, Ordering::SeqCst);
        if session.vibrating {
            self.vibrator.cancel();
        }
        self.notifier.dismiss(session.notification);
        session.alive.store(false, Ordering::SeqCst);

        tracing::info!(
            session = %session.id,
            track = %session.track,
            completed,
            "playback session ended"
        );
        self.events
            .emit(Event::playback_stopped(session.slot, completed))
            .await;
    }
}

/// Starts and stops azan playback sessions.
#[derive(Clone)]
pub struct PlaybackController {
    inner: Arc<Inner>,
}

impl PlaybackController {
    /// Create a controller over the given collaborators.
    pub fn new(
        audio: Arc<dyn AudioBackend>,
        vibrator: Arc<dyn Vibrator>,
        notifier: Arc<dyn Notifier>,
        assets: AssetLibrary,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                audio,
                vibrator,
                notifier,
                assets,
                events,
                current: Mutex::new(None),
            }),
        }
    }

    /// Start a session for a fired prayer alarm.
    ///
    /// Any current session is stopped first (last wins). A missing or
    /// unopenable asset ends the attempt immediately with no retry.
    pub async fn start(
        &self,
        slot: PrayerSlot,
        track: &TrackId,
        volume: f32,
        vibrate: bool,
    ) -> Result<SessionHandle, PlaybackError> {
        self.start_session(Some(slot), track, volume, vibrate).await
    }

    /// Play a track immediately, bypassing the scheduler.
    pub async fn test_azan(
        &self,
        track: &TrackId,
        volume: f32,
    ) -> Result<SessionHandle, PlaybackError> {
        self.start_session(None, track, volume, false).await
    }

    async fn start_session(
        &self,
        slot: Option<PrayerSlot>,
        track: &TrackId,
        volume: f32,
        vibrate: bool,
    ) -> Result<SessionHandle, PlaybackError> {
        let mut current = self.inner.current.lock().await;
        if let Some(previous) = current.take() {
            tracing::info!(session = %previous.id, "preempting current playback session");
            self.inner.end_session(previous, false).await;
        }

        let path = match self.inner.assets.resolve(track) {
            Ok(path) => path,
            Err(e) => {
                tracing::error!(track = %track, error = %e, "cannot start playback");
                self.inner
                    .events
                    .emit(Event::playback_failed(slot, track.clone(), e.to_string()))
                    .await;
                return Err(e);
            }
        };

        let handle = match self.inner.audio.play(&path, volume) {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!(track = %track, error = %e, "audio backend failed to start");
                self.inner
                    .events
                    .emit(Event::playback_failed(slot, track.clone(), e.to_string()))
                    .await;
                return Err(e.into());
            }
        };
        let (stop, done) = handle.into_parts();

        let label = slot
            .map(|s| s.to_string())
            .unwrap_or_else(|| "prayer".to_string());
        let notification = self.inner.notifier.show(Notification::azan_session(&label));
        if vibrate {
            self.inner.vibrator.start_waveform(&VIBRATION_PATTERN);
        }

        let id = SessionId::new();
        let alive = Arc::new(AtomicBool::new(true));
        *current = Some(PlaybackSession {
            id,
            slot,
            track: track.clone(),
            stop,
            alive: Arc::clone(&alive),
            notification,
            vibrating: vibrate,
            started_at: Utc::now(),
        });
        drop(current);

        tracing::info!(session = %id, track = %track, volume, "playback session started");
        self.inner
            .events
            .emit(Event::playback_started(slot, track.clone()))
            .await;

        // Natural completion is equivalent to an explicit stop.
        let controller = self.clone();
        tokio::spawn(async move {
            let _ = done.await;
            controller.finish(id).await;
        });

        Ok(SessionHandle { id, alive })
    }

    /// Stop the session behind a handle. No-op for finished or unknown
    /// handles.
    pub async fn stop(&self, handle: &SessionHandle) {
        let session = {
            let mut current = self.inner.current.lock().await;
            let is_ours = current.as_ref().map(|active| active.id) == Some(handle.id);
            if is_ours {
                current.take()
            } else {
                None
            }
        };
        if let Some(session) = session {
            self.inner.end_session(session, false).await;
        }
    }

    /// Stop whatever session is playing, if any.
    ///
    /// This is what the session notification's stop action and the
    /// `stopAzan` control surface invoke.
    pub async fn stop_current(&self) {
        let session = self.inner.current.lock().await.take();
        if let Some(session) = session {
            self.inner.end_session(session, false).await;
        }
    }

    /// Whether a session is currently alive.
    pub async fn is_playing(&self) -> bool {
        self.inner.current.lock().await.is_some()
    }

    /// The slot of the current session, if any.
    pub async fn current_slot(&self) -> Option<PrayerSlot> {
        self.inner.current.lock().await.as_ref().and_then(|s| s.slot)
    }

    /// Session teardown from the completion watcher.
    async fn finish(&self, id: SessionId) {
        let session = {
            let mut current = self.inner.current.lock().await;
            let is_ours = current.as_ref().map(|active| active.id) == Some(id);
            if is_ours {
                current.take()
            } else {
                None
            }
        };
        if let Some(session) = session {
            self.inner.end_session(session, true).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::LogNotifier;
    use crate::testing::FakeAudioBackend;
    use std::fs;
    use std::path::PathBuf;

    fn temp_assets(tracks: &[&str]) -> (AssetLibrary, PathBuf) {
        let dir = std::env::temp_dir().join(format!("muezzin-playback-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        for track in tracks {
            fs::write(dir.join(format!("{}.mp3", track)), b"fake").unwrap();
        }
        (AssetLibrary::new(&dir), dir)
    }

    fn controller(audio: Arc<FakeAudioBackend>, assets: AssetLibrary) -> PlaybackController {
        PlaybackController::new(
            audio,
            Arc::new(NullVibrator),
            Arc::new(LogNotifier::new()),
            assets,
            Arc::new(EventBus::new()),
        )
    }

    #[tokio::test]
    async fn test_start_and_natural_completion() {
        let (assets, dir) = temp_assets(&["azan"]);
        let audio = Arc::new(FakeAudioBackend::new());
        let controller = controller(Arc::clone(&audio), assets);

        let handle = controller
            .start(PrayerSlot::Fajr, &TrackId::new("azan"), 0.8, false)
            .await
            .unwrap();
        assert!(handle.is_active());
        assert!(controller.is_playing().await);

        audio.complete_current();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(!handle.is_active());
        assert!(!controller.is_playing().await);
        fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn test_missing_asset_fails_without_session() {
        let (assets, dir) = temp_assets(&[]);
        let audio = Arc::new(FakeAudioBackend::new());
        let controller = controller(Arc::clone(&audio), assets);

        let result = controller
            .start(PrayerSlot::Isha, &TrackId::new("missing"), 0.8, true)
            .await;
        assert!(matches!(result, Err(PlaybackError::AssetUnavailable(_))));
        assert!(!controller.is_playing().await);
        assert_eq!(audio.play_count(), 0);
        fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn test_new_session_preempts_current() {
        let (assets, dir) = temp_assets(&["azan", "azan_fajr"]);
        let audio = Arc::new(FakeAudioBackend::new());
        let controller = controller(Arc::clone(&audio), assets);

        let first = controller
            .start(PrayerSlot::Fajr, &TrackId::new("azan_fajr"), 0.8, false)
            .await
            .unwrap();
        let second = controller
            .start(PrayerSlot::Dhuhr, &TrackId::new("azan"), 0.8, false)
            .await
            .unwrap();

        assert!(!first.is_active());
        assert!(second.is_active());
        assert_eq!(controller.current_slot().await, Some(PrayerSlot::Dhuhr));
        assert_eq!(audio.play_count(), 2);
        fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let (assets, dir) = temp_assets(&["azan"]);
        let audio = Arc::new(FakeAudioBackend::new());
        let controller = controller(Arc::clone(&audio), assets);

        let handle = controller
            .start(PrayerSlot::Asr, &TrackId::new("azan"), 0.8, false)
            .await
            .unwrap();

        controller.stop(&handle).await;
        assert!(!handle.is_active());

        // stopping again, and stopping with no session, are no-ops
        controller.stop(&handle).await;
        controller.stop_current().await;
        fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn test_stale_handle_does_not_stop_new_session() {
        let (assets, dir) = temp_assets(&["azan"]);
        let audio = Arc::new(FakeAudioBackend::new());
        let controller = controller(Arc::clone(&audio), assets);

        let stale = controller
            .start(PrayerSlot::Fajr, &TrackId::new("azan"), 0.8, false)
            .await
            .unwrap();
        let fresh = controller
            .start(PrayerSlot::Dhuhr, &TrackId::new("azan"), 0.8, false)
            .await
            .unwrap();

        controller.stop(&stale).await;
        assert!(fresh.is_active());
        assert!(controller.is_playing().await);
        fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn test_test_azan_has_no_slot() {
        let (assets, dir) = temp_assets(&["azan"]);
        let audio = Arc::new(FakeAudioBackend::new());
        let controller = controller(Arc::clone(&audio), assets);

        let handle = controller
            .test_azan(&TrackId::new("azan"), 0.8)
            .await
            .unwrap();
        assert!(handle.is_active());
        assert_eq!(controller.current_slot().await, None);
        fs::remove_dir_all(dir).unwrap();
    }
}
