//! Per-schedule alarm settings.
//!
//! Settings are passed explicitly into every scheduling call instead of
//! being looked up from ambient preference state, so the scheduler stays
//! a pure function of its inputs.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::slot::PrayerSlot;
use super::types::TrackId;

/// Default lead time before a prayer at which the reminder fires.
pub const DEFAULT_REMINDER_LEAD: Duration = Duration::from_secs(5 * 60);

/// Default playback volume.
pub const DEFAULT_VOLUME: f32 = 0.8;

/// Settings applied when arming a day's alarms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AzanSettings {
    /// Track played for every slot except Fajr.
    pub default_track: TrackId,
    /// Track played for Fajr (traditionally a different recitation).
    pub fajr_track: TrackId,
    /// Playback volume in `0.0..=1.0`.
    pub volume: f32,
    /// Whether to vibrate alongside playback.
    pub vibrate: bool,
    /// Lead time before the prayer at which the reminder fires.
    pub reminder_lead: Duration,
}

impl AzanSettings {
    /// Create settings with the given tracks and defaults for the rest.
    pub fn new(default_track: impl Into<TrackId>, fajr_track: impl Into<TrackId>) -> Self {
        Self {
            default_track: default_track.into(),
            fajr_track: fajr_track.into(),
            volume: DEFAULT_VOLUME,
            vibrate: true,
            reminder_lead: DEFAULT_REMINDER_LEAD,
        }
    }

    /// Set the playback volume.
    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume;
        self
    }

    /// Set the vibrate flag.
    pub fn with_vibrate(mut self, vibrate: bool) -> Self {
        self.vibrate = vibrate;
        self
    }

    /// Set the reminder lead time.
    pub fn with_reminder_lead(mut self, lead: Duration) -> Self {
        self.reminder_lead = lead;
        self
    }

    /// Track to play for the given slot.
    pub fn track_for(&self, slot: PrayerSlot) -> &TrackId {
        match slot {
            PrayerSlot::Fajr => &self.fajr_track,
            _ => &self.default_track,
        }
    }
}

impl Default for AzanSettings {
    fn default() -> Self {
        Self::new("azan", "azan_fajr")
    }
}
