//! Configuration type definitions.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::core::settings::AzanSettings;
use crate::core::types::{Coordinates, TrackId};

/// Top-level application configuration (muezzin.yaml).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Where prayer times are computed for.
    pub location: LocationConfig,
    /// Calculation method id passed to the time source.
    pub method: u32,
    /// Audio and vibration settings.
    pub audio: AudioConfig,
    /// Minutes before each prayer at which the reminder fires.
    pub reminder_lead_minutes: u64,
    /// Storage backend.
    pub storage: StorageConfig,
    /// Refresh expression (cron, @daily, @every ...).
    pub refresh: String,
    /// Control API bind address.
    pub api: ApiConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            location: LocationConfig::default(),
            method: 20,
            audio: AudioConfig::default(),
            reminder_lead_minutes: 5,
            storage: StorageConfig::default(),
            refresh: "@daily".to_string(),
            api: ApiConfig::default(),
        }
    }
}

impl AppConfig {
    /// The configured coordinates.
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.location.latitude, self.location.longitude)
    }

    /// The alarm settings derived from this configuration.
    pub fn settings(&self) -> AzanSettings {
        AzanSettings::new(
            self.audio.default_track.clone(),
            self.audio.fajr_track.clone(),
        )
        .with_volume(self.audio.volume)
        .with_vibrate(self.audio.vibrate)
        .with_reminder_lead(Duration::from_secs(self.reminder_lead_minutes * 60))
    }
}

/// Geographic location and its timezone.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    pub latitude: f64,
    pub longitude: f64,
    /// IANA timezone name the timetable's wall-clock times refer to.
    pub timezone: String,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            latitude: 0.0,
            longitude: 0.0,
            timezone: "UTC".to_string(),
        }
    }
}

/// Audio playback settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Directory holding the azan audio assets.
    pub assets_dir: PathBuf,
    /// Track played for every slot except Fajr.
    pub default_track: TrackId,
    /// Track played for Fajr.
    pub fajr_track: TrackId,
    /// Playback volume in `0.0..=1.0`.
    pub volume: f32,
    /// Whether to vibrate alongside playback.
    pub vibrate: bool,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            assets_dir: PathBuf::from("assets/audio"),
            default_track: TrackId::new("azan"),
            fajr_track: TrackId::new("azan_fajr"),
            volume: 0.8,
            vibrate: true,
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-memory storage (default, non-persistent).
    #[default]
    Memory,
    /// SQLite storage.
    Sqlite {
        /// Path to the database file.
        path: String,
    },
}

/// Control API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Host to bind to.
    pub host: String,
    /// Port to bind to.
    pub port: u16,
    /// Whether the API is served at all.
    pub enabled: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8712,
            enabled: true,
        }
    }
}
