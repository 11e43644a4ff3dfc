//! Core domain types: prayer slots, registration keys, settings.

pub mod settings;
pub mod slot;
pub mod types;

pub use settings::AzanSettings;
pub use slot::{AlarmKey, ParseSlotError, PrayerSlot};
pub use types::{Coordinates, SessionId, TrackId};
