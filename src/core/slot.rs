//! Prayer slots and their stable alarm registration keys.
//!
//! Each of the five daily prayers maps to a fixed numeric key used to
//! register, replace, and cancel its wake-up with the timer service.
//! The keys must never change across versions, otherwise cancel/replace
//! operations would target the wrong registration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Offset added to a slot's alarm key to derive its reminder key.
pub const REMINDER_KEY_OFFSET: u32 = 100;

/// Alarm keys swept by cancel-all. 1002 is reserved (historically the
/// sunrise slot) and is never assigned, but the sweep still covers it.
pub const ALARM_KEY_RANGE: std::ops::RangeInclusive<u32> = 1001..=1006;

/// Reminder keys swept by cancel-all-reminders.
pub const REMINDER_KEY_RANGE: std::ops::RangeInclusive<u32> = 1101..=1106;

/// One of the five daily prayers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrayerSlot {
    Fajr,
    Dhuhr,
    Asr,
    Maghrib,
    Isha,
}

impl PrayerSlot {
    /// All slots in firing order.
    pub const ALL: [PrayerSlot; 5] = [
        PrayerSlot::Fajr,
        PrayerSlot::Dhuhr,
        PrayerSlot::Asr,
        PrayerSlot::Maghrib,
        PrayerSlot::Isha,
    ];

    /// Stable registration key for this slot's azan alarm.
    pub fn alarm_key(self) -> AlarmKey {
        let id = match self {
            PrayerSlot::Fajr => 1001,
            PrayerSlot::Dhuhr => 1003,
            PrayerSlot::Asr => 1004,
            PrayerSlot::Maghrib => 1005,
            PrayerSlot::Isha => 1006,
        };
        AlarmKey(id)
    }

    /// Stable registration key for this slot's reminder.
    pub fn reminder_key(self) -> AlarmKey {
        AlarmKey(self.alarm_key().0 + REMINDER_KEY_OFFSET)
    }

    /// Slot name as used by the time-source API.
    pub fn api_name(self) -> &'static str {
        match self {
            PrayerSlot::Fajr => "Fajr",
            PrayerSlot::Dhuhr => "Dhuhr",
            PrayerSlot::Asr => "Asr",
            PrayerSlot::Maghrib => "Maghrib",
            PrayerSlot::Isha => "Isha",
        }
    }
}

impl fmt::Display for PrayerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.api_name())
    }
}

/// Error returned when parsing a slot name fails.
#[derive(Debug, Error)]
#[error("unknown prayer slot: {0}")]
pub struct ParseSlotError(String);

impl FromStr for PrayerSlot {
    type Err = ParseSlotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fajr" => Ok(PrayerSlot::Fajr),
            "dhuhr" => Ok(PrayerSlot::Dhuhr),
            "asr" => Ok(PrayerSlot::Asr),
            "maghrib" => Ok(PrayerSlot::Maghrib),
            "isha" => Ok(PrayerSlot::Isha),
            _ => Err(ParseSlotError(s.to_string())),
        }
    }
}

/// A timer registration key.
///
/// Keys identify one registration with the timer service; arming a key
/// that is already armed replaces the prior registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AlarmKey(u32);

impl AlarmKey {
    /// Create a key from its raw numeric value.
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw numeric value.
    pub fn as_u32(self) -> u32 {
        self.0
    }

    /// Whether this key is in the reminder range.
    pub fn is_reminder(self) -> bool {
        REMINDER_KEY_RANGE.contains(&self.0)
    }
}

impl fmt::Display for AlarmKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// All keys swept by a cancel-all, alarms then reminders.
pub fn sweep_keys() -> impl Iterator<Item = AlarmKey> {
    ALARM_KEY_RANGE.chain(REMINDER_KEY_RANGE).map(AlarmKey)
}
