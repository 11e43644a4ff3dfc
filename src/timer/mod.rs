//! Keyed wake-up registrations.
//!
//! This module abstracts the platform timer service: exact or
//! best-effort wake registrations keyed by [`AlarmKey`], where arming a
//! key atomically replaces any prior registration for that key. Fired
//! registrations are delivered to the dispatcher over a channel, which
//! is the fast half of the two-stage handoff.

mod sleep;

pub use sleep::SleepTimer;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::core::slot::{AlarmKey, PrayerSlot};
use crate::core::types::TrackId;

/// Buffer size for the fired-alarm channel between timer and dispatcher.
pub const FIRED_CHANNEL_BUFFER: usize = 16;

/// Requested (and granted) delivery mode for a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Precision {
    /// Exact, idle-tolerant wake delivery. Subject to platform permission.
    Exact,
    /// Best-effort delivery; may be deferred by the platform.
    BestEffort,
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Precision::Exact => write!(f, "exact"),
            Precision::BestEffort => write!(f, "best-effort"),
        }
    }
}

/// What a fired registration asks the dispatcher to do.
#[derive(Debug, Clone)]
pub enum AlarmPayload {
    /// Play the azan for a prayer slot.
    Azan {
        slot: PrayerSlot,
        track: TrackId,
        volume: f32,
        vibrate: bool,
    },
    /// Show a reminder notification for an upcoming prayer.
    Reminder { slot: PrayerSlot },
}

impl AlarmPayload {
    /// The slot this payload refers to.
    pub fn slot(&self) -> PrayerSlot {
        match self {
            AlarmPayload::Azan { slot, .. } => *slot,
            AlarmPayload::Reminder { slot } => *slot,
        }
    }
}

/// A wake-up registration request.
#[derive(Debug, Clone)]
pub struct Registration {
    pub key: AlarmKey,
    pub fire_at: DateTime<Utc>,
    pub payload: AlarmPayload,
}

/// A registration that reached its fire time.
#[derive(Debug, Clone)]
pub struct FiredAlarm {
    pub key: AlarmKey,
    pub fire_at: DateTime<Utc>,
    pub payload: AlarmPayload,
}

/// Errors returned by the timer service.
#[derive(Debug, Error)]
pub enum TimerError {
    /// Exact wake delivery is not permitted; retry with best-effort.
    #[error("exact wake delivery denied")]
    ExactDenied,

    /// The timer service rejected the registration outright.
    #[error("registration rejected: {0}")]
    Rejected(String),
}

/// The platform timer service.
///
/// Implementations must guarantee that arming a key replaces any prior
/// registration for that key with no window in which both are armed,
/// and that `cancel` is safe against a registration that already fired.
pub trait AlarmTimer: Send + Sync {
    /// Arm a registration with the requested precision.
    ///
    /// Returns the precision that was actually granted.
    fn arm(&self, registration: Registration, precision: Precision) -> Result<Precision, TimerError>;

    /// Cancel a registration. Returns false if the key was not armed.
    fn cancel(&self, key: AlarmKey) -> bool;

    /// Whether the key currently has a pending registration.
    fn is_armed(&self, key: AlarmKey) -> bool;

    /// Number of pending registrations.
    fn armed_count(&self) -> usize;
}
