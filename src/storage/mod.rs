//! Storage abstraction for armed alarms and recovery flags.
//!
//! This module provides a trait-based storage abstraction with
//! pluggable backends (in-memory, SQLite). The scheduler engine is the
//! only writer; the store is what survives a process restart so armed
//! alarms can be recovered.

mod memory;
#[cfg(any(feature = "sqlite", test))]
mod sqlite;

pub use memory::InMemoryStore;
#[cfg(any(feature = "sqlite", test))]
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::slot::{AlarmKey, PrayerSlot};
use crate::core::types::TrackId;
use crate::timer::Precision;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested item was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Storage lock was poisoned.
    #[error("storage lock poisoned")]
    LockPoisoned,

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Generic storage error.
    #[error("storage error: {0}")]
    Other(String),
}

/// What an armed registration does when it fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlarmKind {
    /// Play the azan.
    Azan {
        track: TrackId,
        volume: f32,
        vibrate: bool,
    },
    /// Show a reminder notification.
    Reminder,
}

/// A persisted armed registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredAlarm {
    /// Registration key with the timer service.
    pub key: AlarmKey,
    /// The prayer slot this registration belongs to.
    pub slot: PrayerSlot,
    /// Azan or reminder payload.
    pub kind: AlarmKind,
    /// When the registration fires.
    pub fire_at: DateTime<Utc>,
    /// Delivery mode that was granted when arming.
    pub precision: Precision,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
}

impl StoredAlarm {
    /// Create an azan alarm record.
    pub fn azan(
        slot: PrayerSlot,
        fire_at: DateTime<Utc>,
        track: TrackId,
        volume: f32,
        vibrate: bool,
    ) -> Self {
        Self {
            key: slot.alarm_key(),
            slot,
            kind: AlarmKind::Azan {
                track,
                volume,
                vibrate,
            },
            fire_at,
            precision: Precision::Exact,
            created_at: Utc::now(),
        }
    }

    /// Create a reminder record.
    pub fn reminder(slot: PrayerSlot, fire_at: DateTime<Utc>) -> Self {
        Self {
            key: slot.reminder_key(),
            slot,
            kind: AlarmKind::Reminder,
            fire_at,
            precision: Precision::Exact,
            created_at: Utc::now(),
        }
    }

    /// Set the granted delivery precision.
    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }
}

/// Storage trait for persisting scheduler state.
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    // Alarm operations

    /// Insert or replace the alarm record for its key.
    async fn upsert_alarm(&self, alarm: StoredAlarm) -> Result<(), StoreError>;

    /// Get the alarm record for a key.
    async fn get_alarm(&self, key: AlarmKey) -> Result<StoredAlarm, StoreError>;

    /// List all alarm records, ordered by fire time ascending.
    async fn list_alarms(&self) -> Result<Vec<StoredAlarm>, StoreError>;

    /// Remove the alarm record for a key.
    async fn remove_alarm(&self, key: AlarmKey) -> Result<(), StoreError>;

    /// Remove every alarm record.
    async fn clear_alarms(&self) -> Result<(), StoreError>;

    // Recovery flag operations

    /// Set the needs-reschedule flag.
    async fn set_needs_reschedule(&self, value: bool) -> Result<(), StoreError>;

    /// Read the needs-reschedule flag. Defaults to false when never set.
    async fn needs_reschedule(&self) -> Result<bool, StoreError>;
}
