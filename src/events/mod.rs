//! Lifecycle events and event handling.
//!
//! This module provides event emission for alarm and playback lifecycle
//! events, enabling observability into scheduling and dispatch.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

use crate::core::slot::{AlarmKey, PrayerSlot};
use crate::core::types::TrackId;
use crate::timer::Precision;

/// Kind of registration an event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmedKind {
    Azan,
    Reminder,
}

/// Lifecycle events emitted during scheduling and dispatch.
#[derive(Debug, Clone)]
pub enum Event {
    /// An alarm or reminder was armed with the timer service.
    AlarmArmed {
        slot: PrayerSlot,
        kind: ArmedKind,
        fire_at: DateTime<Utc>,
        precision: Precision,
        timestamp: Instant,
    },

    /// The timer service rejected a registration; the slot is left unarmed.
    RegistrationFailed {
        slot: PrayerSlot,
        kind: ArmedKind,
        error: String,
        timestamp: Instant,
    },

    /// A registration was cancelled.
    AlarmCancelled { key: AlarmKey, timestamp: Instant },

    /// A registration fired and was dispatched.
    AlarmFired {
        slot: PrayerSlot,
        kind: ArmedKind,
        timestamp: Instant,
    },

    /// A playback session started.
    PlaybackStarted {
        slot: Option<PrayerSlot>,
        track: TrackId,
        timestamp: Instant,
    },

    /// A playback session ended (natural completion or explicit stop).
    PlaybackStopped {
        slot: Option<PrayerSlot>,
        completed: bool,
        timestamp: Instant,
    },

    /// A playback session failed to start.
    PlaybackFailed {
        slot: Option<PrayerSlot>,
        track: TrackId,
        error: String,
        timestamp: Instant,
    },

    /// A reminder notification was shown.
    ReminderShown {
        slot: PrayerSlot,
        timestamp: Instant,
    },

    /// A daily refresh completed and armed `armed` registrations.
    ScheduleRefreshed { armed: usize, timestamp: Instant },

    /// A daily refresh aborted without touching existing registrations.
    RefreshFailed { error: String, timestamp: Instant },

    /// The reboot hook flagged that the schedule must be recomputed.
    RescheduleFlagged { timestamp: Instant },
}

impl Event {
    /// Get the timestamp of the event.
    pub fn timestamp(&self) -> Instant {
        match self {
            Event::AlarmArmed { timestamp, .. } => *timestamp,
            Event::RegistrationFailed { timestamp, .. } => *timestamp,
            Event::AlarmCancelled { timestamp, .. } => *timestamp,
            Event::AlarmFired { timestamp, .. } => *timestamp,
            Event::PlaybackStarted { timestamp, .. } => *timestamp,
            Event::PlaybackStopped { timestamp, .. } => *timestamp,
            Event::PlaybackFailed { timestamp, .. } => *timestamp,
            Event::ReminderShown { timestamp, .. } => *timestamp,
            Event::ScheduleRefreshed { timestamp, .. } => *timestamp,
            Event::RefreshFailed { timestamp, .. } => *timestamp,
            Event::RescheduleFlagged { timestamp } => *timestamp,
        }
    }

    /// Create an AlarmArmed event.
    pub fn alarm_armed(
        slot: PrayerSlot,
        kind: ArmedKind,
        fire_at: DateTime<Utc>,
        precision: Precision,
    ) -> Self {
        Event::AlarmArmed {
            slot,
            kind,
            fire_at,
            precision,
            timestamp: Instant::now(),
        }
    }

    /// Create a RegistrationFailed event.
    pub fn registration_failed(slot: PrayerSlot, kind: ArmedKind, error: impl Into<String>) -> Self {
        Event::RegistrationFailed {
            slot,
            kind,
            error: error.into(),
            timestamp: Instant::now(),
        }
    }

    /// Create an AlarmCancelled event.
    pub fn alarm_cancelled(key: AlarmKey) -> Self {
        Event::AlarmCancelled {
            key,
            timestamp: Instant::now(),
        }
    }

    /// Create an AlarmFired event.
    pub fn alarm_fired(slot: PrayerSlot, kind: ArmedKind) -> Self {
        Event::AlarmFired {
            slot,
            kind,
            timestamp: Instant::now(),
        }
    }

    /// Create a PlaybackStarted event.
    pub fn playback_started(slot: Option<PrayerSlot>, track: TrackId) -> Self {
        Event::PlaybackStarted {
            slot,
            track,
            timestamp: Instant::now(),
        }
    }

    /// Create a PlaybackStopped event.
    pub fn playback_stopped(slot: Option<PrayerSlot>, completed: bool) -> Self {
        Event::PlaybackStopped {
            slot,
            completed,
            timestamp: Instant::now(),
        }
    }

    /// Create a PlaybackFailed event.
    pub fn playback_failed(
        slot: Option<PrayerSlot>,
        track: TrackId,
        error: impl Into<String>,
    ) -> Self {
        Event::PlaybackFailed {
            slot,
            track,
            error: error.into(),
            timestamp: Instant::now(),
        }
    }

    /// Create a ReminderShown event.
    pub fn reminder_shown(slot: PrayerSlot) -> Self {
        Event::ReminderShown {
            slot,
            timestamp: Instant::now(),
        }
    }

    /// Create a ScheduleRefreshed event.
    pub fn schedule_refreshed(armed: usize) -> Self {
        Event::ScheduleRefreshed {
            armed,
            timestamp: Instant::now(),
        }
    }

    /// Create a RefreshFailed event.
    pub fn refresh_failed(error: impl Into<String>) -> Self {
        Event::RefreshFailed {
            error: error.into(),
            timestamp: Instant::now(),
        }
    }

    /// Create a RescheduleFlagged event.
    pub fn reschedule_flagged() -> Self {
        Event::RescheduleFlagged {
            timestamp: Instant::now(),
        }
    }
}

/// Handler for receiving lifecycle events.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle an event.
    async fn handle(&self, event: &Event);
}

/// Event bus for distributing events to registered handlers.
pub struct EventBus {
    handlers: RwLock<Vec<Arc<dyn EventHandler>>>,
}

impl EventBus {
    /// Create a new event bus with no handlers.
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
        }
    }

    /// Register an event handler.
    pub async fn register(&self, handler: Arc<dyn EventHandler>) {
        let mut handlers = self.handlers.write().await;
        handlers.push(handler);
    }

    /// Emit an event to all registered handlers.
    pub async fn emit(&self, event: Event) {
        let handlers = self.handlers.read().await;
        for handler in handlers.iter() {
            handler.handle(&event).await;
        }
    }

    /// Get the number of registered handlers.
    pub async fn handler_count(&self) -> usize {
        self.handlers.read().await.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
