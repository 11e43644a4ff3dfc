//! User-visible notifications.
//!
//! The core never draws UI; it hands fully-formed notifications to a
//! [`Notifier`] implementation. The playback session notification is
//! ongoing (dismissable only through its stop action, which the host
//! wires to [`crate::playback::PlaybackController::stop_current`]);
//! reminder notifications are plain and auto-dismissable.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::core::slot::PrayerSlot;

/// Identifier of a shown notification, used to dismiss it later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NotificationId(u32);

impl NotificationId {
    /// Build an id from its raw value (for notifier implementations).
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }
}

/// Notification category, mapped to channel/priority by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationCategory {
    /// Playback session indicator with a stop action.
    Azan,
    /// Pre-prayer reminder.
    Reminder,
}

/// A notification the core asks the host to display.
#[derive(Debug, Clone)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub category: NotificationCategory,
    /// Ongoing notifications stay until explicitly dismissed.
    pub ongoing: bool,
}

impl Notification {
    /// The session notification shown while the azan plays.
    pub fn azan_session(label: &str) -> Self {
        Self {
            title: format!("Time for {}", label),
            body: "Tap stop to end the azan".to_string(),
            category: NotificationCategory::Azan,
            ongoing: true,
        }
    }

    /// The reminder shown a few minutes ahead of a prayer.
    pub fn reminder(slot: PrayerSlot, lead_minutes: u64) -> Self {
        Self {
            title: format!("{} in {} minutes", slot, lead_minutes),
            body: format!("Get ready for {}", slot),
            category: NotificationCategory::Reminder,
            ongoing: false,
        }
    }
}

/// Notification surface.
pub trait Notifier: Send + Sync {
    /// Show a notification, returning an id for later dismissal.
    fn show(&self, notification: Notification) -> NotificationId;

    /// Dismiss a previously shown notification. Unknown ids are no-ops.
    fn dismiss(&self, id: NotificationId);
}

/// Notifier that writes notifications to the log.
///
/// The default for headless deployments; real hosts substitute their
/// own notification surface.
pub struct LogNotifier {
    next_id: AtomicU32,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU32::new(1),
        }
    }
}

impl Default for LogNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for LogNotifier {
    fn show(&self, notification: Notification) -> NotificationId {
        let id = NotificationId(self.next_id.fetch_add(1, Ordering::SeqCst));
        tracing::info!(
            id = id.as_u32(),
            title = %notification.title,
            body = %notification.body,
            ongoing = notification.ongoing,
            "notification shown"
        );
        id
    }

    fn dismiss(&self, id: NotificationId) {
        tracing::info!(id = id.as_u32(), "notification dismissed");
    }
}
