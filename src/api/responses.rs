//! API response types.

use serde::Serialize;

use crate::scheduler::SchedulerState;
use crate::storage::{AlarmKind, StoredAlarm};

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

/// Scheduler status response.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub state: String,
    pub is_running: bool,
    pub needs_reschedule: bool,
    pub armed_alarms: usize,
    pub playing: bool,
}

impl StatusResponse {
    pub fn new(
        state: SchedulerState,
        needs_reschedule: bool,
        armed_alarms: usize,
        playing: bool,
    ) -> Self {
        Self {
            state: format!("{:?}", state).to_lowercase(),
            is_running: state == SchedulerState::Running,
            needs_reschedule,
            armed_alarms,
            playing,
        }
    }
}

/// One armed registration.
#[derive(Debug, Serialize)]
pub struct AlarmResponse {
    pub key: u32,
    pub slot: String,
    pub kind: &'static str,
    pub track: Option<String>,
    pub vibrate: Option<bool>,
    pub fire_at_ms: i64,
    pub precision: String,
}

impl From<StoredAlarm> for AlarmResponse {
    fn from(alarm: StoredAlarm) -> Self {
        let (kind, track, vibrate) = match &alarm.kind {
            AlarmKind::Azan { track, vibrate, .. } => {
                ("azan", Some(track.as_str().to_string()), Some(*vibrate))
            }
            AlarmKind::Reminder => ("reminder", None, None),
        };

        Self {
            key: alarm.key.as_u32(),
            slot: alarm.slot.to_string(),
            kind,
            track,
            vibrate,
            fire_at_ms: alarm.fire_at.timestamp_millis(),
            precision: alarm.precision.to_string(),
        }
    }
}

/// Armed registration list.
#[derive(Debug, Serialize)]
pub struct AlarmListResponse {
    pub alarms: Vec<AlarmResponse>,
    pub count: usize,
}

/// Refresh outcome.
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub armed: usize,
    pub message: String,
}

/// Generic acknowledgement.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}
