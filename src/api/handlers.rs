//! API request handlers.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use std::sync::Arc;

use crate::core::settings::AzanSettings;
use crate::core::slot::PrayerSlot;
use crate::core::types::TrackId;
use crate::playback::PlaybackController;
use crate::scheduler::SchedulerHandle;
use crate::storage::ScheduleStore;

use super::errors::ApiError;
use super::responses::{
    AlarmListResponse, AlarmResponse, HealthResponse, MessageResponse, RefreshResponse,
    StatusResponse,
};

/// Shared application state for API handlers.
pub struct ApiState<S: ScheduleStore> {
    pub handle: SchedulerHandle,
    pub store: Arc<S>,
    pub playback: PlaybackController,
    pub settings: AzanSettings,
}

impl<S: ScheduleStore> Clone for ApiState<S> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
            store: Arc::clone(&self.store),
            playback: self.playback.clone(),
            settings: self.settings.clone(),
        }
    }
}

/// Request body for scheduling an azan alarm.
#[derive(Debug, Deserialize)]
pub struct ScheduleAlarmRequest {
    pub slot: String,
    pub fire_at_ms: i64,
    pub track: Option<String>,
    pub vibrate: Option<bool>,
}

/// Request body for scheduling a reminder.
#[derive(Debug, Deserialize)]
pub struct ScheduleReminderRequest {
    pub slot: String,
    pub fire_at_ms: i64,
}

/// Request body for immediate test playback.
#[derive(Debug, Deserialize, Default)]
pub struct TestAzanRequest {
    pub track: Option<String>,
    pub volume: Option<f32>,
}

fn parse_slot(raw: &str) -> Result<PrayerSlot, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("unknown prayer slot: {}", raw)))
}

fn parse_fire_at(ms: i64) -> Result<DateTime<Utc>, ApiError> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| ApiError::BadRequest(format!("invalid timestamp: {}", ms)))
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::default())
}

/// Scheduler and playback status.
pub async fn status<S: ScheduleStore + 'static>(
    State(state): State<ApiState<S>>,
) -> Result<Json<StatusResponse>, ApiError> {
    let scheduler_state = state.handle.state().await;
    let needs_reschedule = state.handle.needs_reschedule().await?;
    let armed = state.store.list_alarms().await?.len();
    let playing = state.playback.is_playing().await;

    Ok(Json(StatusResponse::new(
        scheduler_state,
        needs_reschedule,
        armed,
        playing,
    )))
}

/// List armed registrations.
pub async fn list_alarms<S: ScheduleStore + 'static>(
    State(state): State<ApiState<S>>,
) -> Result<Json<AlarmListResponse>, ApiError> {
    let alarms: Vec<AlarmResponse> = state
        .store
        .list_alarms()
        .await?
        .into_iter()
        .map(AlarmResponse::from)
        .collect();
    let count = alarms.len();
    Ok(Json(AlarmListResponse { alarms, count }))
}

/// Arm an azan alarm.
pub async fn schedule_alarm<S: ScheduleStore + 'static>(
    State(state): State<ApiState<S>>,
    Json(request): Json<ScheduleAlarmRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let slot = parse_slot(&request.slot)?;
    let fire_at = parse_fire_at(request.fire_at_ms)?;
    let track = request
        .track
        .map(TrackId::new)
        .unwrap_or_else(|| state.settings.track_for(slot).clone());
    let vibrate = request.vibrate.unwrap_or(state.settings.vibrate);

    state
        .handle
        .schedule_alarm(slot, fire_at, track, vibrate)
        .await?;
    Ok(Json(MessageResponse {
        message: format!("alarm armed for {}", slot),
    }))
}

/// Arm a reminder.
pub async fn schedule_reminder<S: ScheduleStore + 'static>(
    State(state): State<ApiState<S>>,
    Json(request): Json<ScheduleReminderRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let slot = parse_slot(&request.slot)?;
    let fire_at = parse_fire_at(request.fire_at_ms)?;

    state.handle.schedule_reminder(slot, fire_at).await?;
    Ok(Json(MessageResponse {
        message: format!("reminder armed for {}", slot),
    }))
}

/// Cancel one slot's azan registration.
pub async fn cancel_alarm<S: ScheduleStore + 'static>(
    State(state): State<ApiState<S>>,
    Path(slot): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let slot = parse_slot(&slot)?;
    state.handle.cancel(slot).await?;
    Ok(Json(MessageResponse {
        message: format!("alarm cancelled for {}", slot),
    }))
}

/// Cancel every alarm and reminder registration.
pub async fn cancel_all<S: ScheduleStore + 'static>(
    State(state): State<ApiState<S>>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.handle.cancel_all().await?;
    Ok(Json(MessageResponse {
        message: "all alarms cancelled".to_string(),
    }))
}

/// Cancel every reminder registration.
pub async fn cancel_all_reminders<S: ScheduleStore + 'static>(
    State(state): State<ApiState<S>>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.handle.cancel_all_reminders().await?;
    Ok(Json(MessageResponse {
        message: "all reminders cancelled".to_string(),
    }))
}

/// Trigger a timetable refresh now.
pub async fn refresh<S: ScheduleStore + 'static>(
    State(state): State<ApiState<S>>,
) -> Result<Json<RefreshResponse>, ApiError> {
    let armed = state.handle.refresh().await?;
    Ok(Json(RefreshResponse {
        armed,
        message: "schedule refreshed".to_string(),
    }))
}

/// Acknowledge the reboot flag after rescheduling.
pub async fn ack_reschedule<S: ScheduleStore + 'static>(
    State(state): State<ApiState<S>>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.handle.clear_reschedule_flag().await?;
    Ok(Json(MessageResponse {
        message: "reschedule flag cleared".to_string(),
    }))
}

/// Play a track immediately, bypassing the scheduler.
pub async fn test_azan<S: ScheduleStore + 'static>(
    State(state): State<ApiState<S>>,
    request: Option<Json<TestAzanRequest>>,
) -> Result<Json<MessageResponse>, ApiError> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let track = request
        .track
        .map(TrackId::new)
        .unwrap_or_else(|| state.settings.default_track.clone());
    let volume = request.volume.unwrap_or(state.settings.volume);

    state.playback.test_azan(&track, volume).await?;
    Ok(Json(MessageResponse {
        message: format!("playing {}", track),
    }))
}

/// Stop the current playback session, if any.
pub async fn stop_azan<S: ScheduleStore + 'static>(
    State(state): State<ApiState<S>>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.playback.stop_current().await;
    Ok(Json(MessageResponse {
        message: "playback stopped".to_string(),
    }))
}
