//! HTTP control API.
//!
//! REST surface for the application shell: scheduling requests,
//! playback control, refresh, and the reboot-recovery flag.

mod errors;
mod handlers;
mod responses;

pub use errors::ApiError;
pub use handlers::ApiState;
pub use responses::*;

use axum::{
    routing::{delete, get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::storage::ScheduleStore;

/// Build the API router over the given state.
pub fn router<S: ScheduleStore + 'static>(state: ApiState<S>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/status", get(handlers::status::<S>))
        .route(
            "/alarms",
            get(handlers::list_alarms::<S>)
                .post(handlers::schedule_alarm::<S>)
                .delete(handlers::cancel_all::<S>),
        )
        .route("/alarms/:slot", delete(handlers::cancel_alarm::<S>))
        .route(
            "/reminders",
            post(handlers::schedule_reminder::<S>).delete(handlers::cancel_all_reminders::<S>),
        )
        .route("/refresh", post(handlers::refresh::<S>))
        .route("/reschedule/ack", post(handlers::ack_reschedule::<S>))
        .route("/playback/test", post(handlers::test_azan::<S>))
        .route("/playback/stop", post(handlers::stop_azan::<S>))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}

/// Bind and serve the API until the process exits.
pub async fn serve<S: ScheduleStore + 'static>(
    config: &ApiConfig,
    state: ApiState<S>,
) -> std::io::Result<()> {
    let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
    tracing::info!(addr = %listener.local_addr()?, "control API listening");
    axum::serve(listener, router(state)).await
}
