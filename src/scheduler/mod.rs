//! Alarm scheduling engine.
//!
//! This module provides the actor that converts a day's prayer times
//! into timer registrations, and the handle used to control it.

mod engine;
mod refresh;

pub use engine::{AzanScheduler, SchedulerError, SchedulerHandle, SchedulerState};
pub use refresh::{spawn_refresh_loop, RefreshSchedule, RefreshScheduleError};
