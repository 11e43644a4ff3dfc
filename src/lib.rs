//! muezzin - prayer-times alarm scheduling and azan playback.
//!
//! The crate is organized around a small scheduling core and narrow
//! traits for every platform collaborator:
//!
//! - [`scheduler`]: the engine that turns a day's prayer times into
//!   timer registrations, plus the handle that controls it
//! - [`timer`]: keyed exact/best-effort wake registrations
//! - [`storage`]: persisted armed alarms and the reboot-recovery flag
//! - [`dispatch`]: fired-registration handling and playback handoff
//! - [`playback`]: the at-most-one azan playback session
//! - [`timesource`]: the external prayer-time provider
//! - [`api`]: the HTTP control surface for the application shell

pub mod api;
pub mod config;
pub mod core;
pub mod dispatch;
pub mod events;
pub mod notify;
pub mod platform;
pub mod playback;
pub mod recovery;
pub mod scheduler;
pub mod storage;
pub mod testing;
pub mod timer;
pub mod timesource;

pub use crate::core::settings::AzanSettings;
pub use crate::core::slot::{AlarmKey, PrayerSlot};
pub use crate::core::types::{Coordinates, SessionId, TrackId};
pub use dispatch::{AlarmDispatcher, DispatchState, DispatcherConfig, WakeSource};
pub use events::{Event, EventBus, EventHandler};
pub use playback::{AssetLibrary, PlaybackController, SessionHandle};
pub use recovery::RebootRecoveryHook;
pub use scheduler::{AzanScheduler, SchedulerError, SchedulerHandle, SchedulerState};
pub use storage::{AlarmKind, InMemoryStore, ScheduleStore, StoreError, StoredAlarm};
pub use timer::{AlarmPayload, AlarmTimer, FiredAlarm, Precision, Registration, SleepTimer};
pub use timesource::{DayTimes, TimeSource, TimeSourceError};
