//! Deferred reboot recovery.
//!
//! Timer registrations do not survive a reboot, and there is no
//! guarantee of network access at boot time. The boot hook therefore
//! only flags that the schedule must be recomputed; the owning
//! application checks the flag on its next activation and calls
//! [`crate::scheduler::SchedulerHandle::schedule_day`] (or `refresh`)
//! again, then clears the flag.

use std::sync::Arc;

use crate::events::{Event, EventBus};
use crate::storage::{ScheduleStore, StoreError};

/// Sets the persisted needs-reschedule flag on a boot signal.
pub struct RebootRecoveryHook<S: ScheduleStore> {
    store: Arc<S>,
    events: Arc<EventBus>,
}

impl<S: ScheduleStore> RebootRecoveryHook<S> {
    /// Create a hook over the given store.
    pub fn new(store: Arc<S>, events: Arc<EventBus>) -> Self {
        Self { store, events }
    }

    /// Handle the system boot signal.
    ///
    /// Does not re-arm anything itself.
    pub async fn on_boot_signal(&self) -> Result<(), StoreError> {
        self.store.set_needs_reschedule(true).await?;
        tracing::info!("boot signal received, schedule flagged for recomputation");
        self.events.emit(Event::reschedule_flagged()).await;
        Ok(())
    }
}
