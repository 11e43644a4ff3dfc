//! Tokio sleep-based timer service.
//!
//! Each armed key owns one sleep task; arming a key aborts the previous
//! task under the table lock before installing the new one, so there is
//! never a window with two live registrations for the same key.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::core::slot::AlarmKey;
use crate::platform::permissions::PermissionProbe;

use super::{AlarmTimer, FiredAlarm, Precision, Registration, TimerError};

/// Timer service backed by tokio sleep tasks.
///
/// Exact delivery is gated by the [`PermissionProbe`]; when the probe
/// reports exact alarms as denied, `arm` with [`Precision::Exact`]
/// returns [`TimerError::ExactDenied`] so the caller can fall back.
pub struct SleepTimer {
    fired_tx: mpsc::Sender<FiredAlarm>,
    probe: Arc<dyn PermissionProbe>,
    tasks: Mutex<HashMap<AlarmKey, JoinHandle<()>>>,
}

impl SleepTimer {
    /// Create a timer that delivers fired registrations on `fired_tx`.
    pub fn new(fired_tx: mpsc::Sender<FiredAlarm>, probe: Arc<dyn PermissionProbe>) -> Self {
        Self {
            fired_tx,
            probe,
            tasks: Mutex::new(HashMap::new()),
        }
    }

    fn lock_tasks(&self) -> Result<std::sync::MutexGuard<'_, HashMap<AlarmKey, JoinHandle<()>>>, TimerError> {
        self.tasks
            .lock()
            .map_err(|_| TimerError::Rejected("timer table lock poisoned".into()))
    }
}

impl AlarmTimer for SleepTimer {
    fn arm(&self, registration: Registration, precision: Precision) -> Result<Precision, TimerError> {
        if precision == Precision::Exact && !self.probe.exact_alarms_allowed() {
            return Err(TimerError::ExactDenied);
        }

        let key = registration.key;
        let delay = (registration.fire_at - Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO);

        let fired = FiredAlarm {
            key,
            fire_at: registration.fire_at,
            payload: registration.payload,
        };
        let tx = self.fired_tx.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if tx.send(fired).await.is_err() {
                tracing::warn!(key = %key, "dispatch channel closed, dropping fired alarm");
            }
        });

        let mut tasks = self.lock_tasks()?;
        if let Some(previous) = tasks.remove(&key) {
            previous.abort();
            tracing::debug!(key = %key, "replaced existing registration");
        }
        tasks.insert(key, handle);

        Ok(precision)
    }

    fn cancel(&self, key: AlarmKey) -> bool {
        let Ok(mut tasks) = self.tasks.lock() else {
            return false;
        };
        match tasks.remove(&key) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    fn is_armed(&self, key: AlarmKey) -> bool {
        self.tasks
            .lock()
            .map(|tasks| tasks.get(&key).is_some_and(|h| !h.is_finished()))
            .unwrap_or(false)
    }

    fn armed_count(&self) -> usize {
        self.tasks
            .lock()
            .map(|mut tasks| {
                tasks.retain(|_, handle| !handle.is_finished());
                tasks.len()
            })
            .unwrap_or(0)
    }
}
