//! In-memory storage implementation.
//!
//! Provides a thread-safe in-memory backend for testing and development.
//! Data is not persisted across restarts.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::core::slot::AlarmKey;

use super::{ScheduleStore, StoreError, StoredAlarm};

/// In-memory storage backend.
pub struct InMemoryStore {
    alarms: RwLock<HashMap<AlarmKey, StoredAlarm>>,
    needs_reschedule: AtomicBool,
}

impl InMemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            alarms: RwLock::new(HashMap::new()),
            needs_reschedule: AtomicBool::new(false),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScheduleStore for InMemoryStore {
    async fn upsert_alarm(&self, alarm: StoredAlarm) -> Result<(), StoreError> {
        let mut alarms = self.alarms.write().map_err(|_| StoreError::LockPoisoned)?;
        alarms.insert(alarm.key, alarm);
        Ok(())
    }

    async fn get_alarm(&self, key: AlarmKey) -> Result<StoredAlarm, StoreError> {
        let alarms = self.alarms.read().map_err(|_| StoreError::LockPoisoned)?;
        alarms
            .get(&key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("alarm: {}", key)))
    }

    async fn list_alarms(&self) -> Result<Vec<StoredAlarm>, StoreError> {
        let alarms = self.alarms.read().map_err(|_| StoreError::LockPoisoned)?;
        let mut result: Vec<_> = alarms.values().cloned().collect();
        result.sort_by(|a, b| a.fire_at.cmp(&b.fire_at));
        Ok(result)
    }

    async fn remove_alarm(&self, key: AlarmKey) -> Result<(), StoreError> {
        let mut alarms = self.alarms.write().map_err(|_| StoreError::LockPoisoned)?;
        alarms
            .remove(&key)
            .ok_or_else(|| StoreError::NotFound(format!("alarm: {}", key)))?;
        Ok(())
    }

    async fn clear_alarms(&self) -> Result<(), StoreError> {
        let mut alarms = self.alarms.write().map_err(|_| StoreError::LockPoisoned)?;
        alarms.clear();
        Ok(())
    }

    async fn set_needs_reschedule(&self, value: bool) -> Result<(), StoreError> {
        self.needs_reschedule.store(value, Ordering::SeqCst);
        Ok(())
    }

    async fn needs_reschedule(&self) -> Result<bool, StoreError> {
        Ok(self.needs_reschedule.load(Ordering::SeqCst))
    }
}
