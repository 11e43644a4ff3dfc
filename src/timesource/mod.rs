//! Prayer-time lookup.
//!
//! The daily timetable comes from an external calculation service; the
//! core only consumes the result. A failed or malformed fetch aborts
//! that refresh cycle with no side effects on armed registrations.

mod http;

pub use http::HttpTimeSource;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::core::slot::PrayerSlot;
use crate::core::types::Coordinates;

/// Errors that can occur while fetching prayer times.
#[derive(Debug, Error)]
pub enum TimeSourceError {
    /// Transport-level failure.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("time source returned status {0}")]
    Status(u16),

    /// The response body did not have the expected shape.
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Local wall-clock prayer times for one day.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DayTimes {
    times: BTreeMap<PrayerSlot, NaiveTime>,
}

impl DayTimes {
    /// Create an empty timetable.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the time for a slot.
    pub fn set(&mut self, slot: PrayerSlot, time: NaiveTime) {
        self.times.insert(slot, time);
    }

    /// Builder-style variant of [`DayTimes::set`].
    pub fn with(mut self, slot: PrayerSlot, time: NaiveTime) -> Self {
        self.set(slot, time);
        self
    }

    /// Get the time for a slot, if present.
    pub fn get(&self, slot: PrayerSlot) -> Option<NaiveTime> {
        self.times.get(&slot).copied()
    }

    /// Iterate over the present slots in firing order.
    pub fn iter(&self) -> impl Iterator<Item = (PrayerSlot, NaiveTime)> + '_ {
        self.times.iter().map(|(slot, time)| (*slot, *time))
    }

    /// Number of slots with a time.
    pub fn len(&self) -> usize {
        self.times.len()
    }

    /// Whether no slot has a time.
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

/// External supplier of the daily prayer timetable.
#[async_trait]
pub trait TimeSource: Send + Sync {
    /// Fetch the timetable for a date at a location, using the given
    /// calculation method id.
    async fn fetch(
        &self,
        date: NaiveDate,
        coordinates: Coordinates,
        method: u32,
    ) -> Result<DayTimes, TimeSourceError>;
}
