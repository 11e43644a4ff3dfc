//! HTTP time source.
//!
//! Fetches the daily timetable from an Aladhan-style timings endpoint:
//! `GET {base}/v1/timings/{DD-MM-YYYY}?latitude=..&longitude=..&method=..`
//! The response carries local times as "HH:MM" strings (sometimes with a
//! timezone suffix after a space, which is dropped).

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use serde_json::Value;
use std::time::Duration;

use crate::core::slot::PrayerSlot;
use crate::core::types::Coordinates;

use super::{DayTimes, TimeSource, TimeSourceError};

const DEFAULT_BASE_URL: &str = "https://api.aladhan.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Time source backed by an Aladhan-compatible HTTP API.
pub struct HttpTimeSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTimeSource {
    /// Create a source against the public Aladhan API.
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Create a source against a custom base URL.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

impl Default for HttpTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TimeSource for HttpTimeSource {
    async fn fetch(
        &self,
        date: NaiveDate,
        coordinates: Coordinates,
        method: u32,
    ) -> Result<DayTimes, TimeSourceError> {
        let url = format!(
            "{}/v1/timings/{}?latitude={}&longitude={}&method={}",
            self.base_url,
            date.format("%d-%m-%Y"),
            coordinates.latitude,
            coordinates.longitude,
            method
        );

        tracing::debug!(url = %url, "fetching prayer times");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TimeSourceError::Status(status.as_u16()));
        }

        let body: Value = response.json().await?;
        parse_timings(&body)
    }
}

/// Extract the five slot times from a timings response body.
pub(crate) fn parse_timings(body: &Value) -> Result<DayTimes, TimeSourceError> {
    let timings = body
        .get("data")
        .and_then(|data| data.get("timings"))
        .ok_or_else(|| TimeSourceError::Malformed("missing data.timings".into()))?;

    let mut times = DayTimes::new();
    for slot in PrayerSlot::ALL {
        let raw = timings
            .get(slot.api_name())
            .and_then(Value::as_str)
            .ok_or_else(|| TimeSourceError::Malformed(format!("missing {}", slot.api_name())))?;

        // "04:38 (WIB)" -> "04:38"
        let clock = raw
            .split_whitespace()
            .next()
            .ok_or_else(|| TimeSourceError::Malformed(format!("empty time for {}", slot)))?;

        let time = NaiveTime::parse_from_str(clock, "%H:%M").map_err(|_| {
            TimeSourceError::Malformed(format!("bad time for {}: {}", slot, raw))
        })?;
        times.set(slot, time);
    }

    Ok(times)
}
