//! Daily refresh scheduling.
//!
//! Parses the refresh expression from configuration (cron, shortcuts,
//! or `@every` intervals) and drives the periodic timetable refresh.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule as CronSchedule;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;

use super::SchedulerHandle;

/// Errors that can occur when parsing a refresh expression.
#[derive(Debug, Error)]
pub enum RefreshScheduleError {
    /// Invalid cron expression.
    #[error("invalid cron expression: {0}")]
    InvalidCron(String),

    /// Invalid interval expression.
    #[error("invalid interval expression: {0}")]
    InvalidInterval(String),

    /// No more occurrences.
    #[error("no more occurrences")]
    NoMoreOccurrences,
}

/// When the daily timetable refresh runs.
#[derive(Debug, Clone)]
pub struct RefreshSchedule {
    expression: String,
    kind: ScheduleKind,
}

#[derive(Debug, Clone)]
enum ScheduleKind {
    /// Cron schedule, evaluated in the configured local timezone.
    Cron(Box<CronSchedule>),
    /// Interval-based schedule (e.g. @every 6h).
    Interval(Duration),
}

impl RefreshSchedule {
    /// Parse a refresh expression.
    ///
    /// Supports:
    /// - Standard 5-field cron: `minute hour day month weekday`
    /// - Extended 6-field cron: `second minute hour day month weekday`
    /// - Shortcuts: `@daily`, `@midnight`, `@hourly`
    /// - Intervals: `@every 6h`, `@every 1h30m`
    pub fn new(expression: impl Into<String>) -> Result<Self, RefreshScheduleError> {
        let expression = expression.into();
        let kind = Self::parse_expression(&expression)?;
        Ok(Self { expression, kind })
    }

    /// Get the original expression string.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    fn parse_expression(expression: &str) -> Result<ScheduleKind, RefreshScheduleError> {
        let trimmed = expression.trim();
        if trimmed.starts_with('@') {
            return Self::parse_shortcut(trimmed);
        }
        Self::parse_cron(trimmed)
    }

    fn parse_shortcut(expression: &str) -> Result<ScheduleKind, RefreshScheduleError> {
        match expression.to_lowercase().as_str() {
            "@daily" | "@midnight" => Self::parse_cron("30 0 * * *"),
            "@hourly" => Self::parse_cron("0 * * * *"),
            s if s.starts_with("@every ") => Self::parse_interval(&s[7..]),
            _ => Err(RefreshScheduleError::InvalidCron(format!(
                "unknown shortcut: {}",
                expression
            ))),
        }
    }

    fn parse_interval(interval: &str) -> Result<ScheduleKind, RefreshScheduleError> {
        let mut total_secs: u64 = 0;
        let mut current_num = String::new();

        for c in interval.trim().chars() {
            if c.is_ascii_digit() {
                current_num.push(c);
            } else {
                let num: u64 = current_num
                    .parse()
                    .map_err(|_| RefreshScheduleError::InvalidInterval(interval.to_string()))?;
                current_num.clear();

                match c {
                    's' => total_secs += num,
                    'm' => total_secs += num * 60,
                    'h' => total_secs += num * 3600,
                    'd' => total_secs += num * 86400,
                    _ => return Err(RefreshScheduleError::InvalidInterval(interval.to_string())),
                }
            }
        }

        if total_secs == 0 {
            return Err(RefreshScheduleError::InvalidInterval(interval.to_string()));
        }

        Ok(ScheduleKind::Interval(Duration::from_secs(total_secs)))
    }

    fn parse_cron(expression: &str) -> Result<ScheduleKind, RefreshScheduleError> {
        let fields: Vec<&str> = expression.split_whitespace().collect();

        let cron_expr = match fields.len() {
            // standard 5-field cron, add seconds field
            5 => format!("0 {}", expression),
            6 => expression.to_string(),
            _ => {
                return Err(RefreshScheduleError::InvalidCron(format!(
                    "expected 5 or 6 fields, got {}",
                    fields.len()
                )));
            }
        };

        let schedule = CronSchedule::from_str(&cron_expr)
            .map_err(|e| RefreshScheduleError::InvalidCron(e.to_string()))?;

        Ok(ScheduleKind::Cron(Box::new(schedule)))
    }

    /// Get the next occurrence after the given time, evaluated in `tz`.
    pub fn next_after(
        &self,
        after: DateTime<Utc>,
        tz: Tz,
    ) -> Result<DateTime<Utc>, RefreshScheduleError> {
        match &self.kind {
            ScheduleKind::Cron(schedule) => {
                let local = after.with_timezone(&tz);
                schedule
                    .after(&local)
                    .next()
                    .map(|dt| dt.with_timezone(&Utc))
                    .ok_or(RefreshScheduleError::NoMoreOccurrences)
            }
            ScheduleKind::Interval(duration) => {
                let step = chrono::Duration::from_std(*duration)
                    .map_err(|_| RefreshScheduleError::InvalidInterval(self.expression.clone()))?;
                Ok(after + step)
            }
        }
    }
}

/// Drive the periodic timetable refresh.
///
/// Sleeps until each occurrence, then triggers [`SchedulerHandle::refresh`].
/// A failed refresh leaves armed alarms untouched and waits for the
/// next occurrence.
pub fn spawn_refresh_loop(
    handle: SchedulerHandle,
    schedule: RefreshSchedule,
    tz: Tz,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let now = Utc::now();
            let next = match schedule.next_after(now, tz) {
                Ok(next) => next,
                Err(e) => {
                    tracing::error!(error = %e, "refresh schedule exhausted, stopping loop");
                    break;
                }
            };

            let delay = (next - now).to_std().unwrap_or(Duration::ZERO);
            tracing::info!(next = %next, "next schedule refresh planned");
            tokio::time::sleep(delay).await;

            match handle.refresh().await {
                Ok(armed) => tracing::debug!(armed, "scheduled refresh completed"),
                Err(e) => tracing::warn!(error = %e, "scheduled refresh failed"),
            }
        }
    })
}
