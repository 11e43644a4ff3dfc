//! SQLite storage implementation.
//!
//! Provides persistent storage using a SQLite database, so armed alarms
//! survive a daemon restart and the reboot flag survives everything.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

use crate::core::slot::{AlarmKey, PrayerSlot};
use crate::core::types::TrackId;
use crate::timer::Precision;

use super::{AlarmKind, ScheduleStore, StoreError, StoredAlarm};

const NEEDS_RESCHEDULE_FLAG: &str = "needs_reschedule";

/// SQLite storage backend.
///
/// Creates the database file if missing and runs migrations on open.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) a SQLite database at the given path.
    pub async fn new(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path_str = path.as_ref().to_string_lossy();
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path_str))
            .map_err(|e| StoreError::Other(e.to_string()))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Other(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Create an in-memory SQLite database (useful for testing).
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| StoreError::Other(e.to_string()))?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Other(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Run database migrations.
    async fn run_migrations(&self) -> Result<(), StoreError> {
        let schema = include_str!("../../migrations/001_initial_schema.sql");
        sqlx::raw_sql(schema)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Other(format!("migration failed: {}", e)))?;
        Ok(())
    }

    /// Close the database connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

// Helper functions for column conversion

fn datetime_to_string(dt: DateTime<Utc>) -> String {
    dt.timestamp_millis().to_string()
}

fn string_to_datetime(s: &str) -> DateTime<Utc> {
    s.parse::<i64>()
        .ok()
        .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

fn precision_to_string(precision: Precision) -> &'static str {
    match precision {
        Precision::Exact => "exact",
        Precision::BestEffort => "best_effort",
    }
}

fn string_to_precision(s: &str) -> Precision {
    match s {
        "best_effort" => Precision::BestEffort,
        _ => Precision::Exact,
    }
}

fn slot_to_string(slot: PrayerSlot) -> String {
    slot.api_name().to_ascii_lowercase()
}

fn string_to_slot(s: &str) -> Result<PrayerSlot, StoreError> {
    s.parse()
        .map_err(|_| StoreError::Serialization(format!("unknown slot: {}", s)))
}

type AlarmRow = (
    i64,            // key
    String,         // slot
    String,         // kind
    Option<String>, // track
    Option<f64>,    // volume
    Option<bool>,   // vibrate
    String,         // fire_at
    String,         // precision
    String,         // created_at
);

fn row_to_alarm(row: AlarmRow) -> Result<StoredAlarm, StoreError> {
    let kind = match row.2.as_str() {
        "azan" => AlarmKind::Azan {
            track: TrackId::new(row.3.unwrap_or_default()),
            volume: row.4.unwrap_or(0.0) as f32,
            vibrate: row.5.unwrap_or(false),
        },
        "reminder" => AlarmKind::Reminder,
        other => {
            return Err(StoreError::Serialization(format!(
                "unknown alarm kind: {}",
                other
            )));
        }
    };

    Ok(StoredAlarm {
        key: AlarmKey::new(row.0 as u32),
        slot: string_to_slot(&row.1)?,
        kind,
        fire_at: string_to_datetime(&row.6),
        precision: string_to_precision(&row.7),
        created_at: string_to_datetime(&row.8),
    })
}

#[async_trait]
impl ScheduleStore for SqliteStore {
    async fn upsert_alarm(&self, alarm: StoredAlarm) -> Result<(), StoreError> {
        let (kind, track, volume, vibrate) = match &alarm.kind {
            AlarmKind::Azan {
                track,
                volume,
                vibrate,
            } => (
                "azan",
                Some(track.as_str().to_string()),
                Some(*volume as f64),
                Some(*vibrate),
            ),
            AlarmKind::Reminder => ("reminder", None, None, None),
        };

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO alarms
                (key, slot, kind, track, volume, vibrate, fire_at, precision, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(alarm.key.as_u32() as i64)
        .bind(slot_to_string(alarm.slot))
        .bind(kind)
        .bind(track)
        .bind(volume)
        .bind(vibrate)
        .bind(datetime_to_string(alarm.fire_at))
        .bind(precision_to_string(alarm.precision))
        .bind(datetime_to_string(alarm.created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Other(e.to_string()))?;

        Ok(())
    }

    async fn get_alarm(&self, key: AlarmKey) -> Result<StoredAlarm, StoreError> {
        let row: AlarmRow = sqlx::query_as(
            "SELECT key, slot, kind, track, volume, vibrate, fire_at, precision, created_at
             FROM alarms WHERE key = ?",
        )
        .bind(key.as_u32() as i64)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Other(e.to_string()))?
        .ok_or_else(|| StoreError::NotFound(format!("alarm: {}", key)))?;

        row_to_alarm(row)
    }

    async fn list_alarms(&self) -> Result<Vec<StoredAlarm>, StoreError> {
        let rows: Vec<AlarmRow> = sqlx::query_as(
            "SELECT key, slot, kind, track, volume, vibrate, fire_at, precision, created_at
             FROM alarms ORDER BY CAST(fire_at AS INTEGER)",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Other(e.to_string()))?;

        rows.into_iter().map(row_to_alarm).collect()
    }

    async fn remove_alarm(&self, key: AlarmKey) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM alarms WHERE key = ?")
            .bind(key.as_u32() as i64)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Other(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("alarm: {}", key)));
        }
        Ok(())
    }

    async fn clear_alarms(&self) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM alarms")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Other(e.to_string()))?;
        Ok(())
    }

    async fn set_needs_reschedule(&self, value: bool) -> Result<(), StoreError> {
        sqlx::query("INSERT OR REPLACE INTO flags (name, value) VALUES (?, ?)")
            .bind(NEEDS_RESCHEDULE_FLAG)
            .bind(value)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Other(e.to_string()))?;
        Ok(())
    }

    async fn needs_reschedule(&self) -> Result<bool, StoreError> {
        let row: Option<(bool,)> = sqlx::query_as("SELECT value FROM flags WHERE name = ?")
            .bind(NEEDS_RESCHEDULE_FLAG)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Other(e.to_string()))?;

        Ok(row.map(|(value,)| value).unwrap_or(false))
    }
}
