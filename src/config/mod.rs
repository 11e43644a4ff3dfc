//! Configuration loading and validation.
//!
//! The daemon is configured by one YAML file; everything has a default
//! so an empty file is a valid configuration for UTC at (0, 0).

mod error;
mod types;

pub use error::ConfigError;
pub use types::{ApiConfig, AppConfig, AudioConfig, LocationConfig, StorageConfig};

use chrono_tz::Tz;
use std::path::Path;

use crate::scheduler::RefreshSchedule;

/// Load and validate a configuration file.
pub fn load_config(path: impl AsRef<Path>) -> Result<AppConfig, ConfigError> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;

    let config: AppConfig = serde_yaml::from_str(&contents).map_err(|source| ConfigError::Yaml {
        path: path.to_path_buf(),
        source,
    })?;

    validate(&config)?;
    Ok(config)
}

/// Validate a configuration.
pub fn validate(config: &AppConfig) -> Result<(), ConfigError> {
    if !config.coordinates().is_valid() {
        return Err(ConfigError::Invalid(format!(
            "coordinates out of range: {}",
            config.coordinates()
        )));
    }

    if !(0.0..=1.0).contains(&config.audio.volume) {
        return Err(ConfigError::Invalid(format!(
            "volume must be within 0.0..=1.0, got {}",
            config.audio.volume
        )));
    }

    parse_timezone(config)?;

    RefreshSchedule::new(&config.refresh)
        .map_err(|e| ConfigError::Invalid(format!("refresh expression: {}", e)))?;

    Ok(())
}

/// Parse the configured timezone.
pub fn parse_timezone(config: &AppConfig) -> Result<Tz, ConfigError> {
    config
        .location
        .timezone
        .parse::<Tz>()
        .map_err(|_| ConfigError::Invalid(format!("unknown timezone: {}", config.location.timezone)))
}
