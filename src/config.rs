//! Configuration loader for the `codemetal-airwatch` backend service.
//!
//! This module centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). By consolidating configuration logic here, we
//! avoid scattering `env::var` calls throughout the codebase, improving
//!
use std::env;

use anyhow::{anyhow, Result};

/// Parse an optional integer environment variable with a default value.
macro_rules! parse_env_u32 {
    ($var_name:expr, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.parse::<u32>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse a required string environment variable.
macro_rules! require_env {
    ($var_name:expr) => {
        env::var($var_name)
            .map_err(|_| anyhow!("{} must be set in .env or environment", $var_name))?
    };
}

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the application.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// Remote keyed store base URL (Firebase RTDB instance).
    pub store_url: String,

    /// Optional auth token appended to store requests.
    pub store_auth_token: Option<String>,

    /// Assumed device push cadence, used for synthetic timestamps.
    pub sampling_interval_secs: u32,

    /// Snapshot cache validity window; refreshes inside it reuse the last fetch.
    pub snapshot_max_age_secs: u32,

    /// How far ahead the PM2.5 forecast extends.
    pub forecast_horizon_minutes: u32,
}

/// Load configuration from environment variables with defaults.
///
/// Required:
/// - `STORE_URL` – remote keyed store base URL
///
/// Optional:
/// - `STORE_AUTH_TOKEN` – store auth token (default: none)
/// - `SAMPLING_INTERVAL_SECS` – assumed push cadence (default: 5)
/// - `SNAPSHOT_MAX_AGE_SECS` – snapshot cache window (default: 6)
/// - `FORECAST_HORIZON_MINUTES` – forecast horizon (default: 10)
///
/// Returns an error if any required variable is missing or invalid.
pub fn load_from_env() -> Result<Config> {
    // ---
    let store_url = require_env!("STORE_URL");
    let store_auth_token = env::var("STORE_AUTH_TOKEN").ok().filter(|t| !t.is_empty());
    let sampling_interval_secs = parse_env_u32!("SAMPLING_INTERVAL_SECS", 5);
    let snapshot_max_age_secs = parse_env_u32!("SNAPSHOT_MAX_AGE_SECS", 6);
    let forecast_horizon_minutes = parse_env_u32!("FORECAST_HORIZON_MINUTES", 10);

    if sampling_interval_secs == 0 {
        return Err(anyhow!("SAMPLING_INTERVAL_SECS must be at least 1"));
    }

    Ok(Config {
        store_url,
        store_auth_token,
        sampling_interval_secs,
        snapshot_max_age_secs,
        forecast_horizon_minutes,
    })
}

impl Config {
    /// Log the loaded configuration for debugging purposes.
    ///
    /// Masks the auth token while showing all configuration values that were
    /// loaded.
    pub fn log_config(&self) {
        // ---
        let masked_token = match &self.store_auth_token {
            Some(_) => "****",
            None => "(none)",
        };

        tracing::info!("Configuration loaded:");
        tracing::info!("  STORE_URL                : {}", self.store_url);
        tracing::info!("  STORE_AUTH_TOKEN         : {}", masked_token);
        tracing::info!("  SAMPLING_INTERVAL_SECS   : {}", self.sampling_interval_secs);
        tracing::info!("  SNAPSHOT_MAX_AGE_SECS    : {}", self.snapshot_max_age_secs);
        tracing::info!("  FORECAST_HORIZON_MINUTES : {}", self.forecast_horizon_minutes);
    }
}
