//! Simple data models for the air quality pipeline.
//!
//! The remote store hands us an unordered keyed collection of flat field-maps;
//! everything downstream works on typed, timestamped [`SensorRecord`]s produced
//! by the normalizer.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

// ---

/// Field names as written by the device into the remote store.
pub mod fields {
    pub const TEMPERATURE: &str = "temp";
    pub const HUMIDITY: &str = "hum";
    pub const PM25: &str = "pm25";
    pub const GAS_INDEX: &str = "mq135";
    pub const DEVICE_ON: &str = "deviceOn";
}

/// Raw snapshot as fetched from the store: push-order key -> flat field-map.
///
/// `BTreeMap` so iteration yields keys in ascending order. The store issues
/// monotonically increasing keys, so ascending key order *is* push order; the
/// keys themselves are opaque sortable tokens and are never parsed.
pub type RawSnapshot = BTreeMap<String, BTreeMap<String, Value>>;

/// One normalized observation.
///
/// All fields are already defaulted by the normalizer, so consumers never see
/// missing values. `timestamp` is synthetic: derived from push order and an
/// assumed fixed sampling cadence, not measured by the device.
#[derive(Debug, Clone, Serialize)]
pub struct SensorRecord {
    // ---
    /// Opaque push-order key from the store.
    pub key: String,
    /// Synthetic observation time, evenly spaced ending at "now".
    pub timestamp: DateTime<Utc>,
    /// Degrees Celsius.
    pub temperature: f64,
    /// Relative humidity, percent.
    pub humidity: f64,
    /// Particulate concentration, µg/m³. Primary air-quality signal.
    pub pm25: f64,
    /// Unitless resistive gas-sensor index.
    pub gas_index: i64,
    /// Whether the device reported itself active.
    pub device_active: bool,
}

impl SensorRecord {
    /// Device status rendered as the two-valued label used by the raw-data table.
    pub fn device_label(&self) -> &'static str {
        // ---
        if self.device_active {
            "Active"
        } else {
            "Inactive"
        }
    }
}
