//! Alert evaluation: latest reading -> categorical health/safety levels.
//!
//! Three independent axes (air quality, gas safety, device activity), each
//! rendered as its own badge. They are deliberately never merged into one
//! combined score. Evaluation is a pure, total function of a single record;
//! every input has already been defaulted by the normalizer.
//!
//! Gas thresholds are the final 600/1000 set; the 150/300 values some very old
//! firmware dashboards used are superseded.

use serde::Serialize;

use crate::models::SensorRecord;

// ---

/// PM2.5 classification. Boundaries are closed on the lower class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AirQualityLevel {
    /// pm25 <= 80 µg/m³.
    Clean,
    /// 80 < pm25 <= 150 µg/m³.
    Mild,
    /// pm25 > 150 µg/m³.
    Severe,
}

impl AirQualityLevel {
    /// Banner text for the dashboard's air-quality badge.
    pub fn description(&self) -> &'static str {
        match self {
            AirQualityLevel::Clean => "Air is clean",
            AirQualityLevel::Mild => "Warning: mild pollution",
            AirQualityLevel::Severe => "DANGER: heavy pollution",
        }
    }
}

/// Gas-sensor index classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GasSafetyLevel {
    /// index < 600.
    Safe,
    /// 600 <= index < 1000.
    Warning,
    /// index >= 1000.
    Danger,
}

impl GasSafetyLevel {
    pub fn description(&self) -> &'static str {
        match self {
            GasSafetyLevel::Safe => "Gas level normal",
            GasSafetyLevel::Warning => "Gas level elevated, ventilate",
            GasSafetyLevel::Danger => "Gas level dangerous",
        }
    }
}

/// Device activity as reported in the latest record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeviceStatus {
    Active,
    Inactive,
}

/// The three badges shown next to the current metrics. Recomputed in full on
/// every refresh from the latest record only; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AlertState {
    // ---
    pub air_quality: AirQualityLevel,
    pub gas_safety: GasSafetyLevel,
    pub device: DeviceStatus,
}

// ---

/// Classify the latest record against the fixed threshold table.
pub fn evaluate(record: &SensorRecord) -> AlertState {
    // ---
    let air_quality = if record.pm25 <= 80.0 {
        AirQualityLevel::Clean
    } else if record.pm25 <= 150.0 {
        AirQualityLevel::Mild
    } else {
        AirQualityLevel::Severe
    };

    let gas_safety = if record.gas_index < 600 {
        GasSafetyLevel::Safe
    } else if record.gas_index < 1000 {
        GasSafetyLevel::Warning
    } else {
        GasSafetyLevel::Danger
    };

    let device = if record.device_active {
        DeviceStatus::Active
    } else {
        DeviceStatus::Inactive
    };

    AlertState {
        air_quality,
        gas_safety,
        device,
    }
}
