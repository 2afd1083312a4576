//! Record normalization: raw keyed snapshot -> ordered, typed, timestamped series.
//!
//! The store's records carry no authoritative timestamp, so the normalizer
//! assigns synthetic ones from push order and an assumed fixed sampling
//! cadence. That inference is a known design smell inherited from the device
//! firmware, so it lives behind [`TimestampStrategy`]: if the device ever
//! starts sending real timestamps, only the strategy changes, not the
//! normalizer or anything downstream.
//!
//! Malformed fields are contained here: a non-numeric value in a numeric field
//! resolves to that field's default rather than dropping the record or
//! aborting the snapshot. One bad reading must not blank the dashboard.

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tracing::warn;

use crate::models::{fields, RawSnapshot, SensorRecord};

// ---

/// Assigns observation times to a batch of `n` push-ordered records.
///
/// Implementations must return exactly `n` strictly increasing timestamps,
/// index 0 being the oldest record.
pub trait TimestampStrategy {
    fn assign(&self, n: usize, now: DateTime<Utc>) -> Vec<DateTime<Utc>>;
}

/// Default strategy: records evenly spaced at the configured sampling
/// interval, ending at `now` for the most recent record.
///
/// The i-th of n records gets `now - (n-1-i) * interval`. The wall clock is
/// captured once per normalization pass so spacing is exact.
pub struct FixedCadence {
    pub interval: Duration,
}

impl FixedCadence {
    pub fn from_secs(secs: u32) -> Self {
        Self {
            interval: Duration::seconds(i64::from(secs)),
        }
    }
}

impl TimestampStrategy for FixedCadence {
    fn assign(&self, n: usize, now: DateTime<Utc>) -> Vec<DateTime<Utc>> {
        // ---
        (0..n)
            .map(|i| now - self.interval * ((n - 1 - i) as i32))
            .collect()
    }
}

// ---

/// Normalize a raw keyed snapshot into an ordered series of typed records.
///
/// Records come out sorted ascending by key (push order, the only signal for
/// "most recent"), with synthetic timestamps from `strategy`. Empty input
/// yields an empty vec. Never fails: field-level coercion problems resolve to
/// field defaults.
pub fn normalize(
    raw: &RawSnapshot,
    strategy: &dyn TimestampStrategy,
    now: DateTime<Utc>,
) -> Vec<SensorRecord> {
    // ---
    if raw.is_empty() {
        return Vec::new();
    }

    let timestamps = strategy.assign(raw.len(), now);

    // BTreeMap iteration is already ascending by key.
    raw.iter()
        .zip(timestamps)
        .map(|((key, field_map), timestamp)| SensorRecord {
            key: key.clone(),
            timestamp,
            temperature: coerce_f64(key, field_map.get(fields::TEMPERATURE), fields::TEMPERATURE),
            humidity: coerce_f64(key, field_map.get(fields::HUMIDITY), fields::HUMIDITY),
            pm25: coerce_f64(key, field_map.get(fields::PM25), fields::PM25),
            gas_index: coerce_i64(key, field_map.get(fields::GAS_INDEX), fields::GAS_INDEX),
            device_active: coerce_bool(key, field_map.get(fields::DEVICE_ON), fields::DEVICE_ON),
        })
        .collect()
}

// ---

/// Numeric coercion accepts JSON numbers and numeric strings; the firmware has
/// historically emitted both. Anything else falls back to 0.
fn coerce_f64(key: &str, value: Option<&Value>, field: &str) -> f64 {
    // ---
    match value {
        None => 0.0,
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => match s.trim().parse::<f64>() {
            Ok(v) => v,
            Err(_) => {
                warn!("record {key}: non-numeric {field} {s:?}, using default");
                0.0
            }
        },
        Some(other) => {
            warn!("record {key}: malformed {field} {other}, using default");
            0.0
        }
    }
}

fn coerce_i64(key: &str, value: Option<&Value>, field: &str) -> i64 {
    // ---
    match value {
        None => 0,
        // The sensor index is nominally integral but some firmware revisions
        // pushed it as a float; truncate rather than reject.
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Some(Value::String(s)) => match s.trim().parse::<i64>() {
            Ok(v) => v,
            Err(_) => {
                warn!("record {key}: non-numeric {field} {s:?}, using default");
                0
            }
        },
        Some(other) => {
            warn!("record {key}: malformed {field} {other}, using default");
            0
        }
    }
}

/// Device-activity flag defaults to true when absent: old records predate the
/// field and those devices were necessarily on when they pushed.
fn coerce_bool(key: &str, value: Option<&Value>, field: &str) -> bool {
    // ---
    match value {
        None => true,
        Some(Value::Bool(b)) => *b,
        Some(other) => {
            warn!("record {key}: malformed {field} {other}, using default");
            true
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn field_map(pairs: &[(&str, Value)]) -> std::collections::BTreeMap<String, Value> {
        // ---
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn raw_record(
        temp: f64,
        hum: f64,
        pm25: f64,
        mq135: i64,
        on: bool,
    ) -> std::collections::BTreeMap<String, Value> {
        // ---
        field_map(&[
            ("temp", json!(temp)),
            ("hum", json!(hum)),
            ("pm25", json!(pm25)),
            ("mq135", json!(mq135)),
            ("deviceOn", json!(on)),
        ])
    }

    fn test_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn empty_snapshot_yields_empty_series() {
        // ---
        let raw = RawSnapshot::new();
        let out = normalize(&raw, &FixedCadence::from_secs(5), test_now());
        assert!(out.is_empty());
    }

    #[test]
    fn length_order_and_spacing() {
        // ---
        let mut raw = RawSnapshot::new();
        // Insert out of order; BTreeMap restores ascending key order.
        raw.insert("-k3".into(), raw_record(27.0, 62.0, 90.0, 500, true));
        raw.insert("-k1".into(), raw_record(25.0, 60.0, 50.0, 400, true));
        raw.insert("-k2".into(), raw_record(26.0, 61.0, 70.0, 450, true));

        let now = test_now();
        let out = normalize(&raw, &FixedCadence::from_secs(5), now);

        assert_eq!(out.len(), 3);
        assert_eq!(out[0].key, "-k1");
        assert_eq!(out[1].key, "-k2");
        assert_eq!(out[2].key, "-k3");

        // Evenly spaced, ending at "now" for the most recent record.
        assert_eq!(out[2].timestamp, now);
        assert_eq!(out[1].timestamp, now - Duration::seconds(5));
        assert_eq!(out[0].timestamp, now - Duration::seconds(10));
        assert!(out[0].timestamp < out[1].timestamp && out[1].timestamp < out[2].timestamp);
    }

    #[test]
    fn missing_fields_take_defaults() {
        // ---
        let mut raw = RawSnapshot::new();
        raw.insert("-k1".into(), field_map(&[("temp", json!(21.5))]));

        let out = normalize(&raw, &FixedCadence::from_secs(5), test_now());
        let r = &out[0];
        assert_eq!(r.temperature, 21.5);
        assert_eq!(r.humidity, 0.0);
        assert_eq!(r.pm25, 0.0);
        assert_eq!(r.gas_index, 0);
        assert!(r.device_active, "deviceOn defaults to true when absent");
    }

    #[test]
    fn malformed_field_is_contained() {
        // ---
        let mut raw = RawSnapshot::new();
        for i in 0..10 {
            raw.insert(format!("-k{i}"), raw_record(25.0, 60.0, 40.0, 400, true));
        }
        // One record among ten with a garbage pm25 value.
        raw.insert(
            "-k4".into(),
            field_map(&[("temp", json!(25.0)), ("pm25", json!("not-a-number"))]),
        );

        let out = normalize(&raw, &FixedCadence::from_secs(5), test_now());
        assert_eq!(out.len(), 10, "malformed field must not drop the record");
        let bad = out.iter().find(|r| r.key == "-k4").unwrap();
        assert_eq!(bad.pm25, 0.0, "malformed pm25 resolves to the default");
        assert_eq!(bad.temperature, 25.0, "other fields are unaffected");
    }

    #[test]
    fn numeric_strings_are_accepted() {
        // ---
        let mut raw = RawSnapshot::new();
        raw.insert(
            "-k1".into(),
            field_map(&[("pm25", json!("85.5")), ("mq135", json!("620"))]),
        );

        let out = normalize(&raw, &FixedCadence::from_secs(5), test_now());
        assert_eq!(out[0].pm25, 85.5);
        assert_eq!(out[0].gas_index, 620);
    }

    #[test]
    fn custom_sampling_interval_changes_spacing() {
        // ---
        let mut raw = RawSnapshot::new();
        raw.insert("-a".into(), raw_record(20.0, 50.0, 10.0, 100, true));
        raw.insert("-b".into(), raw_record(20.0, 50.0, 10.0, 100, true));

        let now = test_now();
        let out = normalize(&raw, &FixedCadence::from_secs(30), now);
        assert_eq!(out[1].timestamp - out[0].timestamp, Duration::seconds(30));
    }
}
