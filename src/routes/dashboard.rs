//! The dashboard refresh endpoint: one request runs the full pipeline.
//!
//! `GET /api/dashboard` executes Fetch -> Normalize -> Evaluate/Forecast as a
//! single sequential pass and returns every presentation payload the front end
//! renders: current metrics with alert badges, the history chart series, the
//! forecast chart with its trend verdict, and the raw-data table.
//!
//! Failure containment follows the pipeline's taxonomy: only a fetch failure
//! aborts the pass (HTTP 502). Forecasting problems degrade to an on-screen
//! message while the rest of the payload still renders, and every degraded
//! path leaves a human-readable message in the response; nothing is silently
//! swallowed.

use std::time::Duration;

use axum::{
    extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::alerts::{evaluate, AlertState};
use crate::errors::{FetchError, ForecastError};
use crate::forecast::{run_forecast, ForecastResult, HoltLinear};
use crate::models::{RawSnapshot, SensorRecord};
use crate::normalizer::{normalize, FixedCadence};
use crate::routes::AppState;
use crate::Config;

// ---

/// How long to wait before the one automatic retry on an empty snapshot.
const EMPTY_RETRY_DELAY: Duration = Duration::from_secs(2);

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/api/dashboard", get(handler))
}

async fn handler(State((cache, config)): State<AppState>) -> impl IntoResponse {
    // ---
    info!("GET /api/dashboard - starting refresh pass");

    // Holding the cache lock for the whole fetch phase serializes refresh
    // passes: a second request waits here instead of racing the first.
    let mut cache = cache.lock().await;

    // Step 1: Fetch (possibly cached) snapshot
    debug!("GET /api/dashboard - Step 1: fetch");

    let mut raw = match cache.get_or_fetch().await {
        Ok(raw) => raw,
        Err(e) => {
            error!("failed to fetch snapshot: {e}");
            return fetch_failure_response(&e);
        }
    };

    // Step 2: Empty store gets one automatic retry after a short delay; the
    // device may simply not have pushed its first record yet.
    if raw.is_empty() {
        debug!(
            "GET /api/dashboard - empty snapshot, retrying in {:?}",
            EMPTY_RETRY_DELAY
        );
        tokio::time::sleep(EMPTY_RETRY_DELAY).await;
        cache.invalidate();
        raw = match cache.get_or_fetch().await {
            Ok(raw) => raw,
            Err(e) => {
                error!("failed to fetch snapshot on retry: {e}");
                return fetch_failure_response(&e);
            }
        };
    }
    drop(cache);

    // Step 3: Normalize, evaluate, forecast, assemble
    debug!("GET /api/dashboard - Step 3: pipeline");

    let response = build_dashboard(&raw, &config, Utc::now());
    info!(
        "refresh pass complete: {} records, forecast {}",
        response.table.len(),
        if response.forecast.is_some() {
            "ready"
        } else {
            "unavailable"
        }
    );
    (StatusCode::OK, Json(response)).into_response()
}

fn fetch_failure_response(error: &FetchError) -> axum::response::Response {
    // ---
    let body = DashboardResponse {
        messages: vec![StatusMessage {
            severity: Severity::Error,
            text: format!("Could not reach the sensor store: {error}"),
        }],
        ..DashboardResponse::empty(Utc::now())
    };
    (StatusCode::BAD_GATEWAY, Json(body)).into_response()
}

// ---

/// Severity of an on-screen message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// One human-readable message for the dashboard's notice area.
#[derive(Debug, Clone, Serialize)]
pub struct StatusMessage {
    pub severity: Severity,
    pub text: String,
}

/// The four current metrics plus their alert badges.
#[derive(Debug, Clone, Serialize)]
pub struct CurrentStatus {
    // ---
    pub temperature_c: f64,
    pub humidity_pct: f64,
    pub pm25_ugm3: f64,
    pub gas_index: i64,
    pub alerts: AlertState,
}

/// One point of the history chart, all four signals at one timestamp.
#[derive(Debug, Clone, Serialize)]
pub struct SeriesPoint {
    pub timestamp: DateTime<Utc>,
    pub temperature: f64,
    pub humidity: f64,
    pub pm25: f64,
    pub gas_index: i64,
}

/// One row of the raw-data table, most recent first.
#[derive(Debug, Clone, Serialize)]
pub struct TableRow {
    /// Time of day, `HH:MM:SS`.
    pub time: String,
    pub temperature: f64,
    pub humidity: f64,
    pub pm25: f64,
    pub gas_index: i64,
    pub device_status: &'static str,
}

/// Everything one refresh pass hands the presentation layer.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardResponse {
    // ---
    pub generated_at: DateTime<Utc>,
    /// Latest reading's metrics and badges; absent only when the store is empty.
    pub current: Option<CurrentStatus>,
    pub series: Vec<SeriesPoint>,
    /// Signals sharing a y-axis on the history chart.
    pub axis_groups: [&'static [&'static str]; 3],
    /// Forecast chart payload; absent while data collection is in progress or
    /// when the model failed (see `messages`).
    pub forecast: Option<ForecastResult>,
    pub table: Vec<TableRow>,
    pub messages: Vec<StatusMessage>,
}

/// {temp, hum} share an axis; pm25 and the gas index each get their own scale.
const AXIS_GROUPS: [&[&str]; 3] = [&["temperature", "humidity"], &["pm25"], &["gas_index"]];

impl DashboardResponse {
    fn empty(generated_at: DateTime<Utc>) -> Self {
        // ---
        Self {
            generated_at,
            current: None,
            series: Vec::new(),
            axis_groups: AXIS_GROUPS,
            forecast: None,
            table: Vec::new(),
            messages: Vec::new(),
        }
    }
}

/// Assemble the full dashboard payload from a raw snapshot.
///
/// Pure apart from logging, so tests drive it directly with a fixed clock.
pub fn build_dashboard(raw: &RawSnapshot, config: &Config, now: DateTime<Utc>) -> DashboardResponse {
    // ---
    let mut response = DashboardResponse::empty(now);

    if raw.is_empty() {
        response.messages.push(StatusMessage {
            severity: Severity::Info,
            text: "No readings in the store yet - waiting for the device to push data".to_string(),
        });
        return response;
    }

    let strategy = FixedCadence::from_secs(config.sampling_interval_secs);
    let records = normalize(raw, &strategy, now);

    // Non-empty raw input guarantees a latest record.
    if let Some(latest) = records.last() {
        response.current = Some(CurrentStatus {
            temperature_c: latest.temperature,
            humidity_pct: latest.humidity,
            pm25_ugm3: latest.pm25,
            gas_index: latest.gas_index,
            alerts: evaluate(latest),
        });
    }

    response.series = records.iter().map(series_point).collect();
    response.table = records.iter().rev().map(table_row).collect();

    match run_forecast(
        &records,
        &HoltLinear::default(),
        config.forecast_horizon_minutes,
        config.sampling_interval_secs,
    ) {
        Ok(forecast) => {
            response.messages.push(StatusMessage {
                severity: Severity::Info,
                text: forecast.trend_verdict.message().to_string(),
            });
            response.forecast = Some(forecast);
        }
        Err(ForecastError::InsufficientData { have, need }) => {
            debug!("forecast skipped: {have} of {need} records collected");
            response.messages.push(StatusMessage {
                severity: Severity::Info,
                text: format!(
                    "Collecting data for the PM2.5 forecast: {have} of {need} readings"
                ),
            });
        }
        Err(e @ ForecastError::Compute(_)) => {
            warn!("forecast failed: {e}");
            response.messages.push(StatusMessage {
                severity: Severity::Warning,
                text: "PM2.5 forecast unavailable this cycle; showing readings only".to_string(),
            });
        }
    }

    response
}

fn series_point(record: &SensorRecord) -> SeriesPoint {
    // ---
    SeriesPoint {
        timestamp: record.timestamp,
        temperature: record.temperature,
        humidity: record.humidity,
        pm25: record.pm25,
        gas_index: record.gas_index,
    }
}

fn table_row(record: &SensorRecord) -> TableRow {
    // ---
    TableRow {
        time: record.timestamp.format("%H:%M:%S").to_string(),
        temperature: record.temperature,
        humidity: record.humidity,
        pm25: record.pm25,
        gas_index: record.gas_index,
        device_status: record.device_label(),
    }
}
