//! Short-horizon PM2.5 trend forecasting.
//!
//! The model itself is a black box behind [`TrendModel`]: a time-ordered
//! numeric series goes in, fitted values plus point predictions with
//! upper/lower uncertainty bounds come out at the sampling cadence over the
//! requested horizon. The default implementation is Holt's linear (additive
//! trend) exponential smoothing; swapping in something heavier touches
//! nothing outside this module.
//!
//! Forecasting is best-effort. Below the minimum-sample gate the model is
//! never invoked and the caller gets an explicit insufficient-data signal so
//! the dashboard can show a collection-in-progress message; a model failure on
//! valid-shaped input degrades the same way, it never breaks the rest of the
//! refresh pass.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::errors::ForecastError;
use crate::models::SensorRecord;

// ---

/// Minimum history length before forecasting is attempted.
pub const MIN_FORECAST_SAMPLES: usize = 20;

/// How many of the latest actual values feed the trend-verdict baseline.
const RECENT_WINDOW: usize = 10;

/// Interval z-multiplier for the uncertainty band (~95%).
const BAND_Z: f64 = 1.96;

/// One point of the forecast chart: a prediction with its uncertainty band.
/// Points over the historical fit period carry the in-sample fitted value.
#[derive(Debug, Clone, Serialize)]
pub struct ForecastPoint {
    // ---
    pub timestamp: DateTime<Utc>,
    pub predicted: f64,
    pub lower: f64,
    pub upper: f64,
}

/// Categorical summary of forecast average vs recent average.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrendVerdict {
    StrongRise,
    MildRise,
    Stable,
    MildFall,
    StrongFall,
}

impl TrendVerdict {
    /// Classify the difference between forecast-window and recent-window
    /// averages. Units are µg/m³ of PM2.5.
    pub fn from_diff(diff: f64) -> Self {
        // ---
        if diff > 5.0 {
            TrendVerdict::StrongRise
        } else if diff >= 2.0 {
            TrendVerdict::MildRise
        } else if diff < -5.0 {
            TrendVerdict::StrongFall
        } else if diff <= -2.0 {
            TrendVerdict::MildFall
        } else {
            TrendVerdict::Stable
        }
    }

    /// One-line verdict message for the forecast panel.
    pub fn message(&self) -> &'static str {
        match self {
            TrendVerdict::StrongRise => "PM2.5 rising sharply over the forecast window",
            TrendVerdict::MildRise => "PM2.5 drifting upward over the forecast window",
            TrendVerdict::Stable => "PM2.5 expected to hold steady",
            TrendVerdict::MildFall => "PM2.5 drifting downward over the forecast window",
            TrendVerdict::StrongFall => "PM2.5 falling sharply over the forecast window",
        }
    }
}

/// Forecast chart payload: fit-period points, horizon points, and the verdict.
#[derive(Debug, Clone, Serialize)]
pub struct ForecastResult {
    // ---
    /// Fit period followed by the future horizon, time-ascending.
    pub points: Vec<ForecastPoint>,
    /// Index into `points` where the future horizon begins.
    pub horizon_start: usize,
    pub trend_verdict: TrendVerdict,
}

// ---

/// Raw model output, index-aligned with the input series and the horizon.
#[derive(Debug, Clone)]
pub struct ModelOutput {
    /// In-sample fitted value for each input observation.
    pub fitted: Vec<f64>,
    /// Point prediction for each of the requested future steps.
    pub predicted: Vec<f64>,
    /// Lower uncertainty bound per future step.
    pub lower: Vec<f64>,
    /// Upper uncertainty bound per future step.
    pub upper: Vec<f64>,
}

/// Narrow seam around the forecasting algorithm. Implementations receive a
/// time-ordered series (already gated for length) and must either produce
/// `steps` predictions with bounds or report a compute failure.
pub trait TrendModel: Send + Sync {
    fn project(&self, series: &[f64], steps: usize) -> Result<ModelOutput, ForecastError>;
}

/// Holt's linear exponential smoothing: additive level + trend decomposition.
///
/// Uncertainty bounds widen with the horizon from the in-sample one-step
/// residual spread.
pub struct HoltLinear {
    /// Level smoothing factor, 0 < alpha < 1.
    pub alpha: f64,
    /// Trend smoothing factor, 0 < beta < 1.
    pub beta: f64,
}

impl Default for HoltLinear {
    fn default() -> Self {
        Self {
            alpha: 0.5,
            beta: 0.3,
        }
    }
}

impl TrendModel for HoltLinear {
    fn project(&self, series: &[f64], steps: usize) -> Result<ModelOutput, ForecastError> {
        // ---
        if series.len() < 2 {
            return Err(ForecastError::Compute(
                "series too short to fit a trend".to_string(),
            ));
        }
        if steps == 0 {
            return Err(ForecastError::Compute("empty forecast horizon".to_string()));
        }
        if series.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::Compute(
                "non-finite value in series".to_string(),
            ));
        }

        let mut level = series[0];
        let mut trend = series[1] - series[0];

        let mut fitted = Vec::with_capacity(series.len());
        let mut sq_residuals = 0.0;

        for &y in series {
            // One-step-ahead fit from the previous state, then update.
            let fit = level + trend;
            fitted.push(fit);
            sq_residuals += (y - fit) * (y - fit);

            let prev_level = level;
            level = self.alpha * y + (1.0 - self.alpha) * (level + trend);
            trend = self.beta * (level - prev_level) + (1.0 - self.beta) * trend;
        }

        if !level.is_finite() || !trend.is_finite() {
            return Err(ForecastError::Compute(
                "smoothing state diverged".to_string(),
            ));
        }

        let sigma = (sq_residuals / series.len() as f64).sqrt();

        let mut predicted = Vec::with_capacity(steps);
        let mut lower = Vec::with_capacity(steps);
        let mut upper = Vec::with_capacity(steps);
        for h in 1..=steps {
            let point = level + trend * h as f64;
            let spread = BAND_Z * sigma * (h as f64).sqrt();
            predicted.push(point);
            lower.push(point - spread);
            upper.push(point + spread);
        }

        Ok(ModelOutput {
            fitted,
            predicted,
            lower,
            upper,
        })
    }
}

// ---

/// Run the forecast over a normalized series.
///
/// Gate: fewer than [`MIN_FORECAST_SAMPLES`] records returns
/// [`ForecastError::InsufficientData`] without invoking the model. Future
/// points continue at the sampling cadence from the last observation.
pub fn run_forecast(
    series: &[SensorRecord],
    model: &dyn TrendModel,
    horizon_minutes: u32,
    sampling_interval_secs: u32,
) -> Result<ForecastResult, ForecastError> {
    // ---
    if series.len() < MIN_FORECAST_SAMPLES {
        return Err(ForecastError::InsufficientData {
            have: series.len(),
            need: MIN_FORECAST_SAMPLES,
        });
    }

    let values: Vec<f64> = series.iter().map(|r| r.pm25).collect();
    let steps = (u64::from(horizon_minutes) * 60 / u64::from(sampling_interval_secs.max(1)))
        .max(1) as usize;

    let output = model.project(&values, steps)?;

    let interval = Duration::seconds(i64::from(sampling_interval_secs));
    let last_ts = series[series.len() - 1].timestamp;

    let mut points = Vec::with_capacity(series.len() + steps);
    for (record, fit) in series.iter().zip(&output.fitted) {
        points.push(ForecastPoint {
            timestamp: record.timestamp,
            predicted: *fit,
            lower: *fit,
            upper: *fit,
        });
    }
    let horizon_start = points.len();
    for h in 0..steps {
        points.push(ForecastPoint {
            timestamp: last_ts + interval * (h as i32 + 1),
            predicted: output.predicted[h],
            lower: output.lower[h],
            upper: output.upper[h],
        });
    }

    let recent_avg = mean(&values[values.len().saturating_sub(RECENT_WINDOW)..]);
    let forecast_avg = mean(&output.predicted);
    let trend_verdict = TrendVerdict::from_diff(forecast_avg - recent_avg);

    Ok(ForecastResult {
        points,
        horizon_start,
        trend_verdict,
    })
}

fn mean(values: &[f64]) -> f64 {
    // ---
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::{TimeZone, Utc};

    fn series_from(values: &[f64]) -> Vec<SensorRecord> {
        // ---
        let start = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, &pm25)| SensorRecord {
                key: format!("-k{i:04}"),
                timestamp: start + Duration::seconds(5 * i as i64),
                temperature: 25.0,
                humidity: 60.0,
                pm25,
                gas_index: 400,
                device_active: true,
            })
            .collect()
    }

    #[test]
    fn gate_rejects_short_series_without_computing() {
        // ---
        let series = series_from(&[50.0; 19]);
        let err = run_forecast(&series, &HoltLinear::default(), 10, 5).unwrap_err();
        assert_eq!(
            err,
            ForecastError::InsufficientData { have: 19, need: 20 }
        );
    }

    #[test]
    fn verdict_classification_vectors() {
        // ---
        // recent_avg = 100 against forecast averages 106 / 102 / 100.5 / 97 / 94.
        assert_eq!(TrendVerdict::from_diff(106.0 - 100.0), TrendVerdict::StrongRise);
        assert_eq!(TrendVerdict::from_diff(102.0 - 100.0), TrendVerdict::MildRise);
        assert_eq!(TrendVerdict::from_diff(100.5 - 100.0), TrendVerdict::Stable);
        assert_eq!(TrendVerdict::from_diff(97.0 - 100.0), TrendVerdict::MildFall);
        assert_eq!(TrendVerdict::from_diff(94.0 - 100.0), TrendVerdict::StrongFall);
    }

    #[test]
    fn verdict_strong_boundaries() {
        // ---
        assert_eq!(TrendVerdict::from_diff(5.0), TrendVerdict::MildRise);
        assert_eq!(TrendVerdict::from_diff(5.1), TrendVerdict::StrongRise);
        assert_eq!(TrendVerdict::from_diff(-5.0), TrendVerdict::MildFall);
        assert_eq!(TrendVerdict::from_diff(-5.1), TrendVerdict::StrongFall);
    }

    #[test]
    fn rising_series_forecasts_a_rise() {
        // ---
        // Steady climb of 2 µg/m³ per sample.
        let values: Vec<f64> = (0..30).map(|i| 40.0 + 2.0 * i as f64).collect();
        let series = series_from(&values);

        let result = run_forecast(&series, &HoltLinear::default(), 10, 5).unwrap();

        assert!(matches!(
            result.trend_verdict,
            TrendVerdict::MildRise | TrendVerdict::StrongRise
        ));

        // Fit period covers the history, horizon extends past it at the
        // sampling cadence.
        assert_eq!(result.horizon_start, 30);
        assert_eq!(result.points.len(), 30 + 120);
        let first_future = &result.points[result.horizon_start];
        assert_eq!(
            first_future.timestamp,
            series.last().unwrap().timestamp + Duration::seconds(5)
        );
        assert!(first_future.lower <= first_future.predicted);
        assert!(first_future.predicted <= first_future.upper);
    }

    #[test]
    fn flat_series_is_stable() {
        // ---
        let series = series_from(&[60.0; 40]);
        let result = run_forecast(&series, &HoltLinear::default(), 10, 5).unwrap();
        assert_eq!(result.trend_verdict, TrendVerdict::Stable);
    }

    #[test]
    fn band_widens_with_horizon() {
        // ---
        // Noisy-ish alternating series so the residual spread is nonzero.
        let values: Vec<f64> = (0..40)
            .map(|i| if i % 2 == 0 { 58.0 } else { 62.0 })
            .collect();
        let result =
            run_forecast(&series_from(&values), &HoltLinear::default(), 10, 5).unwrap();

        let near = &result.points[result.horizon_start];
        let far = result.points.last().unwrap();
        assert!(
            (far.upper - far.lower) > (near.upper - near.lower),
            "uncertainty band must widen with the horizon"
        );
    }

    #[test]
    fn degenerate_input_is_a_compute_error() {
        // ---
        let mut values = vec![50.0; 25];
        values[10] = f64::NAN;
        let err =
            run_forecast(&series_from(&values), &HoltLinear::default(), 10, 5).unwrap_err();
        assert!(matches!(err, ForecastError::Compute(_)));
    }
}
