//! Short-horizon AQI forecasting.
//!
//! Two interchangeable estimators are available, selected by configuration:
//!
//! - [`Estimator::TrendDelta`]: average change across the last few records,
//!   extrapolated a fixed number of record-steps ahead. Needs 4 records.
//! - [`Estimator::Regression`]: ordinary least squares of AQI against elapsed
//!   hours, evaluated `horizon` hours past the newest sample. Needs 5 records.
//!
//! Both are pure functions of the current AQI and an oldest-first window of
//! history. With too little history, or a degenerate window, the forecast is
//! the current AQI unchanged. Results are always clamped to
//! [`AQI_MIN`]`..=`[`AQI_MAX`].
//!
//! # Example
//!
//! ```
//! use aeroguard_core::forecast::trend_delta;
//! use aeroguard_types::HistoryRecord;
//! use time::{Duration, macros::datetime};
//!
//! let t = datetime!(2024-11-02 12:00 UTC);
//! let window: Vec<HistoryRecord> = [40, 60, 80, 100]
//!     .iter()
//!     .enumerate()
//!     .map(|(i, &aqi)| HistoryRecord::new("A", aqi, t + Duration::hours(i as i64)))
//!     .collect();
//!
//! // 100 + ((100 - 40) / 4) * 6
//! assert_eq!(trend_delta(100, &window, 6), 190);
//! ```

use serde::{Deserialize, Serialize};

use aeroguard_types::{AQI_MAX, AQI_MIN, ForecastResult, HistoryRecord, Reading};

/// Minimum records before the trend-delta estimator extrapolates.
pub const TREND_MIN_RECORDS: usize = 4;
/// Most records the trend-delta estimator looks at.
pub const TREND_WINDOW: usize = 6;
/// Minimum records before the regression estimator extrapolates.
pub const REGRESSION_MIN_RECORDS: usize = 5;
/// Most records the regression estimator looks at.
pub const REGRESSION_WINDOW: usize = 12;

/// Forecasting algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Estimator {
    /// Linear trend over record count.
    #[default]
    TrendDelta,
    /// Least-squares fit over elapsed time.
    Regression,
}

impl Estimator {
    /// Number of records below which the forecast equals the current AQI.
    pub fn min_records(&self) -> usize {
        match self {
            Estimator::TrendDelta => TREND_MIN_RECORDS,
            Estimator::Regression => REGRESSION_MIN_RECORDS,
        }
    }

    /// Number of most recent records the estimator consumes.
    pub fn window_size(&self) -> usize {
        match self {
            Estimator::TrendDelta => TREND_WINDOW,
            Estimator::Regression => REGRESSION_WINDOW,
        }
    }

    /// Estimate the AQI `horizon` ahead.
    ///
    /// For the trend-delta estimator the horizon is a count of record-steps,
    /// for regression it is hours.
    pub fn estimate(&self, current: u16, window: &[HistoryRecord], horizon: u32) -> u16 {
        match self {
            Estimator::TrendDelta => trend_delta(current, window, horizon),
            Estimator::Regression => regression(current, window, horizon),
        }
    }
}

impl std::fmt::Display for Estimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Estimator::TrendDelta => f.write_str("trend-delta"),
            Estimator::Regression => f.write_str("regression"),
        }
    }
}

/// Forecast engine bound to one estimator and horizon.
#[derive(Debug, Clone, Copy)]
pub struct ForecastEngine {
    estimator: Estimator,
    horizon_hours: u32,
}

impl ForecastEngine {
    /// Create a new engine.
    pub fn new(estimator: Estimator, horizon_hours: u32) -> Self {
        Self {
            estimator,
            horizon_hours,
        }
    }

    /// The configured estimator.
    pub fn estimator(&self) -> Estimator {
        self.estimator
    }

    /// The configured horizon in hours.
    pub fn horizon_hours(&self) -> u32 {
        self.horizon_hours
    }

    /// How many recent records to read back from the history store.
    pub fn window_size(&self) -> usize {
        self.estimator.window_size()
    }

    /// Forecast the AQI for the reading's location.
    ///
    /// `window` must be ordered oldest first and should already contain
    /// `reading` itself.
    pub fn forecast(&self, reading: &Reading, window: &[HistoryRecord]) -> ForecastResult {
        ForecastResult {
            location: reading.location.clone(),
            aqi: self
                .estimator
                .estimate(reading.aqi, window, self.horizon_hours),
            horizon_hours: self.horizon_hours,
        }
    }
}

/// Trend-delta estimate.
///
/// Takes up to the last [`TREND_WINDOW`] records and computes
/// `delta = (last - first) / count`, then returns `current + delta * steps`.
/// `steps` counts records, not hours.
pub fn trend_delta(current: u16, window: &[HistoryRecord], steps: u32) -> u16 {
    if window.len() < TREND_MIN_RECORDS {
        return current;
    }

    let recent = &window[window.len().saturating_sub(TREND_WINDOW)..];
    let (Some(first), Some(last)) = (recent.first(), recent.last()) else {
        return current;
    };

    let delta = (f64::from(last.aqi) - f64::from(first.aqi)) / recent.len() as f64;
    let forecast = f64::from(current) + delta * f64::from(steps);

    clamp_aqi(forecast).unwrap_or(current)
}

/// Regression estimate.
///
/// Takes up to the last [`REGRESSION_WINDOW`] records, expresses each
/// timestamp as hours relative to the newest one (newest is 0, older are
/// negative), fits AQI against those hours by ordinary least squares and
/// evaluates the line at `+horizon_hours`.
///
/// Returns `current` when every relative time is identical, since the slope
/// is then undefined.
pub fn regression(current: u16, window: &[HistoryRecord], horizon_hours: u32) -> u16 {
    if window.len() < REGRESSION_MIN_RECORDS {
        return current;
    }

    let recent = &window[window.len().saturating_sub(REGRESSION_WINDOW)..];
    let Some(newest) = recent.iter().map(|r| r.timestamp).max() else {
        return current;
    };

    let points: Vec<(f64, f64)> = recent
        .iter()
        .map(|r| {
            let hours = (r.timestamp - newest).as_seconds_f64() / 3600.0;
            (hours, f64::from(r.aqi))
        })
        .collect();

    let n = points.len() as f64;
    let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / n;

    let sxx: f64 = points.iter().map(|(x, _)| (x - mean_x).powi(2)).sum();
    if sxx <= f64::EPSILON {
        return current;
    }
    let sxy: f64 = points
        .iter()
        .map(|(x, y)| (x - mean_x) * (y - mean_y))
        .sum();

    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;
    let forecast = intercept + slope * f64::from(horizon_hours);

    clamp_aqi(forecast).unwrap_or(current)
}

/// Clamp to the AQI domain and round to the nearest integer.
///
/// Returns `None` for NaN or infinite input.
fn clamp_aqi(value: f64) -> Option<u16> {
    if !value.is_finite() {
        return None;
    }
    let clamped = value.clamp(f64::from(AQI_MIN), f64::from(AQI_MAX));
    Some(clamped.round() as u16)
}
