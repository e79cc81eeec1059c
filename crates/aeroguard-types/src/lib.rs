//! Platform-agnostic types for AeroGuard air-quality data.
//!
//! This crate provides the data model shared by the history store, the
//! forecasting core and the service layer.
//!
//! # Features
//!
//! - Static location table entries with fixed coordinates
//! - Per-cycle readings and their durable history form
//! - Forecast results and ordered severity categories
//!
//! # Example
//!
//! ```
//! use aeroguard_types::{AqiCategory, HistoryRecord, Reading};
//! use time::macros::datetime;
//!
//! let reading = Reading::new("Colaba", 87, datetime!(2024-11-02 09:00 UTC));
//! let record = HistoryRecord::from(&reading);
//! assert_eq!(record.aqi, 87);
//! assert!(AqiCategory::Good < AqiCategory::Severe);
//! ```

pub mod error;
pub mod types;

pub use error::{ParseError, ParseResult};
pub use types::{
    AQI_MAX, AQI_MIN, AqiCategory, DEFAULT_HORIZON_HOURS, ForecastResult, HistoryRecord, Location,
    Reading,
};
