//! Core types for AeroGuard air-quality data.

use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::ParseError;

/// Lowest value of the AQI domain.
pub const AQI_MIN: u16 = 0;

/// Highest value of the AQI domain. Forecasts are clamped to `AQI_MIN..=AQI_MAX`.
pub const AQI_MAX: u16 = 500;

/// Default forecast horizon in hours.
pub const DEFAULT_HORIZON_HOURS: u32 = 6;

/// A monitored location with a fixed geographic coordinate.
///
/// The location table is configured once at startup and never changes
/// for the lifetime of the process.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Location {
    /// Unique location name, used as the history key.
    pub name: String,
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
}

impl Location {
    /// Create a new location.
    pub fn new(name: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            name: name.into(),
            latitude,
            longitude,
        }
    }
}

/// A single AQI observation for one location, produced once per ingestion cycle.
///
/// Readings are immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Reading {
    /// Name of the location this reading belongs to.
    pub location: String,
    /// AQI value reported by the source.
    pub aqi: u16,
    /// When the source says the value was measured.
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339"))]
    pub timestamp: OffsetDateTime,
    /// Monitoring station that produced the value, if the source reports one.
    #[cfg_attr(feature = "serde", serde(default))]
    pub station: Option<String>,
}

impl Reading {
    /// Create a reading without a station label.
    pub fn new(location: impl Into<String>, aqi: u16, timestamp: OffsetDateTime) -> Self {
        Self {
            location: location.into(),
            aqi,
            timestamp,
            station: None,
        }
    }

    /// Attach a station label.
    #[must_use]
    pub fn with_station(mut self, station: impl Into<String>) -> Self {
        self.station = Some(station.into());
        self
    }
}

/// The durable form of a [`Reading`], persisted by the history store.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HistoryRecord {
    /// Location name.
    pub location: String,
    /// AQI value.
    pub aqi: u16,
    /// Measurement time.
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339"))]
    pub timestamp: OffsetDateTime,
}

impl HistoryRecord {
    /// Create a new history record.
    pub fn new(location: impl Into<String>, aqi: u16, timestamp: OffsetDateTime) -> Self {
        Self {
            location: location.into(),
            aqi,
            timestamp,
        }
    }
}

impl From<&Reading> for HistoryRecord {
    fn from(reading: &Reading) -> Self {
        Self {
            location: reading.location.clone(),
            aqi: reading.aqi,
            timestamp: reading.timestamp,
        }
    }
}

/// A short-horizon forecast for one location. Derived every cycle, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ForecastResult {
    /// Location name.
    pub location: String,
    /// Forecast AQI value, always within `AQI_MIN..=AQI_MAX`.
    pub aqi: u16,
    /// How far ahead the forecast looks, in hours.
    pub horizon_hours: u32,
}

/// Ordered severity category for an air-quality value.
///
/// Variants are declared from least to most severe, so the derived
/// ordering matches severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum AqiCategory {
    /// Minimal impact.
    Good,
    /// Minor breathing discomfort for sensitive people.
    Satisfactory,
    /// Discomfort for people with lung or heart disease, children and older adults.
    Moderate,
    /// Discomfort for most people on prolonged exposure.
    Poor,
    /// Respiratory illness on prolonged exposure.
    VeryPoor,
    /// Affects healthy people, serious impact on those with existing disease.
    Severe,
}

impl AqiCategory {
    /// All categories in ascending order of severity.
    pub const ALL: [AqiCategory; 6] = [
        AqiCategory::Good,
        AqiCategory::Satisfactory,
        AqiCategory::Moderate,
        AqiCategory::Poor,
        AqiCategory::VeryPoor,
        AqiCategory::Severe,
    ];

    /// Human-readable label.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            AqiCategory::Good => "Good",
            AqiCategory::Satisfactory => "Satisfactory",
            AqiCategory::Moderate => "Moderate",
            AqiCategory::Poor => "Poor",
            AqiCategory::VeryPoor => "Very Poor",
            AqiCategory::Severe => "Severe",
        }
    }

    /// Short description of the expected health impact.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            AqiCategory::Good => "Minimal impact",
            AqiCategory::Satisfactory => "Minor discomfort for sensitive people",
            AqiCategory::Moderate => "Discomfort for people with asthma or heart disease",
            AqiCategory::Poor => "Discomfort for most people on prolonged exposure",
            AqiCategory::VeryPoor => "Respiratory illness on prolonged exposure",
            AqiCategory::Severe => "Serious health risk, even for healthy people",
        }
    }
}

impl fmt::Display for AqiCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for AqiCategory {
    type Err = ParseError;

    /// Parse a category from its label or snake_case name, ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "good" => Ok(AqiCategory::Good),
            "satisfactory" => Ok(AqiCategory::Satisfactory),
            "moderate" => Ok(AqiCategory::Moderate),
            "poor" => Ok(AqiCategory::Poor),
            "very_poor" | "verypoor" => Ok(AqiCategory::VeryPoor),
            "severe" => Ok(AqiCategory::Severe),
            _ => Err(ParseError::UnknownCategory(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_history_record_from_reading_drops_station() {
        let reading =
            Reading::new("Bandra", 142, datetime!(2024-11-02 10:00 UTC)).with_station("Bandra East");
        let record = HistoryRecord::from(&reading);

        assert_eq!(record.location, "Bandra");
        assert_eq!(record.aqi, 142);
        assert_eq!(record.timestamp, reading.timestamp);
    }

    #[test]
    fn test_category_ordering() {
        for pair in AqiCategory::ALL.windows(2) {
            assert!(pair[0] < pair[1], "{:?} should be below {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_category_labels() {
        assert_eq!(AqiCategory::VeryPoor.to_string(), "Very Poor");
        assert_eq!(AqiCategory::Good.label(), "Good");
        assert!(AqiCategory::Severe.description().contains("healthy"));
    }

    #[test]
    fn test_category_from_str() {
        assert_eq!("Very Poor".parse::<AqiCategory>().unwrap(), AqiCategory::VeryPoor);
        assert_eq!("very_poor".parse::<AqiCategory>().unwrap(), AqiCategory::VeryPoor);
        assert_eq!("GOOD".parse::<AqiCategory>().unwrap(), AqiCategory::Good);
        assert!("hazardous".parse::<AqiCategory>().is_err());
    }

    #[test]
    fn test_category_label_roundtrip_for_all() {
        for category in AqiCategory::ALL {
            assert_eq!(category.label().parse::<AqiCategory>().unwrap(), category);
        }
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_reading_serializes_rfc3339() {
        let reading = Reading::new("Kurla", 210, datetime!(2024-11-02 10:30 UTC));
        let json = serde_json::to_string(&reading).unwrap();
        assert!(json.contains("2024-11-02T10:30:00Z"));
        assert!(json.contains("\"station\":null"));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_category_serde_snake_case() {
        let json = serde_json::to_string(&AqiCategory::VeryPoor).unwrap();
        assert_eq!(json, "\"very_poor\"");
    }
}
