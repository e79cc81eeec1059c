//! The reading source boundary.
//!
//! The pipeline only needs one capability from an AQI provider: given a
//! coordinate, return the latest value, when it was measured and, optionally,
//! which station measured it. Providers live behind the [`ReadingSource`]
//! trait so the ingestor works the same with real HTTP APIs and with
//! [`MockSource`](crate::MockSource) in tests.

use async_trait::async_trait;
use time::OffsetDateTime;

use aeroguard_types::Reading;

use crate::error::Result;

/// What a provider returns for one coordinate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceReading {
    /// Reported value.
    pub aqi: u16,
    /// Measurement time reported by the provider.
    pub timestamp: OffsetDateTime,
    /// Station label, if the provider reports one.
    pub station: Option<String>,
}

impl SourceReading {
    /// Create a new source reading without a station label.
    pub fn new(aqi: u16, timestamp: OffsetDateTime) -> Self {
        Self {
            aqi,
            timestamp,
            station: None,
        }
    }

    /// Bind this value to a location, producing an immutable [`Reading`].
    pub fn into_reading(self, location: &str) -> Reading {
        Reading {
            location: location.to_string(),
            aqi: self.aqi,
            timestamp: self.timestamp,
            station: self.station,
        }
    }
}

/// A provider of current AQI values.
///
/// Implementations may fail or hang; the ingestor applies the per-call
/// timeout and treats every failure mode the same way.
#[async_trait]
pub trait ReadingSource: Send + Sync {
    /// Short provider name for logs and errors.
    fn name(&self) -> &'static str;

    /// Fetch the latest value for a coordinate.
    async fn fetch(&self, latitude: f64, longitude: f64) -> Result<SourceReading>;
}
