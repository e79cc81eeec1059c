//! Mock reading source for testing.
//!
//! [`MockSource`] answers by coordinate with a fixed reading or a failure,
//! optionally after a delay, and counts how many fetches it served. Delays use
//! `tokio::time::sleep`, so tests with paused time run instantly.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use aeroguard_types::Location;

use crate::error::{Error, Result};
use crate::source::{ReadingSource, SourceReading};

type CoordKey = (u64, u64);

fn key(latitude: f64, longitude: f64) -> CoordKey {
    (latitude.to_bits(), longitude.to_bits())
}

#[derive(Debug, Clone)]
enum Response {
    Reading(SourceReading),
    Failure(String),
}

#[derive(Debug, Clone)]
struct MockEntry {
    response: Response,
    latency: Duration,
}

impl Default for MockEntry {
    fn default() -> Self {
        Self {
            response: Response::Failure("no mock reading configured".to_string()),
            latency: Duration::ZERO,
        }
    }
}

/// A mock reading source for testing.
#[derive(Debug, Default)]
pub struct MockSource {
    entries: RwLock<HashMap<CoordKey, MockEntry>>,
    call_count: AtomicU32,
}

impl MockSource {
    /// Create an empty mock; every fetch fails until readings are set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start building a mock source.
    pub fn builder() -> MockSourceBuilder {
        MockSourceBuilder::default()
    }

    /// Set the reading returned for a location.
    pub async fn set_reading(&self, location: &Location, reading: SourceReading) {
        let mut entries = self.entries.write().await;
        let entry = entries
            .entry(key(location.latitude, location.longitude))
            .or_default();
        entry.response = Response::Reading(reading);
    }

    /// Make fetches for a location fail with the given message.
    pub async fn set_failure(&self, location: &Location, message: impl Into<String>) {
        let mut entries = self.entries.write().await;
        let entry = entries
            .entry(key(location.latitude, location.longitude))
            .or_default();
        entry.response = Response::Failure(message.into());
    }

    /// Number of fetches served so far, including failed ones.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Reset the call counter.
    pub fn reset_call_count(&self) {
        self.call_count.store(0, Ordering::Relaxed);
    }
}

#[async_trait]
impl ReadingSource for MockSource {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn fetch(&self, latitude: f64, longitude: f64) -> Result<SourceReading> {
        self.call_count.fetch_add(1, Ordering::Relaxed);

        let entry = self
            .entries
            .read()
            .await
            .get(&key(latitude, longitude))
            .cloned()
            .ok_or_else(|| {
                Error::Source(format!("no mock reading for {latitude},{longitude}"))
            })?;

        if !entry.latency.is_zero() {
            tokio::time::sleep(entry.latency).await;
        }

        match entry.response {
            Response::Reading(reading) => Ok(reading),
            Response::Failure(message) => Err(Error::Source(message)),
        }
    }
}

/// Builder for [`MockSource`].
#[derive(Debug, Default)]
pub struct MockSourceBuilder {
    entries: HashMap<CoordKey, MockEntry>,
}

impl MockSourceBuilder {
    fn entry(&mut self, location: &Location) -> &mut MockEntry {
        self.entries
            .entry(key(location.latitude, location.longitude))
            .or_default()
    }

    /// Return `aqi` measured at `timestamp` for a location.
    #[must_use]
    pub fn reading(mut self, location: &Location, aqi: u16, timestamp: OffsetDateTime) -> Self {
        self.entry(location).response = Response::Reading(SourceReading::new(aqi, timestamp));
        self
    }

    /// Return a fully specified reading for a location.
    #[must_use]
    pub fn source_reading(mut self, location: &Location, reading: SourceReading) -> Self {
        self.entry(location).response = Response::Reading(reading);
        self
    }

    /// Fail fetches for a location.
    #[must_use]
    pub fn failure(mut self, location: &Location, message: impl Into<String>) -> Self {
        self.entry(location).response = Response::Failure(message.into());
        self
    }

    /// Delay responses for a location.
    #[must_use]
    pub fn latency(mut self, location: &Location, latency: Duration) -> Self {
        self.entry(location).latency = latency;
        self
    }

    /// Build the mock source.
    pub fn build(self) -> MockSource {
        MockSource {
            entries: RwLock::new(self.entries),
            call_count: AtomicU32::new(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn worli() -> Location {
        Location::new("Worli", 19.0176, 72.8172)
    }

    #[tokio::test]
    async fn test_mock_returns_reading() {
        let source = MockSource::builder()
            .reading(&worli(), 120, datetime!(2024-11-02 10:00 UTC))
            .build();

        let reading = source.fetch(19.0176, 72.8172).await.unwrap();
        assert_eq!(reading.aqi, 120);
        assert_eq!(source.call_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_unknown_coordinate_fails() {
        let source = MockSource::new();
        assert!(matches!(source.fetch(1.0, 2.0).await, Err(Error::Source(_))));
        assert_eq!(source.call_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_failure_and_recovery() {
        let location = worli();
        let source = MockSource::builder()
            .failure(&location, "upstream down")
            .build();
        let err = source.fetch(location.latitude, location.longitude).await.unwrap_err();
        assert!(err.to_string().contains("upstream down"));

        source
            .set_reading(&location, SourceReading::new(80, datetime!(2024-11-02 11:00 UTC)))
            .await;
        let reading = source.fetch(location.latitude, location.longitude).await.unwrap();
        assert_eq!(reading.aqi, 80);

        source.reset_call_count();
        assert_eq!(source.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mock_latency_is_virtual() {
        let location = worli();
        let source = MockSource::builder()
            .reading(&location, 60, datetime!(2024-11-02 10:00 UTC))
            .latency(&location, Duration::from_secs(30))
            .build();

        let start = tokio::time::Instant::now();
        source.fetch(location.latitude, location.longitude).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(30));
    }
}
