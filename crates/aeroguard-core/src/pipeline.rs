//! One ingestion cycle end to end: fetch, record, categorize and forecast.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::warn;

use aeroguard_types::{AqiCategory, ForecastResult, Location, Reading};

use crate::forecast::ForecastEngine;
use crate::ingest::{FetchOutcome, Ingestor, SharedStore};
use crate::thresholds::Thresholds;

/// Pipeline output for one location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    /// The current reading.
    pub reading: Reading,
    /// Category of the current reading.
    pub category: AqiCategory,
    /// Forecast for the configured horizon.
    pub forecast: ForecastResult,
    /// Category of the forecast value.
    pub forecast_category: AqiCategory,
}

/// The complete pipeline output for one cycle.
///
/// Entries follow the configured location order. Locations whose fetch
/// failed are left out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// When the snapshot was assembled.
    #[serde(with = "time::serde::rfc3339")]
    pub generated_at: OffsetDateTime,
    /// Per-location results.
    pub entries: Vec<SnapshotEntry>,
}

impl Snapshot {
    /// Number of locations present.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no location produced a reading.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The entry for a location, by name.
    pub fn get(&self, location: &str) -> Option<&SnapshotEntry> {
        self.entries.iter().find(|e| e.reading.location == location)
    }
}

/// A location that produced no reading this cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationFailure {
    /// Location name.
    pub location: String,
    /// Rendered error.
    pub error: String,
}

/// Everything a cycle produced.
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// The new snapshot.
    pub snapshot: Snapshot,
    /// Locations that were absent, in configured order.
    pub failures: Vec<LocationFailure>,
    /// How many entries were served from cache.
    pub cached: usize,
}

/// The ingest-record-forecast pipeline over a fixed location set.
#[derive(Debug)]
pub struct Pipeline {
    locations: Vec<Location>,
    ingestor: Ingestor,
    engine: ForecastEngine,
    thresholds: Thresholds,
    cycle_lock: Mutex<()>,
}

impl Pipeline {
    /// Create a pipeline.
    pub fn new(
        locations: Vec<Location>,
        ingestor: Ingestor,
        engine: ForecastEngine,
        thresholds: Thresholds,
    ) -> Self {
        Self {
            locations,
            ingestor,
            engine,
            thresholds,
            cycle_lock: Mutex::new(()),
        }
    }

    /// The configured locations.
    pub fn locations(&self) -> &[Location] {
        &self.locations
    }

    /// The shared history store.
    pub fn store(&self) -> &SharedStore {
        self.ingestor.store()
    }

    /// The forecast engine.
    pub fn engine(&self) -> &ForecastEngine {
        &self.engine
    }

    /// The categorizer.
    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Run one cycle and assemble a fresh snapshot.
    ///
    /// Concurrent callers are serialized, so appends from different cycles
    /// never interleave. Each forecast reads history after the location's
    /// new reading has been appended.
    pub async fn run_cycle(&self) -> CycleReport {
        let _guard = self.cycle_lock.lock().await;

        let outcomes = self.ingestor.run_cycle(&self.locations).await;

        let mut entries = Vec::with_capacity(outcomes.len());
        let mut failures = Vec::new();
        let mut cached = 0;

        let store = self.store().lock().await;
        for outcome in outcomes {
            let reading = match outcome.outcome {
                FetchOutcome::Fetched(reading) => reading,
                FetchOutcome::Cached(reading) => {
                    cached += 1;
                    reading
                }
                FetchOutcome::Failed(e) => {
                    failures.push(LocationFailure {
                        location: outcome.location.name,
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            let window = store
                .recent_window(&reading.location, self.engine.window_size())
                .unwrap_or_else(|e| {
                    warn!("Failed to read history for {}: {}", reading.location, e);
                    Vec::new()
                });

            let forecast = self.engine.forecast(&reading, &window);
            entries.push(SnapshotEntry {
                category: self.thresholds.evaluate_aqi(reading.aqi),
                forecast_category: self.thresholds.evaluate_aqi(forecast.aqi),
                reading,
                forecast,
            });
        }
        drop(store);

        CycleReport {
            snapshot: Snapshot {
                generated_at: OffsetDateTime::now_utc(),
                entries,
            },
            failures,
            cached,
        }
    }
}
