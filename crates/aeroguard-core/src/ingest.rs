//! Concurrent ingestion of current readings.
//!
//! One cycle resolves every configured location independently: a fresh
//! cached reading is reused, otherwise the source is called under its own
//! timeout. Failures never abort the cycle; the location is simply absent.
//! Newly fetched readings are written through to the history store before
//! the cycle returns.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::sync::Mutex;
use tokio::time::{Instant, timeout};
use tracing::{debug, info, warn};

use aeroguard_store::HistoryStore;
use aeroguard_types::{Location, Reading};

use crate::cache::ReadingCache;
use crate::error::{Error, Result};
use crate::source::ReadingSource;

/// A history store shared between the ingestor, the forecast step and the API.
pub type SharedStore = Arc<Mutex<Box<dyn HistoryStore>>>;

/// Wrap a store for sharing.
pub fn shared_store(store: impl HistoryStore + 'static) -> SharedStore {
    Arc::new(Mutex::new(Box::new(store)))
}

/// Ingestion settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestConfig {
    /// Per-call timeout.
    pub fetch_timeout: Duration,
    /// Interval between timer-driven cycles.
    pub refresh_interval: Duration,
    /// Upper bound on in-flight fetches. `None` fetches all locations at once.
    pub max_concurrency: Option<usize>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(10),
            refresh_interval: Duration::from_secs(600),
            max_concurrency: None,
        }
    }
}

impl IngestConfig {
    /// Effective concurrency for `locations` fetches, never zero.
    pub fn concurrency_for(&self, locations: usize) -> usize {
        self.max_concurrency
            .unwrap_or(locations)
            .min(locations)
            .max(1)
    }

    /// How long a cached reading is reused.
    ///
    /// One fetch timeout shorter than the refresh interval, so the next
    /// timer tick refetches even when it wakes earlier relative to the
    /// previous cycle's start.
    pub fn cache_ttl(&self) -> Duration {
        self.refresh_interval.saturating_sub(self.fetch_timeout)
    }
}

/// How one location was resolved in a cycle.
#[derive(Debug)]
pub enum FetchOutcome {
    /// A new reading was fetched and written to history.
    Fetched(Reading),
    /// A fresh cached reading was reused; history was not touched.
    Cached(Reading),
    /// The location is absent this cycle.
    Failed(Error),
}

impl FetchOutcome {
    /// The reading, if the location is present this cycle.
    pub fn reading(&self) -> Option<&Reading> {
        match self {
            FetchOutcome::Fetched(reading) | FetchOutcome::Cached(reading) => Some(reading),
            FetchOutcome::Failed(_) => None,
        }
    }
}

/// Outcome for a single location.
#[derive(Debug)]
pub struct LocationOutcome {
    /// The location.
    pub location: Location,
    /// How it was resolved.
    pub outcome: FetchOutcome,
}

/// Fetches readings for a location set and records them.
pub struct Ingestor {
    source: Arc<dyn ReadingSource>,
    store: SharedStore,
    cache: Mutex<ReadingCache>,
    config: IngestConfig,
}

impl std::fmt::Debug for Ingestor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ingestor")
            .field("source", &self.source.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Ingestor {
    /// Create a new ingestor.
    pub fn new(source: Arc<dyn ReadingSource>, store: SharedStore, config: IngestConfig) -> Self {
        Self {
            source,
            store,
            cache: Mutex::new(ReadingCache::new(config.cache_ttl())),
            config,
        }
    }

    /// The shared history store.
    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// The ingestion settings.
    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Resolve every location once.
    ///
    /// Outcomes are returned in the order of `locations`. Fetched readings
    /// are appended to history and cached before this returns.
    pub async fn run_cycle(&self, locations: &[Location]) -> Vec<LocationOutcome> {
        let issued_at = Instant::now();
        let limit = self.config.concurrency_for(locations.len());

        let resolves: Vec<_> = locations
            .iter()
            .map(|location| self.resolve(location, issued_at))
            .collect();
        let outcomes: Vec<FetchOutcome> = stream::iter(resolves).buffered(limit).collect().await;

        self.record(&outcomes, issued_at).await;

        let fetched = outcomes
            .iter()
            .filter(|o| matches!(o, FetchOutcome::Fetched(_)))
            .count();
        let cached = outcomes
            .iter()
            .filter(|o| matches!(o, FetchOutcome::Cached(_)))
            .count();
        info!(
            "Ingestion cycle: {} fetched, {} cached, {} failed of {} locations",
            fetched,
            cached,
            locations.len() - fetched - cached,
            locations.len()
        );

        locations
            .iter()
            .cloned()
            .zip(outcomes)
            .map(|(location, outcome)| LocationOutcome { location, outcome })
            .collect()
    }

    async fn resolve(&self, location: &Location, issued_at: Instant) -> FetchOutcome {
        let cached = self
            .cache
            .lock()
            .await
            .get(&location.name, issued_at)
            .cloned();
        if let Some(reading) = cached {
            debug!("Using cached reading for {}", location.name);
            return FetchOutcome::Cached(reading);
        }

        match self.fetch(location).await {
            Ok(reading) => FetchOutcome::Fetched(reading),
            Err(e) => {
                debug!("Fetch for {} failed: {}", location.name, e);
                FetchOutcome::Failed(e)
            }
        }
    }

    async fn fetch(&self, location: &Location) -> Result<Reading> {
        let fetch = self.source.fetch(location.latitude, location.longitude);
        match timeout(self.config.fetch_timeout, fetch).await {
            Ok(result) => Ok(result?.into_reading(&location.name)),
            Err(_) => Err(Error::Timeout(self.config.fetch_timeout)),
        }
    }

    async fn record(&self, outcomes: &[FetchOutcome], issued_at: Instant) {
        let fetched: Vec<&Reading> = outcomes
            .iter()
            .filter_map(|o| match o {
                FetchOutcome::Fetched(reading) => Some(reading),
                _ => None,
            })
            .collect();
        if fetched.is_empty() {
            return;
        }

        {
            let mut store = self.store.lock().await;
            for reading in &fetched {
                if let Err(e) = store.append(&reading.location, reading.aqi, reading.timestamp) {
                    warn!("Failed to record reading for {}: {}", reading.location, e);
                }
            }
        }

        let mut cache = self.cache.lock().await;
        cache.purge_expired(issued_at);
        for reading in fetched {
            cache.insert(reading.clone(), issued_at);
        }
    }
}
