//! Background AQI collector and HTTP API for AeroGuard.
//!
//! This crate provides a service that:
//! - Runs one ingestion cycle per refresh interval over the configured locations
//! - Records readings in the rolling history store
//! - Publishes each cycle's snapshot (current value, category, forecast)
//! - Streams new snapshots over WebSocket
//!
//! # REST API Endpoints
//!
//! - `GET /api/health` - Service health check
//! - `GET /api/status` - Collector state and per-location statistics
//! - `GET /api/snapshot` - Latest snapshot (503 until data is available)
//! - `POST /api/cycle` - Run a cycle now and return its snapshot
//! - `GET /api/locations` - Configured locations
//! - `GET /api/locations/{name}/history` - Recent history for a location
//! - `WS /api/ws` - Real-time snapshot stream
//!
//! # Configuration
//!
//! The service reads configuration from `~/.config/aeroguard/server.toml`:
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1:8080"
//!
//! [storage]
//! backend = "csv"
//! retention_hours = 12
//!
//! [collector]
//! refresh_interval = 600
//! fetch_timeout = 10
//!
//! [forecast]
//! estimator = "trend-delta"
//!
//! [source]
//! provider = "waqi"
//!
//! [[locations]]
//! name = "Colaba"
//! latitude = 18.91
//! longitude = 72.82
//! ```

pub mod api;
pub mod collector;
pub mod config;
pub mod state;
pub mod ws;

use std::sync::Arc;

use aeroguard_core::{Ingestor, Pipeline, ReadingSource, SharedStore};

pub use collector::Collector;
pub use config::{
    CollectorConfig, Config, ConfigError, ForecastConfig, Provider, ServerConfig, SourceConfig,
    StorageBackend, StorageConfig, ValidationError,
};
pub use state::{AppState, DataState, NO_DATA_THRESHOLD};

/// Assemble the application state from a validated configuration.
pub fn build_state(
    config: Config,
    source: Arc<dyn ReadingSource>,
    store: SharedStore,
) -> Arc<AppState> {
    let ingestor = Ingestor::new(source, store, config.ingest_config());
    let pipeline = Pipeline::new(
        config.locations.clone(),
        ingestor,
        config.forecast_engine(),
        config.thresholds(),
    );
    AppState::new(config, pipeline)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use aeroguard_core::{MockSource, shared_store};
    use aeroguard_store::MemoryStore;
    use aeroguard_types::Location;
    use time::OffsetDateTime;

    use crate::config::{Config, StorageBackend};
    use crate::state::AppState;

    pub fn test_locations() -> Vec<Location> {
        vec![
            Location::new("Colaba", 18.91, 72.82),
            Location::new("Bandra", 19.06, 72.83),
        ]
    }

    pub fn test_config() -> Config {
        let mut config = Config::default();
        config.storage.backend = StorageBackend::Memory;
        config.locations = test_locations();
        config
    }

    pub fn test_state_with(source: MockSource) -> Arc<AppState> {
        let config = test_config();
        let store = shared_store(MemoryStore::new(config.storage.retention()));
        crate::build_state(config, Arc::new(source), store)
    }

    pub fn test_state() -> Arc<AppState> {
        let locations = test_locations();
        let now = OffsetDateTime::now_utc();
        test_state_with(
            MockSource::builder()
                .reading(&locations[0], 45, now)
                .reading(&locations[1], 130, now)
                .build(),
        )
    }
}
