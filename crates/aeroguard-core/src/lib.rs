//! AQI ingestion, categorization and forecasting for AeroGuard.
//!
//! This crate holds the pipeline that turns upstream air-quality readings into
//! per-location snapshots:
//!
//! - [`ReadingSource`]: the provider boundary, with [`WaqiSource`],
//!   [`OpenWeatherSource`] and [`MockSource`] implementations
//! - [`Ingestor`]: concurrent fetches with per-call timeouts, a
//!   [`ReadingCache`] and write-through to the history store
//! - [`ForecastEngine`]: trend-delta or regression estimates over history
//! - [`Thresholds`]: maps values to an [`AqiCategory`]
//! - [`Pipeline`]: runs a cycle and assembles a [`Snapshot`]
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use aeroguard_core::{
//!     Estimator, ForecastEngine, IngestConfig, Ingestor, MockSource, Pipeline, Scale,
//!     Thresholds, shared_store,
//! };
//! use aeroguard_store::MemoryStore;
//! use aeroguard_types::Location;
//! use time::macros::datetime;
//!
//! # tokio_test_block(async {
//! let colaba = Location::new("Colaba", 18.9067, 72.8147);
//! let source = MockSource::builder()
//!     .reading(&colaba, 87, datetime!(2024-11-02 09:00 UTC))
//!     .build();
//! let store = shared_store(MemoryStore::new(time::Duration::hours(12)));
//! let ingestor = Ingestor::new(Arc::new(source), store, IngestConfig::default());
//! let pipeline = Pipeline::new(
//!     vec![colaba],
//!     ingestor,
//!     ForecastEngine::new(Estimator::TrendDelta, 6),
//!     Thresholds::for_scale(Scale::Aqi),
//! );
//!
//! let report = pipeline.run_cycle().await;
//! assert_eq!(report.snapshot.len(), 1);
//! # });
//! # fn tokio_test_block(f: impl std::future::Future<Output = ()>) {
//! #     tokio::runtime::Builder::new_current_thread()
//! #         .enable_all()
//! #         .build()
//! #         .unwrap()
//! #         .block_on(f)
//! # }
//! ```

pub mod cache;
pub mod error;
pub mod forecast;
pub mod ingest;
pub mod mock;
pub mod openweather;
pub mod pipeline;
pub mod source;
pub mod thresholds;
pub mod waqi;

pub use aeroguard_types::AqiCategory;
pub use cache::ReadingCache;
pub use error::{Error, Result};
pub use forecast::{Estimator, ForecastEngine};
pub use ingest::{FetchOutcome, IngestConfig, Ingestor, LocationOutcome, SharedStore, shared_store};
pub use mock::{MockSource, MockSourceBuilder};
pub use openweather::OpenWeatherSource;
pub use pipeline::{CycleReport, LocationFailure, Pipeline, Snapshot, SnapshotEntry};
pub use source::{ReadingSource, SourceReading};
pub use thresholds::{Scale, ThresholdConfig, Thresholds};
pub use waqi::WaqiSource;
