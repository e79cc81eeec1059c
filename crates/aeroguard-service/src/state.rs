//! Application state shared across handlers and the collector.
//!
//! # Snapshot Publication
//!
//! Every completed cycle replaces the published [`Snapshot`] wholesale and
//! broadcasts it on `snapshot_tx`. Slow WebSocket subscribers lose old
//! snapshots rather than blocking the collector; since each snapshot is
//! complete, a dropped one is never needed to interpret the next.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, AtomicU64, Ordering};

use serde::Serialize;
use time::OffsetDateTime;
use tokio::sync::{Mutex, RwLock, broadcast, watch};
use tokio::task::JoinHandle;

use aeroguard_core::{Pipeline, Snapshot};

use crate::config::Config;

/// Consecutive empty cycles after which the service reports `no_data`.
pub const NO_DATA_THRESHOLD: u32 = 3;

/// Shared application state.
pub struct AppState {
    /// Frozen configuration.
    pub config: Config,
    /// The ingest-record-forecast pipeline.
    pub pipeline: Pipeline,
    /// The most recent snapshot, if any cycle has completed.
    pub snapshot: RwLock<Option<Snapshot>>,
    /// Broadcast channel for new snapshots.
    pub snapshot_tx: broadcast::Sender<Snapshot>,
    /// Collector control state.
    pub collector: CollectorState,
}

impl AppState {
    /// Create new application state.
    pub fn new(config: Config, pipeline: Pipeline) -> Arc<Self> {
        let (snapshot_tx, _) = broadcast::channel(config.server.broadcast_buffer.max(1));
        let collector = CollectorState::new(
            config
                .locations
                .iter()
                .map(|l| LocationStats::new(&l.name))
                .collect(),
        );
        Arc::new(Self {
            config,
            pipeline,
            snapshot: RwLock::new(None),
            snapshot_tx,
            collector,
        })
    }

    /// Whether the presentation layer has data to show.
    pub async fn data_state(&self) -> DataState {
        if self.collector.consecutive_empty_cycles() >= NO_DATA_THRESHOLD {
            DataState::NoData
        } else if self.snapshot.read().await.is_none() {
            DataState::Pending
        } else {
            DataState::Ok
        }
    }

    /// Replace the published snapshot and notify subscribers.
    pub async fn publish(&self, snapshot: Snapshot) {
        *self.snapshot.write().await = Some(snapshot.clone());
        // No subscribers is not an error.
        let _ = self.snapshot_tx.send(snapshot);
    }
}

/// Availability of pipeline output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataState {
    /// No cycle has completed yet.
    Pending,
    /// A snapshot is available.
    Ok,
    /// Repeated cycles produced no readings at all.
    NoData,
}

/// State for tracking and controlling the collector.
pub struct CollectorState {
    running: AtomicBool,
    started_at: AtomicI64,
    stop_tx: watch::Sender<bool>,
    stop_rx: watch::Receiver<bool>,
    cycle_count: AtomicU64,
    last_cycle_at: AtomicI64,
    consecutive_empty: AtomicU32,
    /// Per-location collection stats, in configured order.
    pub location_stats: RwLock<Vec<LocationStats>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl CollectorState {
    /// Create a new collector state.
    pub fn new(location_stats: Vec<LocationStats>) -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        Self {
            running: AtomicBool::new(false),
            started_at: AtomicI64::new(0),
            stop_tx,
            stop_rx,
            cycle_count: AtomicU64::new(0),
            last_cycle_at: AtomicI64::new(0),
            consecutive_empty: AtomicU32::new(0),
            location_stats: RwLock::new(location_stats),
            task: Mutex::new(None),
        }
    }

    /// Check if the collector is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Mark the collector as started or stopped.
    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
        if running {
            let now = OffsetDateTime::now_utc().unix_timestamp();
            self.started_at.store(now, Ordering::SeqCst);
        }
    }

    /// Get the collector start time.
    pub fn started_at(&self) -> Option<OffsetDateTime> {
        load_timestamp(&self.started_at)
    }

    /// Get a receiver for the stop signal.
    pub fn subscribe_stop(&self) -> watch::Receiver<bool> {
        self.stop_rx.clone()
    }

    /// Signal the collector task to stop.
    pub fn signal_stop(&self) {
        let _ = self.stop_tx.send(true);
        self.running.store(false, Ordering::SeqCst);
    }

    /// Reset the stop signal (for restarting).
    pub fn reset_stop(&self) {
        let _ = self.stop_tx.send(false);
    }

    /// Remember the collector task so it can be awaited on shutdown.
    pub async fn set_task(&self, handle: JoinHandle<()>) {
        *self.task.lock().await = Some(handle);
    }

    /// Wait for the collector task to exit, aborting it after `timeout`.
    ///
    /// Returns `true` if the task stopped on its own.
    pub async fn wait_for_task(&self, timeout: std::time::Duration) -> bool {
        let Some(mut handle) = self.task.lock().await.take() else {
            return true;
        };
        match tokio::time::timeout(timeout, &mut handle).await {
            Ok(_) => true,
            Err(_) => {
                handle.abort();
                false
            }
        }
    }

    /// Completed cycles since startup.
    pub fn cycle_count(&self) -> u64 {
        self.cycle_count.load(Ordering::SeqCst)
    }

    /// When the last cycle completed.
    pub fn last_cycle_at(&self) -> Option<OffsetDateTime> {
        load_timestamp(&self.last_cycle_at)
    }

    /// Cycles in a row that produced no readings.
    pub fn consecutive_empty_cycles(&self) -> u32 {
        self.consecutive_empty.load(Ordering::SeqCst)
    }

    /// Record a completed cycle and whether it produced any reading.
    pub fn record_cycle(&self, produced_readings: bool) {
        self.cycle_count.fetch_add(1, Ordering::SeqCst);
        self.last_cycle_at
            .store(OffsetDateTime::now_utc().unix_timestamp(), Ordering::SeqCst);
        if produced_readings {
            self.consecutive_empty.store(0, Ordering::SeqCst);
        } else {
            self.consecutive_empty.fetch_add(1, Ordering::SeqCst);
        }
    }
}

fn load_timestamp(cell: &AtomicI64) -> Option<OffsetDateTime> {
    match cell.load(Ordering::SeqCst) {
        0 => None,
        ts => OffsetDateTime::from_unix_timestamp(ts).ok(),
    }
}

/// Collection statistics for a single location.
#[derive(Debug, Clone, Serialize)]
pub struct LocationStats {
    /// Location name.
    pub location: String,
    /// Time of last successful fetch or cache hit.
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_success_at: Option<OffsetDateTime>,
    /// Time of last failure.
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_error_at: Option<OffsetDateTime>,
    /// Last error message.
    pub last_error: Option<String>,
    /// Cycles in which the location was present.
    pub success_count: u64,
    /// Cycles in which the location was absent.
    pub failure_count: u64,
    /// Absent cycles in a row.
    pub consecutive_failures: u32,
}

impl LocationStats {
    /// Fresh stats for a location.
    pub fn new(location: &str) -> Self {
        Self {
            location: location.to_string(),
            last_success_at: None,
            last_error_at: None,
            last_error: None,
            success_count: 0,
            failure_count: 0,
            consecutive_failures: 0,
        }
    }

    /// Record a cycle in which the location was present.
    pub fn record_success(&mut self, at: OffsetDateTime) {
        self.last_success_at = Some(at);
        self.success_count += 1;
        self.consecutive_failures = 0;
    }

    /// Record a cycle in which the location was absent.
    pub fn record_failure(&mut self, at: OffsetDateTime, error: &str) {
        self.last_error_at = Some(at);
        self.last_error = Some(error.to_string());
        self.failure_count += 1;
        self.consecutive_failures += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_state;

    #[tokio::test]
    async fn test_app_state_new() {
        let state = test_state();
        assert!(state.snapshot.read().await.is_none());
        assert!(!state.collector.is_running());
        assert_eq!(state.collector.cycle_count(), 0);
        assert_eq!(
            state.collector.location_stats.read().await.len(),
            state.config.locations.len()
        );
        assert_eq!(state.data_state().await, DataState::Pending);
    }

    #[tokio::test]
    async fn test_publish_broadcasts_snapshot() {
        let state = test_state();
        let mut rx = state.snapshot_tx.subscribe();

        let snapshot = Snapshot {
            generated_at: OffsetDateTime::now_utc(),
            entries: Vec::new(),
        };
        state.publish(snapshot.clone()).await;

        assert_eq!(rx.recv().await.unwrap(), snapshot);
        assert_eq!(state.snapshot.read().await.as_ref(), Some(&snapshot));
        assert_eq!(state.data_state().await, DataState::Ok);
    }

    #[tokio::test]
    async fn test_no_data_after_threshold() {
        let state = test_state();
        for _ in 0..NO_DATA_THRESHOLD - 1 {
            state.collector.record_cycle(false);
        }
        assert_eq!(state.data_state().await, DataState::Pending);

        state.collector.record_cycle(false);
        assert_eq!(state.data_state().await, DataState::NoData);

        state.collector.record_cycle(true);
        assert_eq!(state.collector.consecutive_empty_cycles(), 0);
        assert_eq!(state.collector.cycle_count(), NO_DATA_THRESHOLD as u64 + 1);
        assert!(state.collector.last_cycle_at().is_some());
    }

    #[test]
    fn test_collector_state_running() {
        let collector = CollectorState::new(Vec::new());
        assert!(collector.started_at().is_none());

        collector.set_running(true);
        assert!(collector.is_running());
        assert!(collector.started_at().is_some());

        collector.signal_stop();
        assert!(!collector.is_running());
        assert!(*collector.subscribe_stop().borrow());

        collector.reset_stop();
        assert!(!*collector.subscribe_stop().borrow());
    }

    #[test]
    fn test_location_stats() {
        let mut stats = LocationStats::new("Parel");
        let now = OffsetDateTime::now_utc();
        stats.record_failure(now, "timed out");
        stats.record_failure(now, "timed out");
        assert_eq!(stats.consecutive_failures, 2);
        assert_eq!(stats.failure_count, 2);

        stats.record_success(now);
        assert_eq!(stats.consecutive_failures, 0);
        assert_eq!(stats.success_count, 1);
        assert_eq!(stats.last_error.as_deref(), Some("timed out"));
    }

    #[tokio::test]
    async fn test_wait_for_task_without_task() {
        let collector = CollectorState::new(Vec::new());
        assert!(collector.wait_for_task(std::time::Duration::from_secs(1)).await);
    }
}
