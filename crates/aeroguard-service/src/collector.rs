//! Background data collector.
//!
//! One task drives the pipeline once per refresh interval. A manual cycle
//! triggered through the API goes through [`run_cycle`] as well; the
//! pipeline serializes the two so history appends never interleave.

use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, warn};

use aeroguard_core::{CycleReport, Snapshot};

use crate::state::{AppState, NO_DATA_THRESHOLD};

/// Failing cycles per location that are logged at `warn` before escalating.
const WARN_FAILURES: u32 = 3;

/// Background collector that runs the pipeline on the refresh interval.
pub struct Collector {
    state: Arc<AppState>,
}

impl Collector {
    /// Create a new collector.
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Start the collection loop in the background.
    ///
    /// Returns `false` if the collector was already running.
    pub async fn start(&self) -> bool {
        if self.state.collector.is_running() {
            return false;
        }

        self.state.collector.reset_stop();
        self.state.collector.set_running(true);

        let refresh = Duration::from_secs(self.state.config.collector.refresh_interval);
        info!(
            "Starting collector for {} location(s), interval: {}s",
            self.state.config.locations.len(),
            refresh.as_secs()
        );

        let state = Arc::clone(&self.state);
        let handle = tokio::spawn(async move {
            collect_loop(state, refresh).await;
        });
        self.state.collector.set_task(handle).await;
        true
    }

    /// Signal the loop to stop and wait for it to exit.
    pub async fn stop(&self, timeout: Duration) -> bool {
        self.state.collector.signal_stop();
        self.state.collector.wait_for_task(timeout).await
    }
}

async fn collect_loop(state: Arc<AppState>, refresh: Duration) {
    let mut stop_rx = state.collector.subscribe_stop();
    let mut timer = interval(refresh);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = timer.tick() => {
                run_cycle(&state).await;
            }
            changed = stop_rx.changed() => {
                if changed.is_err() || *stop_rx.borrow() {
                    break;
                }
            }
        }
    }

    state.collector.set_running(false);
    info!("Collector stopped");
}

/// Run one cycle, update statistics and publish the resulting snapshot.
pub async fn run_cycle(state: &AppState) -> Snapshot {
    let report = state.pipeline.run_cycle().await;
    record_report(state, &report).await;

    let snapshot = report.snapshot;
    state.publish(snapshot.clone()).await;
    snapshot
}

async fn record_report(state: &AppState, report: &CycleReport) {
    let now = OffsetDateTime::now_utc();
    let produced = !report.snapshot.is_empty();
    state.collector.record_cycle(produced);

    {
        let mut stats = state.collector.location_stats.write().await;
        for entry in stats.iter_mut() {
            if let Some(failure) = report
                .failures
                .iter()
                .find(|f| f.location == entry.location)
            {
                entry.record_failure(now, &failure.error);
                if entry.consecutive_failures <= WARN_FAILURES {
                    warn!(
                        "Failed to fetch {}: {} (attempt {})",
                        entry.location, failure.error, entry.consecutive_failures
                    );
                } else if entry.consecutive_failures == WARN_FAILURES + 1 {
                    error!(
                        "Failed to fetch {} after {} cycles, will continue trying silently",
                        entry.location, entry.consecutive_failures
                    );
                }
            } else if report.snapshot.get(&entry.location).is_some() {
                entry.record_success(now);
            }
        }
    }

    debug!(
        "Cycle complete: {} present, {} cached, {} absent",
        report.snapshot.len(),
        report.cached,
        report.failures.len()
    );

    if !produced {
        let empty = state.collector.consecutive_empty_cycles();
        if empty == NO_DATA_THRESHOLD {
            error!("No readings for any location in {} consecutive cycles", empty);
        }
    }
}
