//! The storage abstraction consumed by the ingestor and the forecast engine.

use time::{Duration, OffsetDateTime};

use aeroguard_types::HistoryRecord;

use crate::error::Result;

/// Default retention window in hours.
pub const DEFAULT_RETENTION_HOURS: u32 = 12;

/// Append-only, per-location AQI history bounded to a retention window.
///
/// Implementations own the retained set exclusively. Callers insert with
/// [`append`](HistoryStore::append) and read bounded slices with
/// [`recent_window`](HistoryStore::recent_window); nothing else mutates
/// stored records.
///
/// Stores are not internally synchronized. Share one behind a mutex so that
/// appends are serialized.
pub trait HistoryStore: Send {
    /// Insert a record, then drop every record (for every location) whose
    /// timestamp is not newer than `timestamp - retention`.
    ///
    /// Duplicate timestamps are allowed.
    fn append(&mut self, location: &str, aqi: u16, timestamp: OffsetDateTime) -> Result<()>;

    /// Up to `max_count` most recent records for `location`, oldest first.
    ///
    /// An unknown location yields an empty vector, not an error.
    fn recent_window(&self, location: &str, max_count: usize) -> Result<Vec<HistoryRecord>>;

    /// (Re)load the retained set from the durable backing.
    ///
    /// Unparseable data is discarded and the store restarts empty. Returns the
    /// number of records loaded.
    fn load(&mut self) -> Result<usize>;

    /// Total number of retained records across all locations.
    fn len(&self) -> Result<usize>;

    /// Whether the store holds no records.
    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// The retention window enforced on append.
    fn retention(&self) -> Duration;
}

/// Records strictly newer than this instant survive a prune triggered at `timestamp`.
pub(crate) fn retention_cutoff(timestamp: OffsetDateTime, retention: Duration) -> OffsetDateTime {
    timestamp - retention
}
