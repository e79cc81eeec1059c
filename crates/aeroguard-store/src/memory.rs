//! In-memory history store.

use time::{Duration, OffsetDateTime};

use aeroguard_types::HistoryRecord;

use crate::error::Result;
use crate::traits::{HistoryStore, retention_cutoff};

/// History kept only in process memory.
///
/// Also serves as the working set of [`CsvStore`](crate::CsvStore).
#[derive(Debug, Clone)]
pub struct MemoryStore {
    records: Vec<HistoryRecord>,
    retention: Duration,
}

impl MemoryStore {
    /// Create an empty store with the given retention window.
    pub fn new(retention: Duration) -> Self {
        Self {
            records: Vec::new(),
            retention,
        }
    }

    /// All retained records in insertion order.
    pub fn records(&self) -> &[HistoryRecord] {
        &self.records
    }

    /// Replace the retained set wholesale (used when loading from disk).
    pub(crate) fn replace(&mut self, records: Vec<HistoryRecord>) {
        self.records = records;
    }

    /// Drop every record.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub(crate) fn insert(&mut self, record: HistoryRecord) {
        let cutoff = retention_cutoff(record.timestamp, self.retention);
        self.records.push(record);
        self.records.retain(|r| r.timestamp > cutoff);
    }
}

impl HistoryStore for MemoryStore {
    fn append(&mut self, location: &str, aqi: u16, timestamp: OffsetDateTime) -> Result<()> {
        self.insert(HistoryRecord::new(location, aqi, timestamp));
        Ok(())
    }

    fn recent_window(&self, location: &str, max_count: usize) -> Result<Vec<HistoryRecord>> {
        let mut window: Vec<HistoryRecord> = self
            .records
            .iter()
            .filter(|r| r.location == location)
            .cloned()
            .collect();

        // Stable sort keeps insertion order for equal timestamps
        window.sort_by_key(|r| r.timestamp);

        let skip = window.len().saturating_sub(max_count);
        Ok(window.split_off(skip))
    }

    fn load(&mut self) -> Result<usize> {
        Ok(self.records.len())
    }

    fn len(&self) -> Result<usize> {
        Ok(self.records.len())
    }

    fn retention(&self) -> Duration {
        self.retention
    }
}
