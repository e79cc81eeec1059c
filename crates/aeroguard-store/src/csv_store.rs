//! Flat-file history store.
//!
//! The file holds three columns, `timestamp,location,aqi`, with a header row.
//! Every append prunes the working set and rewrites the whole file through a
//! temporary sibling that is renamed into place.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use tracing::{debug, info, warn};

use aeroguard_types::HistoryRecord;

use crate::error::{Error, Result};
use crate::memory::MemoryStore;
use crate::timestamp::{format_timestamp, parse_timestamp};
use crate::traits::HistoryStore;

/// One row of the history file.
#[derive(Debug, Serialize, Deserialize)]
struct Row {
    timestamp: String,
    location: String,
    aqi: u16,
}

/// History persisted to a flat CSV file.
#[derive(Debug)]
pub struct CsvStore {
    path: PathBuf,
    memory: MemoryStore,
}

impl CsvStore {
    /// Open the history file at `path`, loading any existing records.
    ///
    /// A missing file yields an empty store. A file that cannot be parsed is
    /// deleted and the store starts empty.
    pub fn open<P: AsRef<Path>>(path: P, retention: Duration) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        crate::ensure_parent_dir(&path)?;

        info!("Opening history file at {}", path.display());
        let mut store = Self {
            path,
            memory: MemoryStore::new(retention),
        };
        store.load()?;
        Ok(store)
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parse(content: &str) -> Result<Vec<HistoryRecord>> {
        let mut reader = csv::Reader::from_reader(content.as_bytes());
        let mut records = Vec::new();
        for row in reader.deserialize::<Row>() {
            let row = row?;
            let timestamp = parse_timestamp(&row.timestamp)?;
            records.push(HistoryRecord::new(row.location, row.aqi, timestamp));
        }
        Ok(records)
    }

    fn save(&self) -> Result<()> {
        let tmp_path = self.path.with_extension("csv.tmp");
        {
            let mut writer = csv::Writer::from_path(&tmp_path)?;
            for record in self.memory.records() {
                writer.serialize(Row {
                    timestamp: format_timestamp(record.timestamp)?,
                    location: record.location.clone(),
                    aqi: record.aqi,
                })?;
            }
            writer.flush()?;
        }
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    fn reset(&mut self, reason: &Error) {
        warn!(
            "History file {} is corrupt ({}); starting with empty history",
            self.path.display(),
            reason
        );
        self.memory.clear();
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!("Failed to remove corrupt history file: {}", e);
        }
    }
}

impl HistoryStore for CsvStore {
    fn append(&mut self, location: &str, aqi: u16, timestamp: OffsetDateTime) -> Result<()> {
        self.memory.append(location, aqi, timestamp)?;
        self.save()?;
        debug!(
            "Appended {}={} to {} ({} records retained)",
            location,
            aqi,
            self.path.display(),
            self.memory.records().len()
        );
        Ok(())
    }

    fn recent_window(&self, location: &str, max_count: usize) -> Result<Vec<HistoryRecord>> {
        self.memory.recent_window(location, max_count)
    }

    fn load(&mut self) -> Result<usize> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.memory.clear();
                return Ok(0);
            }
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                // Not UTF-8
                self.reset(&Error::Io(e));
                return Ok(0);
            }
            Err(e) => return Err(e.into()),
        };

        match Self::parse(&content) {
            Ok(records) => {
                let count = records.len();
                self.memory.replace(records);
                info!("Loaded {} history records from {}", count, self.path.display());
                Ok(count)
            }
            Err(e) => {
                self.reset(&e);
                Ok(0)
            }
        }
    }

    fn len(&self) -> Result<usize> {
        self.memory.len()
    }

    fn retention(&self) -> Duration {
        self.memory.retention()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn retention() -> Duration {
        Duration::hours(12)
    }

    #[test]
    fn test_open_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::open(dir.path().join("history.csv"), retention()).unwrap();
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_open_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("history.csv");
        let mut store = CsvStore::open(&path, retention()).unwrap();
        store
            .append("Colaba", 40, datetime!(2024-11-02 08:00 UTC))
            .unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_history_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.csv");

        {
            let mut store = CsvStore::open(&path, retention()).unwrap();
            store
                .append("Byculla", 120, datetime!(2024-11-02 08:00 UTC))
                .unwrap();
            store
                .append("Byculla", 130, datetime!(2024-11-02 09:00 +05:30))
                .unwrap();
        }

        let store = CsvStore::open(&path, retention()).unwrap();
        let window = store.recent_window("Byculla", 10).unwrap();
        assert_eq!(window.len(), 2);
        // 09:00 +05:30 is 03:30 UTC, so it sorts first
        assert_eq!(window[0].aqi, 130);
        assert_eq!(window[1].aqi, 120);
        assert_eq!(window[0].timestamp, datetime!(2024-11-02 09:00 +05:30));
    }

    #[test]
    fn test_file_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.csv");
        let mut store = CsvStore::open(&path, retention()).unwrap();
        store
            .append("Marine Lines", 77, datetime!(2024-11-02 08:00 UTC))
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next(), Some("timestamp,location,aqi"));
        assert_eq!(lines.next(), Some("2024-11-02T08:00:00Z,Marine Lines,77"));
        assert!(!dir.path().join("history.csv.tmp").exists());
    }

    #[test]
    fn test_loads_dataframe_style_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.csv");
        std::fs::write(
            &path,
            "timestamp,location,aqi\n2024-11-02 08:00:00,Dadar,88\n2024-11-02 09:00:00.5,Dadar,91\n",
        )
        .unwrap();

        let store = CsvStore::open(&path, retention()).unwrap();
        let window = store.recent_window("Dadar", 10).unwrap();
        assert_eq!(window.len(), 2);
        assert_eq!(window[0].timestamp, datetime!(2024-11-02 08:00 UTC));
    }

    #[test]
    fn test_corrupt_file_resets_to_empty_and_stays_usable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.csv");
        std::fs::write(
            &path,
            "timestamp,location,aqi\n2024-11-02T08:00:00Z,Dadar,88\nnot-a-date,Dadar,91\n",
        )
        .unwrap();

        let mut store = CsvStore::open(&path, retention()).unwrap();
        assert!(store.is_empty().unwrap());
        assert!(!path.exists());

        store
            .append("Dadar", 93, datetime!(2024-11-02 10:00 UTC))
            .unwrap();
        let window = store.recent_window("Dadar", 10).unwrap();
        assert_eq!(window.len(), 1);
        assert_eq!(window[0].aqi, 93);
    }

    #[test]
    fn test_bad_aqi_column_is_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.csv");
        std::fs::write(&path, "timestamp,location,aqi\n2024-11-02T08:00:00Z,Dadar,high\n").unwrap();

        let store = CsvStore::open(&path, retention()).unwrap();
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_binary_garbage_is_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.csv");
        std::fs::write(&path, [0xff, 0xfe, 0x00, 0x9c]).unwrap();

        let store = CsvStore::open(&path, retention()).unwrap();
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_append_prunes_persisted_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.csv");
        let mut store = CsvStore::open(&path, retention()).unwrap();
        store
            .append("Mulund", 60, datetime!(2024-11-01 06:00 UTC))
            .unwrap();
        store
            .append("Mulund", 70, datetime!(2024-11-02 06:00 UTC))
            .unwrap();

        let reopened = CsvStore::open(&path, retention()).unwrap();
        assert_eq!(reopened.len().unwrap(), 1);
    }
}
