//! SQLite-backed history store.

use std::path::{Path, PathBuf};

use rusqlite::Connection;
use time::{Duration, OffsetDateTime, UtcOffset};
use tracing::{debug, info, warn};

use aeroguard_types::HistoryRecord;

use crate::error::{Error, Result};
use crate::schema;
use crate::traits::{HistoryStore, retention_cutoff};

/// History persisted in an embedded SQLite database.
///
/// Timestamps are stored as Unix nanoseconds alongside their UTC offset,
/// so records read back exactly as they were appended.
pub struct SqliteStore {
    conn: Connection,
    path: Option<PathBuf>,
    retention: Duration,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("path", &self.path)
            .field("retention", &self.retention)
            .finish()
    }
}

impl SqliteStore {
    /// Open or create a database at the given path.
    ///
    /// A file that is not a usable database is deleted and recreated, and
    /// rows that fail to decode cause the history table to be cleared.
    pub fn open<P: AsRef<Path>>(path: P, retention: Duration) -> Result<Self> {
        let path = path.as_ref();
        crate::ensure_parent_dir(path)?;

        info!("Opening database at {}", path.display());
        let conn = match Self::connect(path) {
            Ok(conn) => conn,
            Err(e) => {
                warn!(
                    "Database {} is unusable ({}); recreating it",
                    path.display(),
                    e
                );
                remove_database_files(path);
                Self::connect(path)?
            }
        };

        let mut store = Self {
            conn,
            path: Some(path.to_path_buf()),
            retention,
        };
        store.load()?;
        Ok(store)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory(retention: Duration) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self {
            conn,
            path: None,
            retention,
        })
    }

    fn connect(path: &Path) -> Result<Connection> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;
        schema::initialize(&conn)?;
        Ok(conn)
    }

    /// Check every row decodes to a valid record.
    fn validate(&self) -> Result<usize> {
        let mut stmt = self
            .conn
            .prepare("SELECT timestamp, utc_offset, location, aqi FROM history")?;
        let mut rows = stmt.query([])?;
        let mut count = 0;
        while let Some(row) = rows.next()? {
            decode_timestamp(row.get(0)?, row.get(1)?)?;
            let _: String = row.get(2)?;
            let aqi: i64 = row.get(3)?;
            u16::try_from(aqi).map_err(|_| Error::Corrupt(format!("aqi {aqi} out of range")))?;
            count += 1;
        }
        Ok(count)
    }
}

impl HistoryStore for SqliteStore {
    fn append(&mut self, location: &str, aqi: u16, timestamp: OffsetDateTime) -> Result<()> {
        let cutoff = encode_timestamp(retention_cutoff(timestamp, self.retention))?;
        let nanos = encode_timestamp(timestamp)?;
        let offset = timestamp.offset().whole_seconds();

        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO history (timestamp, utc_offset, location, aqi) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![nanos, offset, location, aqi],
        )?;
        let pruned = tx.execute("DELETE FROM history WHERE timestamp <= ?1", [cutoff])?;
        tx.commit()?;

        debug!("Appended {}={} (pruned {} records)", location, aqi, pruned);
        Ok(())
    }

    fn recent_window(&self, location: &str, max_count: usize) -> Result<Vec<HistoryRecord>> {
        let limit = i64::try_from(max_count).unwrap_or(i64::MAX);
        let mut stmt = self.conn.prepare(
            "SELECT timestamp, utc_offset, aqi FROM history WHERE location = ?1
             ORDER BY timestamp DESC, id DESC LIMIT ?2",
        )?;

        let rows = stmt
            .query_map(rusqlite::params![location, limit], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i32>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut records = rows
            .into_iter()
            .map(|(ts, offset, aqi)| {
                Ok(HistoryRecord::new(
                    location,
                    u16::try_from(aqi).unwrap_or(u16::MAX),
                    decode_timestamp(ts, offset)?,
                ))
            })
            .collect::<Result<Vec<_>>>()?;
        records.reverse();
        Ok(records)
    }

    fn load(&mut self) -> Result<usize> {
        match self.validate() {
            Ok(count) => {
                info!("Loaded {} history records", count);
                Ok(count)
            }
            Err(e) => {
                warn!("History table is corrupt ({}); starting with empty history", e);
                self.conn.execute("DELETE FROM history", [])?;
                Ok(0)
            }
        }
    }

    fn len(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM history", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn retention(&self) -> Duration {
        self.retention
    }
}

fn encode_timestamp(timestamp: OffsetDateTime) -> Result<i64> {
    i64::try_from(timestamp.unix_timestamp_nanos())
        .map_err(|_| Error::InvalidTimestamp(format!("{timestamp} is out of storable range")))
}

fn decode_timestamp(nanos: i64, offset: i32) -> Result<OffsetDateTime> {
    let offset =
        UtcOffset::from_whole_seconds(offset).map_err(|e| Error::InvalidTimestamp(e.to_string()))?;
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(nanos))
        .map(|ts| ts.to_offset(offset))
        .map_err(|e| Error::InvalidTimestamp(e.to_string()))
}

fn remove_database_files(path: &Path) {
    for suffix in ["", "-wal", "-shm"] {
        let mut file = path.as_os_str().to_owned();
        file.push(suffix);
        let _ = std::fs::remove_file(PathBuf::from(file));
    }
}
