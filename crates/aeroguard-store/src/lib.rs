//! Rolling per-location AQI history for AeroGuard.
//!
//! This crate provides the history store that feeds the forecast engine.
//! Every backend keeps an append-only series per location, bounded to a
//! rolling retention window that is enforced lazily on each append.
//!
//! # Backends
//!
//! - [`MemoryStore`]: in-process only, used by tests and `backend = "memory"`
//! - [`CsvStore`]: flat `timestamp,location,aqi` file, rewritten on every append
//! - [`SqliteStore`]: embedded SQLite database
//!
//! File-backed stores never fail to start because of bad data: if the
//! persisted history cannot be parsed it is discarded and the store starts
//! empty.
//!
//! # Example
//!
//! ```
//! use aeroguard_store::{HistoryStore, MemoryStore};
//! use time::{Duration, macros::datetime};
//!
//! let mut store = MemoryStore::new(Duration::hours(12));
//! store.append("Dadar", 95, datetime!(2024-11-02 08:00 UTC))?;
//! store.append("Dadar", 110, datetime!(2024-11-02 09:00 UTC))?;
//!
//! let window = store.recent_window("Dadar", 6)?;
//! assert_eq!(window.len(), 2);
//! assert_eq!(window[1].aqi, 110);
//! # Ok::<(), aeroguard_store::Error>(())
//! ```

mod csv_store;
mod error;
mod memory;
mod schema;
mod sqlite;
mod timestamp;
mod traits;

pub use csv_store::CsvStore;
pub use error::{Error, Result};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use timestamp::{format_timestamp, parse_timestamp};
pub use traits::{DEFAULT_RETENTION_HOURS, HistoryStore};

/// Default data directory following platform conventions.
///
/// - Linux: `~/.local/share/aeroguard`
/// - macOS: `~/Library/Application Support/aeroguard`
/// - Windows: `C:\Users\<user>\AppData\Local\aeroguard`
pub fn default_data_dir() -> std::path::PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("aeroguard")
}

/// Default path of the flat history file.
pub fn default_csv_path() -> std::path::PathBuf {
    default_data_dir().join("history.csv")
}

/// Default path of the SQLite history database.
pub fn default_db_path() -> std::path::PathBuf {
    default_data_dir().join("history.db")
}

/// Create the parent directory of `path` if it does not exist yet.
pub(crate) fn ensure_parent_dir(path: &std::path::Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent).map_err(|e| Error::CreateDirectory {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    Ok(())
}
