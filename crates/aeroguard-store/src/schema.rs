//! Database schema and migrations.

use rusqlite::Connection;

use crate::error::{Error, Result};

/// Current schema version.
///
/// Version 1 stored whole Unix seconds in UTC. Version 2 stores Unix
/// nanoseconds plus the record's UTC offset in seconds.
pub const SCHEMA_VERSION: i32 = 2;

/// Initialize the database schema.
///
/// A database written by a newer version is rejected.
pub fn initialize(conn: &Connection) -> Result<()> {
    let version = get_schema_version(conn)?;

    match version {
        0 => {
            create_schema(conn)?;
            set_schema_version(conn, SCHEMA_VERSION)?;
        }
        1 => migrate_v1_to_v2(conn)?,
        SCHEMA_VERSION => {}
        other => {
            return Err(Error::Corrupt(format!(
                "unsupported schema version {other} (expected at most {SCHEMA_VERSION})"
            )));
        }
    }

    Ok(())
}

/// Get the current schema version.
fn get_schema_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='schema_version'",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version: i32 =
        conn.query_row("SELECT version FROM schema_version", [], |row| row.get(0))?;

    Ok(version)
}

/// Set the schema version.
fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_version (id, version) VALUES (1, ?)",
        [version],
    )?;
    Ok(())
}

/// Create the current schema.
fn create_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            version INTEGER NOT NULL
        );

        -- Rolling AQI history; duplicate timestamps are allowed
        CREATE TABLE IF NOT EXISTS history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp INTEGER NOT NULL,
            utc_offset INTEGER NOT NULL DEFAULT 0,
            location TEXT NOT NULL,
            aqi INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_history_location_time
            ON history(location, timestamp);
        CREATE INDEX IF NOT EXISTS idx_history_time
            ON history(timestamp);
        "#,
    )?;

    Ok(())
}

/// Convert second-resolution UTC rows to nanoseconds with an offset column.
fn migrate_v1_to_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        BEGIN;
        ALTER TABLE history ADD COLUMN utc_offset INTEGER NOT NULL DEFAULT 0;
        UPDATE history SET timestamp = timestamp * 1000000000;
        UPDATE schema_version SET version = 2 WHERE id = 1;
        COMMIT;
        "#,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_fresh_database() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        assert!(tables.contains(&"history".to_string()));
        assert!(tables.contains(&"schema_version".to_string()));
    }

    #[test]
    fn test_schema_version_tracking() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), 0);

        initialize(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);

        // Idempotent
        initialize(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_migrate_v1_rows_to_nanoseconds() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE schema_version (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                version INTEGER NOT NULL
            );
            INSERT INTO schema_version (id, version) VALUES (1, 1);
            CREATE TABLE history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp INTEGER NOT NULL,
                location TEXT NOT NULL,
                aqi INTEGER NOT NULL
            );
            INSERT INTO history (timestamp, location, aqi) VALUES (1730534400, 'Colaba', 42);
            "#,
        )
        .unwrap();

        initialize(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);

        let (ts, offset): (i64, i64) = conn
            .query_row("SELECT timestamp, utc_offset FROM history", [], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .unwrap();
        assert_eq!(ts, 1_730_534_400_000_000_000);
        assert_eq!(offset, 0);
    }

    #[test]
    fn test_newer_schema_is_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        set_schema_version(&conn, SCHEMA_VERSION + 1).unwrap();

        assert!(matches!(initialize(&conn), Err(Error::Corrupt(_))));
    }
}
