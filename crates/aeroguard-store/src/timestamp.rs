//! Timestamp encoding for the flat history file.
//!
//! Timestamps are written as RFC 3339. On read, the space-separated
//! `YYYY-MM-DD HH:MM:SS[.fraction]` form written by spreadsheet and
//! dataframe tools is also accepted and interpreted as UTC.

use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

use crate::error::{Error, Result};

/// Format a timestamp for storage.
pub fn format_timestamp(timestamp: OffsetDateTime) -> Result<String> {
    timestamp
        .format(&Rfc3339)
        .map_err(|e| Error::InvalidTimestamp(e.to_string()))
}

/// Parse a stored timestamp.
pub fn parse_timestamp(s: &str) -> Result<OffsetDateTime> {
    let s = s.trim();
    if let Ok(ts) = OffsetDateTime::parse(s, &Rfc3339) {
        return Ok(ts);
    }

    let with_fraction =
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]");
    let without_fraction = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

    PrimitiveDateTime::parse(s, with_fraction)
        .or_else(|_| PrimitiveDateTime::parse(s, without_fraction))
        .map(PrimitiveDateTime::assume_utc)
        .map_err(|_| Error::InvalidTimestamp(s.to_string()))
}
