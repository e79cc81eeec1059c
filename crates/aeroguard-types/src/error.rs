//! Error types for data parsing in aeroguard-types.

use thiserror::Error;

/// Errors that can occur when parsing AeroGuard values from text.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// The text does not name a known severity category.
    #[error("Unknown AQI category: {0}")]
    UnknownCategory(String),
}

/// Result type alias using aeroguard-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
