//! Error types for aeroguard-core.
//!
//! Every fetch failure mode (network error, timeout, non-success status,
//! malformed payload) is transient from the pipeline's point of view: the
//! ingestor marks the location absent for the current cycle and the next
//! cycle retries naturally. Nothing here is fatal to the process.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while fetching, storing or forecasting readings.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// HTTP request failed before a response was received.
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider answered with a non-success status.
    #[error("{provider} returned HTTP {status}")]
    Status {
        /// Provider name.
        provider: &'static str,
        /// HTTP status code.
        status: u16,
    },

    /// The provider answered but the payload is unusable.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// The fetch did not complete within the per-call timeout.
    #[error("Fetch timed out after {0:?}")]
    Timeout(Duration),

    /// A source-specific failure.
    #[error("Source error: {0}")]
    Source(String),
}

impl Error {
    /// Create an invalid payload error.
    pub fn invalid_payload(message: impl Into<String>) -> Self {
        Error::InvalidPayload(message.into())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::InvalidPayload(e.to_string())
    }
}

/// Result type alias using aeroguard-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Status {
            provider: "waqi",
            status: 503,
        };
        assert_eq!(err.to_string(), "waqi returned HTTP 503");

        let err = Error::Timeout(Duration::from_secs(10));
        assert!(err.to_string().contains("10s"));
    }

    #[test]
    fn test_json_error_is_invalid_payload() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::InvalidPayload(_)));
    }
}
