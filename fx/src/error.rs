//! Rate store error types.

use oxrates_common::Currency;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur in the rate store.
///
/// [`FxError::UnsupportedCurrency`] is the only error raised by rate
/// resolution itself. Every other variant is a data acquisition failure:
/// fetching, reading, writing or parsing the rates document went wrong and
/// the table was left as it was.
#[derive(Debug, Error)]
pub enum FxError {
    /// The currency cannot be related to the base currency.
    #[error("Unsupported currency: {0}")]
    UnsupportedCurrency(Currency),

    /// The remote request could not be completed.
    #[error("Rate source request failed: {0}")]
    Network(String),

    /// The remote source answered with a non-success status.
    #[error("Rate source returned HTTP {status}")]
    HttpStatus { status: u16 },

    /// Reading or writing the cache file failed.
    #[error("Cache file error at {}: {source}", .path.display())]
    CacheIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document is not valid JSON or lacks an expected field.
    #[error("Malformed rates document: {0}")]
    MalformedDocument(String),

    /// A rate entry is not a positive decimal number.
    #[error("Invalid rate for {currency}: {value}")]
    InvalidRate { currency: Currency, value: String },

    /// The document timestamp is not whole unix seconds.
    #[error("Invalid document timestamp: {0}")]
    InvalidTimestamp(String),

    /// The store was asked to do something its configuration does not allow.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl FxError {
    /// Check if this error came from acquiring the rates document.
    pub fn is_data_acquisition(&self) -> bool {
        matches!(
            self,
            FxError::Network(_)
                | FxError::HttpStatus { .. }
                | FxError::CacheIo { .. }
                | FxError::MalformedDocument(_)
                | FxError::InvalidRate { .. }
                | FxError::InvalidTimestamp(_)
        )
    }

    /// Get a stable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            FxError::UnsupportedCurrency(_) => "UNSUPPORTED_CURRENCY",
            FxError::Network(_) => "NETWORK_ERROR",
            FxError::HttpStatus { .. } => "HTTP_STATUS",
            FxError::CacheIo { .. } => "CACHE_IO",
            FxError::MalformedDocument(_) => "MALFORMED_DOCUMENT",
            FxError::InvalidRate { .. } => "INVALID_RATE",
            FxError::InvalidTimestamp(_) => "INVALID_TIMESTAMP",
            FxError::Configuration(_) => "CONFIGURATION_ERROR",
        }
    }
}

/// Result type for rate store operations.
pub type FxResult<T> = Result<T, FxError>;
