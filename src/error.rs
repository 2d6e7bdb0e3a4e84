/// Error types for the ipregion library
use std::io;
use thiserror::Error;

/// Result type alias for ipregion operations
pub type Result<T> = std::result::Result<T, GeoError>;

/// Main error type for database parsing, lookup and acquisition
#[derive(Debug, Error)]
pub enum GeoError {
    /// Input was not a well-formed IPv4 address (caller error)
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Structural validation of the database image failed
    #[error("Corrupt database: {0}")]
    CorruptDatabase(String),

    /// A region record was not valid UTF-8
    #[error("Invalid UTF-8 in region record at offset {offset}: {source}")]
    Encoding {
        /// Offset of the record in the database image
        offset: u32,
        /// Underlying decode failure
        #[source]
        source: std::str::Utf8Error,
    },

    /// Builder input was rejected (bad line, overlap, oversized record)
    #[error("Invalid source data: {0}")]
    InvalidSource(String),

    /// Neither the cache nor any mirror produced a usable database
    #[error("Acquisition failed: {0}")]
    AcquisitionFailed(String),

    /// No segment owns the address (the partition invariant is broken)
    #[error("No segment found for {}", crate::address::display_ipv4(.0))]
    NotFound(u32),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Configuration loading errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl GeoError {
    /// Shorthand for a `CorruptDatabase` error
    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        GeoError::CorruptDatabase(msg.into())
    }
}

impl From<::config::ConfigError> for GeoError {
    fn from(err: ::config::ConfigError) -> Self {
        GeoError::Config(err.to_string())
    }
}
