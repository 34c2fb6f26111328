//! Error types for the NOTAM service.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// No record with the requested id
    #[error("Not found: {0}")]
    NotFound(String),

    /// The data source could not deliver a fresh record set
    #[error("Upstream fetch failed: {0}")]
    UpstreamFetch(String),

    /// Reading or writing the backing file failed
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Malformed request parameters or records
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Numeric input outside its domain (NaN, out-of-range coordinates)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("A refresh is already in progress")]
    RefreshInProgress,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Persistence(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Persistence(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::UpstreamFetch(e.to_string())
    }
}
