//! Error Types

use thiserror::Error;

/// Result type alias for record store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Record store errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// Store could not be reached (network, timeout, 5xx)
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Store refused the request (constraint violation, bad filter, 4xx)
    #[error("Store rejected request: {0}")]
    Rejected(String),

    /// Row came back in a shape we could not decode
    #[error("Record decode error: {0}")]
    Decode(String),

    /// Store is misconfigured (bad URL, missing key)
    #[error("Store configuration error: {0}")]
    Config(String),
}
