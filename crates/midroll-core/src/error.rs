//! Error types for the ad engine
//!
//! Almost every failure in this domain degrades rather than aborts: a broken
//! ad ends the break and content resumes, a failed tracking beacon is logged
//! and forgotten. The variants here cover the places where an error is still
//! worth returning to the caller.

use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ad engine error types
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Invalid ads configuration: {0}")]
    InvalidConfig(String),

    // Network errors
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns true if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Network(_))
    }

    /// Returns the error code for tracking payloads
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::Network(_) => "NETWORK",
            Error::Internal(_) => "INTERNAL",
        }
    }
}
