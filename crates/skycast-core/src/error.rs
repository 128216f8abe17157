//! Centralized error types for SkyCast.
//!
//! No error escapes an orchestrator entry point. Each one ends up as a
//! user-facing sentence or a logged event:
//! - `ValidationError`: missing input, shown verbatim
//! - `NetworkError`: anything between building a URL and decoding a body
//! - `PersistenceError`: local storage, logged and dropped

use thiserror::Error;

/// Failures talking to an upstream HTTP service.
///
/// The `Display` text is what ends up in the presentation state's error
/// message, so variants carry enough detail to be read by a person.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum NetworkError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Server error: {status} - {message}")]
    ServerError { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("No results found for {0}")]
    NotFound(String),
}

/// A required input field was left empty.
///
/// The `Display` text is the exact sentence shown next to the form.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please enter a city")]
    MissingCity,

    #[error("Please select a state")]
    MissingRegion,

    #[error("Please enter a zip code")]
    MissingPostalCode,
}

/// Local storage errors (last location file, icon cache database).
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Data corruption detected: {0}")]
    Corruption(String),
}

/// Extension trait for converting reqwest errors to our error types.
pub trait ReqwestErrorExt {
    fn into_network_error(self) -> NetworkError;
}

impl ReqwestErrorExt for reqwest::Error {
    fn into_network_error(self) -> NetworkError {
        if self.is_timeout() {
            NetworkError::Timeout
        } else if self.is_decode() {
            NetworkError::InvalidResponse(self.to_string())
        } else if self.is_builder() {
            NetworkError::InvalidUrl(self.to_string())
        } else if self.is_connect() {
            NetworkError::ConnectionFailed(self.to_string())
        } else if let Some(status) = self.status() {
            NetworkError::ServerError {
                status: status.as_u16(),
                message: self.to_string(),
            }
        } else {
            NetworkError::ConnectionFailed(self.to_string())
        }
    }
}

/// Extension trait for converting rusqlite errors to our error types.
pub trait RusqliteErrorExt {
    fn into_persistence_error(self) -> PersistenceError;
}

impl RusqliteErrorExt for rusqlite::Error {
    fn into_persistence_error(self) -> PersistenceError {
        match &self {
            rusqlite::Error::SqliteFailure(e, _)
                if matches!(
                    e.code,
                    rusqlite::ErrorCode::DatabaseCorrupt | rusqlite::ErrorCode::NotADatabase
                ) =>
            {
                PersistenceError::Corruption(self.to_string())
            }
            _ => PersistenceError::QueryFailed(self.to_string()),
        }
    }
}
