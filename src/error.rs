//! Error Handling Module
//!
//! This module defines the error type shared by the geolocation cache and the
//! DNS checker, built with the `thiserror` crate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GeoError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid IP address: {0}")]
    Validation(String),

    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GeoError {
    /// True for failures that came from the upstream service or the transport.
    pub fn is_network(&self) -> bool {
        matches!(self, GeoError::Http(_) | GeoError::Network(_))
    }

    /// True for failures that came from the local database.
    pub fn is_storage(&self) -> bool {
        matches!(self, GeoError::Db(_) | GeoError::Storage(_))
    }
}

pub type Result<T> = std::result::Result<T, GeoError>;
