//! Filegate Error Types

use thiserror::Error;

/// Result type alias for Filegate operations
pub type Result<T> = std::result::Result<T, Error>;

/// Filegate error types
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Configuration serialization error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    // Request errors, rejected before the backend is contacted
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    // Backend errors
    #[error("{0}")]
    Backend(String),

    #[error("{0}")]
    Http(#[from] reqwest::Error),

    #[error("Malformed backend response: {0}")]
    Decode(#[from] serde_json::Error),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}
