//! pypi-rot: measuring package rot on the Python Package Index
//!
//! This crate harvests package metadata from PyPI under a strict rate limit,
//! keeps it in a crash-safe cache that survives restarts, and compiles a
//! dataset by re-checking whether every URL referenced in that metadata still
//! resolves.

pub mod config;
pub mod dataset;
pub mod http;
pub mod index;
pub mod limiter;
pub mod output;
pub mod scraper;
pub mod shutdown;
pub mod storage;
pub mod verifier;

use thiserror::Error;

/// Main error type for pypi-rot operations
#[derive(Debug, Error)]
pub enum RotError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Index error: {0}")]
    Fetch(#[from] index::FetchError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
///
/// These are the only errors that abort the process; everything that happens
/// per package is logged and skipped.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Cache directory {path} is not usable: {reason}")]
    CacheDir { path: String, reason: String },

    #[error("Output path {path} is not writable: {reason}")]
    OutputPath { path: String, reason: String },
}

/// Result type alias for pypi-rot operations
pub type Result<T> = std::result::Result<T, RotError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use limiter::{PermitLedger, RateLimiter};
pub use shutdown::Shutdown;
pub use storage::{MetadataRecord, MetadataStore, SqliteStore};
pub use verifier::{LivenessVerdict, ProbeErrorKind, UrlReference, UrlRole};
