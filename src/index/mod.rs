//! Package index access
//!
//! The index is treated as a black box with two operations: a paginated
//! listing of package names and a per-package metadata document. The
//! [`PackageIndex`] trait is the seam the scraper works against;
//! [`PypiIndex`] talks to the real Python Package Index.
//!
//! Callers are responsible for pacing: acquire the shared rate limiter before
//! every call.

mod pypi;

pub use pypi::PypiIndex;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// One page of the name listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamePage {
    /// Package names on this page
    pub names: Vec<String>,

    /// Cursor of the following page; `None` on the last page
    pub next_cursor: Option<String>,
}

impl NamePage {
    /// A final page holding `names`
    pub fn last(names: Vec<String>) -> Self {
        Self {
            names,
            next_cursor: None,
        }
    }
}

/// Errors returned by index calls
#[derive(Debug, Error)]
pub enum FetchError {
    /// Timeouts, connection resets, 5xx: worth retrying after a pause
    #[error("Transient failure for {url}: {message}")]
    Transient { url: String, message: String },

    /// The index answered 429
    #[error("Rate limited by {url}")]
    RateLimited {
        url: String,
        retry_after: Option<Duration>,
    },

    /// 404/410 and other client errors: retrying will not help
    #[error("Permanent failure for {url} (status {status:?})")]
    Permanent { url: String, status: Option<u16> },

    /// The response could not be understood
    #[error("Malformed document from {url}: {message}")]
    Malformed { url: String, message: String },
}

impl FetchError {
    /// Whether another attempt may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. } | Self::RateLimited { .. })
    }

    /// HTTP status code associated with the failure, if any
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::RateLimited { .. } => Some(429),
            Self::Permanent { status, .. } => *status,
            _ => None,
        }
    }

    /// Short label used in logs and skip records
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transient { .. } => "transient",
            Self::RateLimited { .. } => "rate-limited",
            Self::Permanent { status: Some(404), .. } => "not-found",
            Self::Permanent { status: Some(410), .. } => "gone",
            Self::Permanent { .. } => "permanent",
            Self::Malformed { .. } => "malformed",
        }
    }

    /// Classifies a non-success status code
    pub fn from_status(url: &str, status: StatusCode, retry_after: Option<Duration>) -> Self {
        let url = url.to_string();
        match status.as_u16() {
            429 => Self::RateLimited { url, retry_after },
            408 => Self::Transient {
                url,
                message: "HTTP 408".to_string(),
            },
            code if status.is_server_error() => Self::Transient {
                url,
                message: format!("HTTP {}", code),
            },
            code => Self::Permanent {
                url,
                status: Some(code),
            },
        }
    }

    /// Classifies a client-side request failure
    pub fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        let url = url.to_string();
        if err.is_timeout() {
            Self::Transient {
                url,
                message: "Request timeout".to_string(),
            }
        } else if err.is_connect() {
            Self::Transient {
                url,
                message: format!("Connection failed: {}", err),
            }
        } else if err.is_decode() {
            Self::Malformed {
                url,
                message: err.to_string(),
            }
        } else if err.is_builder() {
            Self::Permanent { url, status: None }
        } else {
            Self::Transient {
                url,
                message: err.to_string(),
            }
        }
    }
}

/// A package index
#[async_trait]
pub trait PackageIndex: Send + Sync {
    /// Fetches one page of package names
    ///
    /// `cursor` is `None` for the first page and otherwise a value previously
    /// returned in [`NamePage::next_cursor`].
    async fn list_page(&self, cursor: Option<&str>) -> Result<NamePage, FetchError>;

    /// Fetches the metadata document of one package
    async fn fetch_metadata(&self, name: &str) -> Result<Value, FetchError>;
}
