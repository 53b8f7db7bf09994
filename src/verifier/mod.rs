//! URL liveness verification
//!
//! This module handles the second half of the pipeline:
//! - Extracting URL references from stored metadata documents
//! - Probing each URL with a header-only request through the shared limiter
//! - Classifying the outcome as a [`LivenessVerdict`]

mod extract;
mod probe;

pub use extract::extract_urls;
pub use probe::HttpProber;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;

/// Semantic role of a URL within a metadata document
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UrlRole {
    Homepage,
    Download,
    ProjectPage,
    Documentation,
    IssueTracker,
    /// An entry of `project_urls`, with its label
    ProjectUrl(String),
    /// Any other key, with the key the URL was found under
    Other(String),
}

impl UrlRole {
    /// Role categories in output column order
    pub const CATEGORIES: [&'static str; 7] = [
        "homepage",
        "download",
        "project_page",
        "documentation",
        "issue_tracker",
        "project_url",
        "other",
    ];

    /// Category name, without the label
    pub fn category(&self) -> &'static str {
        match self {
            Self::Homepage => "homepage",
            Self::Download => "download",
            Self::ProjectPage => "project_page",
            Self::Documentation => "documentation",
            Self::IssueTracker => "issue_tracker",
            Self::ProjectUrl(_) => "project_url",
            Self::Other(_) => "other",
        }
    }
}

impl fmt::Display for UrlRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProjectUrl(label) | Self::Other(label) if !label.is_empty() => {
                write!(f, "{}:{}", self.category(), label)
            }
            _ => f.write_str(self.category()),
        }
    }
}

/// A URL found in a metadata document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlReference {
    pub url: String,
    pub role: UrlRole,
}

/// Why a probe could not complete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeErrorKind {
    Timeout,
    ConnectionRefused,
    MalformedUrl,
    TooManyRedirects,
    RedirectLoop,
    /// DNS, TLS and other transport failures
    Network,
}

impl ProbeErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::ConnectionRefused => "connection-refused",
            Self::MalformedUrl => "malformed-url",
            Self::TooManyRedirects => "too-many-redirects",
            Self::RedirectLoop => "redirect-loop",
            Self::Network => "network",
        }
    }
}

impl fmt::Display for ProbeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of probing one URL
#[derive(Debug, Clone, PartialEq)]
pub struct LivenessVerdict {
    pub url: String,

    /// True only when the final response had a success status
    pub reachable: bool,

    /// Status of the last response received, if any
    pub status_code: Option<u16>,

    pub checked_at: DateTime<Utc>,

    /// Set when the probe could not complete
    pub error: Option<ProbeErrorKind>,

    /// URL of the last response after following redirects
    pub final_url: Option<String>,

    /// Redirect hops followed
    pub redirects: u8,
}

impl LivenessVerdict {
    /// A verdict for a probe that could not complete
    pub fn failed(url: impl Into<String>, error: ProbeErrorKind, checked_at: DateTime<Utc>) -> Self {
        Self {
            url: url.into(),
            reachable: false,
            status_code: None,
            checked_at,
            error: Some(error),
            final_url: None,
            redirects: 0,
        }
    }

    /// A verdict for a probe that got an answer
    pub fn answered(
        url: impl Into<String>,
        status_code: u16,
        final_url: impl Into<String>,
        redirects: u8,
        checked_at: DateTime<Utc>,
    ) -> Self {
        Self {
            url: url.into(),
            reachable: (200..300).contains(&status_code),
            status_code: Some(status_code),
            checked_at,
            error: None,
            final_url: Some(final_url.into()),
            redirects,
        }
    }
}

/// Something that can tell whether a URL still resolves
///
/// Implementations never fail: every outcome is expressed as a verdict.
#[async_trait]
pub trait LinkProbe: Send + Sync {
    async fn check(&self, url: &str) -> LivenessVerdict;
}
