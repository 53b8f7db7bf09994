//! Python Package Index client
//!
//! - Listing: `GET /simple/` using the JSON flavour of the simple API
//!   (`application/vnd.pypi.simple.v1+json`). PyPI serves the whole listing
//!   as a single page.
//! - Metadata: `GET /pypi/<name>/json`, with the name in its normalized
//!   form so PyPI answers directly instead of redirecting.
//!
//! Redirects are never followed: every request must map to exactly one
//! limiter permit, and a 3xx is reported as a permanent failure.

use crate::config::{IndexConfig, UserAgentConfig};
use crate::http::{build_http_client, ClientOptions};
use crate::index::{FetchError, NamePage, PackageIndex};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, RETRY_AFTER};
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use url::Url;

const SIMPLE_JSON: &str = "application/vnd.pypi.simple.v1+json";


#[derive(Debug, Deserialize)]
struct SimpleIndex {
    projects: Vec<SimpleProject>,
}

#[derive(Debug, Deserialize)]
struct SimpleProject {
    name: String,
}

/// Client for the PyPI JSON APIs
#[derive(Debug, Clone)]
pub struct PypiIndex {
    client: Client,
    base_url: Url,
}

impl PypiIndex {
    /// Creates a client against the configured index
    pub fn new(index: &IndexConfig, user_agent: &UserAgentConfig) -> crate::Result<Self> {
        let options = ClientOptions {
            timeout: index.request_timeout(),
            connect_timeout: index.connect_timeout(),
            max_redirects: None,
        };
        let client = build_http_client(user_agent, &options)?;
        let base_url = Url::parse(&index.base_url)?;
        Ok(Self { client, base_url })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, FetchError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| FetchError::Permanent {
                url: self.base_url.to_string(),
                status: None,
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn listing_url(&self) -> Result<Url, FetchError> {
        // Trailing empty segment gives the canonical `/simple/`
        self.endpoint(&["simple", ""])
    }

    fn metadata_url(&self, name: &str) -> Result<Url, FetchError> {
        self.endpoint(&["pypi", &normalize_name(name), "json"])
    }

    async fn get(&self, url: &Url, accept: &str) -> Result<Response, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .header(ACCEPT, accept)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url.as_str(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::from_status(
                url.as_str(),
                status,
                retry_after(&response),
            ));
        }

        Ok(response)
    }
}

/// Normalizes a project name the way PyPI does
///
/// Lowercases it and collapses every run of `-`, `_` and `.` into one `-`.
pub fn normalize_name(name: &str) -> String {
    let mut normalized = String::with_capacity(name.len());
    let mut in_separator = false;

    for c in name.trim().chars() {
        if matches!(c, '-' | '_' | '.') {
            if !in_separator {
                normalized.push('-');
                in_separator = true;
            }
        } else {
            normalized.extend(c.to_lowercase());
            in_separator = false;
        }
    }

    normalized
}

/// Reads a `Retry-After` header
fn retry_after(response: &Response) -> Option<Duration> {
    let value = response.headers().get(RETRY_AFTER)?.to_str().ok()?;
    parse_retry_after(value, Utc::now())
}

/// Parses `Retry-After` as delta seconds or as an HTTP-date relative to `now`
///
/// A date in the past means "retry now".
fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    match DateTime::parse_from_rfc2822(value) {
        Ok(at) => Some(
            (at.with_timezone(&Utc) - now)
                .to_std()
                .unwrap_or(Duration::ZERO),
        ),
        Err(_) => {
            tracing::debug!("Ignoring unparseable Retry-After {:?}", value);
            None
        }
    }
}

#[async_trait]
impl PackageIndex for PypiIndex {
    async fn list_page(&self, cursor: Option<&str>) -> Result<NamePage, FetchError> {
        if let Some(cursor) = cursor {
            // PyPI never hands out cursors, so a stored one means the listing was done
            tracing::debug!("Ignoring listing cursor {:?}; PyPI serves a single page", cursor);
            return Ok(NamePage::default());
        }

        let url = self.listing_url()?;
        let response = self.get(&url, SIMPLE_JSON).await?;
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url.as_str(), e))?;

        let index: SimpleIndex =
            serde_json::from_str(&body).map_err(|e| FetchError::Malformed {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let names = index.projects.into_iter().map(|p| p.name).collect();
        Ok(NamePage::last(names))
    }

    async fn fetch_metadata(&self, name: &str) -> Result<Value, FetchError> {
        let url = self.metadata_url(name)?;
        let response = self.get(&url, "application/json").await?;
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url.as_str(), e))?;

        let document: Value =
            serde_json::from_str(&body).map_err(|e| FetchError::Malformed {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        if !document.is_object() {
            return Err(FetchError::Malformed {
                url: url.to_string(),
                message: "expected a JSON object".to_string(),
            });
        }

        Ok(document)
    }
}
