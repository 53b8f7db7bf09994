//! HTTP liveness probe
//!
//! # Request Flow
//!
//! 1. Parse the URL; anything but absolute http(s) is `malformed-url`
//! 2. Acquire the shared rate limiter
//! 3. Send HEAD (body is never transferred)
//!    - `405 Method Not Allowed` → one GET whose body is never read
//! 4. Handle redirects manually (bounded hop count)
//!    - Track visited URLs to detect loops
//!    - Every hop goes through the rate limiter again
//! 5. Classify the final status: 2xx is reachable, anything else is not
//!
//! No retries: a probe is best-effort and bounded by the client timeout.

use crate::config::{UserAgentConfig, VerifierConfig};
use crate::http::{build_http_client, ClientOptions};
use crate::limiter::RateLimiter;
use crate::verifier::{LinkProbe, LivenessVerdict, ProbeErrorKind};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::LOCATION;
use reqwest::{Client, Response, StatusCode};
use std::collections::HashSet;
use std::sync::Arc;
use url::Url;

/// Probes URLs with HEAD requests
#[derive(Debug, Clone)]
pub struct HttpProber {
    client: Client,
    limiter: Arc<RateLimiter>,
    max_redirects: u8,
    head_fallback_to_get: bool,
}

impl HttpProber {
    /// Creates a prober from the verifier configuration
    ///
    /// The client has automatic redirects disabled; hops are followed here.
    pub fn new(
        config: &VerifierConfig,
        user_agent: &UserAgentConfig,
        limiter: Arc<RateLimiter>,
    ) -> Result<Self, reqwest::Error> {
        let options = ClientOptions {
            timeout: config.probe_timeout(),
            connect_timeout: config.connect_timeout(),
            max_redirects: None,
        };
        let client = build_http_client(user_agent, &options)?;
        Ok(Self::with_client(
            client,
            limiter,
            config.max_redirects,
            config.head_fallback_to_get,
        ))
    }

    /// Creates a prober around an existing client
    ///
    /// The client must not follow redirects on its own.
    pub fn with_client(
        client: Client,
        limiter: Arc<RateLimiter>,
        max_redirects: u8,
        head_fallback_to_get: bool,
    ) -> Self {
        Self {
            client,
            limiter,
            max_redirects,
            head_fallback_to_get,
        }
    }

    /// Sends one paced request for `url`, falling back to GET on 405
    async fn request(&self, url: &Url) -> Result<Response, ProbeErrorKind> {
        self.limiter.acquire().await;
        let response = self
            .client
            .head(url.clone())
            .send()
            .await
            .map_err(|e| classify_error(&e))?;

        if response.status() != StatusCode::METHOD_NOT_ALLOWED || !self.head_fallback_to_get {
            return Ok(response);
        }

        tracing::trace!("HEAD not allowed for {}, retrying as GET", url);
        self.limiter.acquire().await;

        // Dropping the response without reading it abandons the body
        self.client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| classify_error(&e))
    }
}

#[async_trait]
impl LinkProbe for HttpProber {
    async fn check(&self, url: &str) -> LivenessVerdict {
        let checked_at = Utc::now();

        let mut current = match parse_probe_url(url) {
            Some(parsed) => parsed,
            None => return LivenessVerdict::failed(url, ProbeErrorKind::MalformedUrl, checked_at),
        };

        let mut visited = HashSet::new();
        visited.insert(current.to_string());
        let mut redirects: u8 = 0;

        loop {
            let response = match self.request(&current).await {
                Ok(response) => response,
                Err(kind) => {
                    tracing::debug!("Probe of {} failed: {}", current, kind);
                    let mut verdict = LivenessVerdict::failed(url, kind, checked_at);
                    verdict.redirects = redirects;
                    return verdict;
                }
            };

            let status = response.status();
            let location = if status.is_redirection() {
                response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string)
            } else {
                None
            };

            // A redirect without a usable Location is judged on its status
            let Some(location) = location else {
                return LivenessVerdict::answered(
                    url,
                    status.as_u16(),
                    current.as_str(),
                    redirects,
                    checked_at,
                );
            };

            let next = match current.join(&location) {
                Ok(next) if matches!(next.scheme(), "http" | "https") => next,
                _ => {
                    let mut verdict =
                        LivenessVerdict::failed(url, ProbeErrorKind::MalformedUrl, checked_at);
                    verdict.status_code = Some(status.as_u16());
                    verdict.redirects = redirects;
                    return verdict;
                }
            };

            if redirects >= self.max_redirects {
                let mut verdict =
                    LivenessVerdict::failed(url, ProbeErrorKind::TooManyRedirects, checked_at);
                verdict.status_code = Some(status.as_u16());
                verdict.redirects = redirects;
                return verdict;
            }

            if !visited.insert(next.to_string()) {
                let mut verdict =
                    LivenessVerdict::failed(url, ProbeErrorKind::RedirectLoop, checked_at);
                verdict.status_code = Some(status.as_u16());
                verdict.redirects = redirects;
                return verdict;
            }

            tracing::trace!("{} redirected to {}", current, next);
            redirects += 1;
            current = next;
        }
    }
}

fn parse_probe_url(url: &str) -> Option<Url> {
    let parsed = Url::parse(url.trim()).ok()?;
    if matches!(parsed.scheme(), "http" | "https") && parsed.host_str().is_some() {
        Some(parsed)
    } else {
        None
    }
}

/// Maps a transport failure to an error kind
fn classify_error(err: &reqwest::Error) -> ProbeErrorKind {
    if err.is_timeout() {
        return ProbeErrorKind::Timeout;
    }
    if err.is_builder() {
        return ProbeErrorKind::MalformedUrl;
    }
    if err.is_connect() && is_connection_refused(err) {
        return ProbeErrorKind::ConnectionRefused;
    }
    ProbeErrorKind::Network
}

fn is_connection_refused(err: &reqwest::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = std::error::Error::source(err);
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            if io.kind() == std::io::ErrorKind::ConnectionRefused {
                return true;
            }
        }
        source = cause.source();
    }
    false
}
