//! Shared HTTP client construction
//!
//! Every outbound request (index listing, metadata fetch, liveness probe)
//! goes through a client built here, so every request carries the operator's
//! contact email in its user agent and has a bounded timeout.

use crate::config::UserAgentConfig;
use reqwest::{redirect::Policy, Client};
use std::time::Duration;

/// Timeouts and redirect behaviour for one client
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Total time allowed for one request
    pub timeout: Duration,

    /// Time allowed to establish the connection
    pub connect_timeout: Duration,

    /// Redirect policy; `None` disables automatic redirects entirely
    pub max_redirects: Option<usize>,
}

/// Formats the user agent string
///
/// Format: `name/version (email)`
pub fn user_agent_string(config: &UserAgentConfig) -> String {
    format!(
        "{}/{} ({})",
        config.crawler_name, config.crawler_version, config.contact_email
    )
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `options` - Timeouts and redirect policy
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use pypi_rot::config::UserAgentConfig;
/// use pypi_rot::http::{build_http_client, ClientOptions};
/// use std::time::Duration;
///
/// let config = UserAgentConfig {
///     crawler_name: "pypi-rot".to_string(),
///     crawler_version: "0.1.0".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
/// let options = ClientOptions {
///     timeout: Duration::from_secs(10),
///     connect_timeout: Duration::from_secs(5),
///     max_redirects: None,
/// };
///
/// let client = build_http_client(&config, &options).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    options: &ClientOptions,
) -> Result<Client, reqwest::Error> {
    let redirect = match options.max_redirects {
        Some(hops) => Policy::limited(hops),
        None => Policy::none(),
    };

    Client::builder()
        .user_agent(user_agent_string(config))
        .timeout(options.timeout)
        .connect_timeout(options.connect_timeout)
        .redirect(redirect)
        .gzip(true)
        .brotli(true)
        .build()
}
