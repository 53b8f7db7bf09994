use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for pypi-rot
///
/// Every section has defaults, so an empty (or absent) file is valid once the
/// contact email has been supplied on the command line.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub index: IndexConfig,
    pub limiter: LimiterConfig,
    pub scraper: ScraperConfig,
    pub verifier: VerifierConfig,
    pub cache: CacheConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
}

impl Config {
    /// Builds a default configuration carrying the given contact email
    pub fn with_email(email: impl Into<String>) -> Self {
        let mut config = Self::default();
        config.user_agent.contact_email = email.into();
        config
    }
}

/// Package index endpoint configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct IndexConfig {
    /// Base URL of the index (listing lives at `/simple/`, metadata at `/pypi/<name>/json`)
    pub base_url: String,

    /// Total timeout for a single index request (seconds)
    pub request_timeout_secs: u64,

    /// Connection timeout for a single index request (seconds)
    pub connect_timeout_secs: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            base_url: "https://pypi.org".to_string(),
            request_timeout_secs: 10,
            connect_timeout_secs: 5,
        }
    }
}

impl IndexConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Shared outbound rate limit
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct LimiterConfig {
    /// Minimum time between any two outbound requests (milliseconds)
    pub min_interval_ms: u64,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: 1000,
        }
    }
}

impl LimiterConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}

/// Perpetual scraper behaviour
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ScraperConfig {
    /// Cached metadata younger than this is not refetched (days)
    pub freshness_days: u64,

    /// Packages recorded as permanently skipped are not retried for this long (days)
    pub skip_window_days: u64,

    /// Total attempts for a transiently failing fetch
    pub max_attempts: u32,

    /// First retry delay (milliseconds), doubled on every further attempt
    pub backoff_base_ms: u64,

    /// Upper bound on a single retry delay (milliseconds)
    pub backoff_max_ms: u64,

    /// Multiplier applied to the backoff when the index answers 429
    pub rate_limited_multiplier: u32,

    /// Upper bound on a single delay after a 429, `Retry-After` included (milliseconds)
    pub rate_limited_max_ms: u64,

    /// Pause between two full enumeration passes (seconds)
    pub idle_between_passes_secs: u64,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            freshness_days: 30,
            skip_window_days: 30,
            max_attempts: 4,
            backoff_base_ms: 2_000,
            backoff_max_ms: 60_000,
            rate_limited_multiplier: 4,
            rate_limited_max_ms: 600_000,
            idle_between_passes_secs: 0,
        }
    }
}

impl ScraperConfig {
    pub fn freshness(&self) -> chrono::Duration {
        chrono::Duration::days(self.freshness_days as i64)
    }

    pub fn skip_window(&self) -> chrono::Duration {
        chrono::Duration::days(self.skip_window_days as i64)
    }

    pub fn idle_between_passes(&self) -> Duration {
        Duration::from_secs(self.idle_between_passes_secs)
    }
}

/// URL liveness probing
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct VerifierConfig {
    /// Total timeout for one probe request (seconds)
    pub probe_timeout_secs: u64,

    /// Connection timeout for one probe request (seconds)
    pub connect_timeout_secs: u64,

    /// Maximum redirect hops followed before giving up
    pub max_redirects: u8,

    /// Retry with GET when a host rejects HEAD with 405
    pub head_fallback_to_get: bool,

    /// Also check every file URL of every historical release
    pub include_release_history: bool,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            probe_timeout_secs: 10,
            connect_timeout_secs: 5,
            max_redirects: 5,
            head_fallback_to_get: true,
            include_release_history: false,
        }
    }
}

impl VerifierConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Durable metadata cache location
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CacheConfig {
    /// Directory holding the metadata database
    pub dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("cache"),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct UserAgentConfig {
    /// Name of the harvester
    pub crawler_name: String,

    /// Version of the harvester
    pub crawler_version: String,

    /// Email address remote operators can use to reach the process owner
    pub contact_email: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: env!("CARGO_PKG_NAME").to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_email: String::new(),
        }
    }
}
