use crate::config::types::{
    CacheConfig, Config, IndexConfig, LimiterConfig, ScraperConfig, UserAgentConfig,
    VerifierConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_index_config(&config.index)?;
    validate_limiter_config(&config.limiter)?;
    validate_scraper_config(&config.scraper)?;
    validate_verifier_config(&config.verifier)?;
    validate_cache_config(&config.cache)?;
    validate_user_agent_config(&config.user_agent)?;
    Ok(())
}

fn validate_index_config(config: &IndexConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid index base-url: {}", e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl(format!(
            "Index base-url must use http or https, got '{}'",
            config.base_url
        )));
    }

    if config.request_timeout_secs == 0 || config.connect_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "index timeouts must be at least one second".to_string(),
        ));
    }

    Ok(())
}

fn validate_limiter_config(config: &LimiterConfig) -> Result<(), ConfigError> {
    // The index publishes a budget of roughly one request per second
    if config.min_interval_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "min-interval-ms must be >= 100ms, got {}ms",
            config.min_interval_ms
        )));
    }

    Ok(())
}

fn validate_scraper_config(config: &ScraperConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 || config.max_attempts > 10 {
        return Err(ConfigError::Validation(format!(
            "max-attempts must be between 1 and 10, got {}",
            config.max_attempts
        )));
    }

    if config.freshness_days > 36_500 || config.skip_window_days > 36_500 {
        return Err(ConfigError::Validation(
            "freshness-days and skip-window-days must be <= 36500".to_string(),
        ));
    }

    if config.backoff_base_ms > config.backoff_max_ms {
        return Err(ConfigError::Validation(format!(
            "backoff-base-ms ({}) cannot exceed backoff-max-ms ({})",
            config.backoff_base_ms, config.backoff_max_ms
        )));
    }

    if config.rate_limited_multiplier < 1 {
        return Err(ConfigError::Validation(
            "rate-limited-multiplier must be >= 1".to_string(),
        ));
    }

    if config.rate_limited_max_ms < config.backoff_max_ms {
        return Err(ConfigError::Validation(format!(
            "rate-limited-max-ms ({}) cannot be below backoff-max-ms ({})",
            config.rate_limited_max_ms, config.backoff_max_ms
        )));
    }

    Ok(())
}

fn validate_verifier_config(config: &VerifierConfig) -> Result<(), ConfigError> {
    if config.probe_timeout_secs == 0 || config.connect_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "probe timeouts must be at least one second".to_string(),
        ));
    }

    if config.max_redirects > 20 {
        return Err(ConfigError::Validation(format!(
            "max-redirects must be <= 20, got {}",
            config.max_redirects
        )));
    }

    Ok(())
}

fn validate_cache_config(config: &CacheConfig) -> Result<(), ConfigError> {
    if config.dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "cache dir cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler-name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ConfigError::Validation(format!(
            "crawler-name must contain only alphanumeric characters, hyphens and underscores, got '{}'",
            config.crawler_name
        )));
    }

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "a contact email is required (pass --email)".to_string(),
        ));
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    let local = parts[0];
    let domain = parts[1];

    if local.is_empty() || domain.is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    // The email ends up inside a header value
    if email.chars().any(|c| c.is_whitespace() || c.is_control() || c == '(' || c == ')') {
        return Err(ConfigError::Validation(format!(
            "Email contains characters not allowed in a user agent: '{}'",
            email
        )));
    }

    Ok(())
}
