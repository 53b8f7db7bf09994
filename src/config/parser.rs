use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Loads and parses a configuration file from the given path
///
/// Missing keys fall back to their defaults. The result is not validated yet:
/// the contact email usually arrives from the command line afterwards, see
/// [`resolve_config`].
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully parsed configuration
/// * `Err(ConfigError)` - Failed to read or parse the file
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    Ok(config)
}

/// Builds the effective configuration for a run
///
/// Loads `path` when given (defaults otherwise), applies the command-line
/// overrides and validates the result.
///
/// # Arguments
///
/// * `path` - Optional TOML configuration file
/// * `email` - Contact email from the command line; overrides the file
/// * `cache_dir` - Optional cache directory override
///
/// # Returns
///
/// * `Ok(Config)` - Valid configuration
/// * `Err(ConfigError)` - Failed to load or validate
pub fn resolve_config(
    path: Option<&Path>,
    email: Option<&str>,
    cache_dir: Option<&Path>,
) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };

    if let Some(email) = email {
        config.user_agent.contact_email = email.to_string();
    }
    if let Some(dir) = cache_dir {
        config.cache.dir = dir.to_path_buf();
    }

    validate(&config)?;
    Ok(config)
}

/// Resolves only the cache directory, for commands that make no requests
///
/// The command-line directory wins over the file, the file over the
/// default. No contact email is needed.
pub fn resolve_cache_dir(
    path: Option<&Path>,
    cache_dir: Option<&Path>,
) -> Result<PathBuf, ConfigError> {
    if let Some(dir) = cache_dir {
        return Ok(dir.to_path_buf());
    }

    let config = match path {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };

    if config.cache.dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "cache dir cannot be empty".to_string(),
        ));
    }
    Ok(config.cache.dir)
}

/// Computes a SHA-256 hash of the effective configuration
///
/// The hash is stored with every scrape pass so a pass can be traced back to
/// the settings it ran under.
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash
/// * `Err(ConfigError)` - Failed to serialize the configuration
pub fn compute_config_hash(config: &Config) -> Result<String, ConfigError> {
    let content = toml::to_string(config)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    Ok(hex::encode(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let config_content = r#"
[index]
base-url = "https://test.pypi.org"

[limiter]
min-interval-ms = 1500

[scraper]
freshness-days = 7
max-attempts = 2

[verifier]
max-redirects = 3
head-fallback-to-get = false

[cache]
dir = "/var/lib/pypi-rot"

[user-agent]
contact-email = "admin@example.com"
"#;

        let file = create_temp_config(config_content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.index.base_url, "https://test.pypi.org");
        assert_eq!(config.limiter.min_interval_ms, 1500);
        assert_eq!(config.scraper.freshness_days, 7);
        assert_eq!(config.scraper.max_attempts, 2);
        // Unspecified keys keep their defaults
        assert_eq!(config.scraper.skip_window_days, 30);
        assert_eq!(config.verifier.max_redirects, 3);
        assert!(!config.verifier.head_fallback_to_get);
        assert_eq!(config.cache.dir, Path::new("/var/lib/pypi-rot"));
        assert_eq!(config.user_agent.contact_email, "admin@example.com");
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let file = create_temp_config("");
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.index.base_url, "https://pypi.org");
        assert_eq!(config.limiter.min_interval_ms, 1000);
        assert!(config.user_agent.contact_email.is_empty());
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_resolve_requires_email() {
        let result = resolve_config(None, None, None);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_resolve_cli_overrides_file() {
        let file = create_temp_config(
            r#"
[user-agent]
contact-email = "file@example.com"
"#,
        );

        let config = resolve_config(
            Some(file.path()),
            Some("cli@example.com"),
            Some(Path::new("/tmp/rot-cache")),
        )
        .unwrap();

        assert_eq!(config.user_agent.contact_email, "cli@example.com");
        assert_eq!(config.cache.dir, Path::new("/tmp/rot-cache"));
    }

    #[test]
    fn test_resolve_cache_dir_reads_file_without_email() {
        let file = create_temp_config(
            r#"
[cache]
dir = "/srv/rot-cache"
"#,
        );

        let dir = resolve_cache_dir(Some(file.path()), None).unwrap();
        assert_eq!(dir, Path::new("/srv/rot-cache"));

        let overridden =
            resolve_cache_dir(Some(file.path()), Some(Path::new("/tmp/other"))).unwrap();
        assert_eq!(overridden, Path::new("/tmp/other"));

        assert_eq!(resolve_cache_dir(None, None).unwrap(), Path::new("cache"));
    }

    #[test]
    fn test_resolve_rejects_invalid_values() {
        let file = create_temp_config(
            r#"
[scraper]
max-attempts = 0
"#,
        );

        let result = resolve_config(Some(file.path()), Some("user@example.com"), None);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_compute_config_hash() {
        let config = Config::with_email("user@example.com");

        let hash1 = compute_config_hash(&config).unwrap();
        let hash2 = compute_config_hash(&config).unwrap();

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64); // SHA-256 produces 64 hex characters
    }

    #[test]
    fn test_different_config_different_hash() {
        let config1 = Config::with_email("user@example.com");
        let mut config2 = config1.clone();
        config2.limiter.min_interval_ms = 2000;

        let hash1 = compute_config_hash(&config1).unwrap();
        let hash2 = compute_config_hash(&config2).unwrap();

        assert_ne!(hash1, hash2);
    }
}
