//! Configuration module for pypi-rot
//!
//! This module handles loading, merging, and validating the optional TOML
//! configuration file. Every key has a default; the contact email normally
//! comes from the command line.
//!
//! # Example
//!
//! ```no_run
//! use pypi_rot::config::resolve_config;
//! use std::path::Path;
//!
//! let config = resolve_config(Some(Path::new("rot.toml")), Some("me@example.com"), None).unwrap();
//! println!("Minimum request interval: {}ms", config.limiter.min_interval_ms);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    CacheConfig, Config, IndexConfig, LimiterConfig, ScraperConfig, UserAgentConfig,
    VerifierConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, resolve_cache_dir, resolve_config};
pub use validation::validate;
