//! Application configuration
//!
//! Loaded from an optional TOML file, then overridden by `STRESS_*`
//! environment variables (`STRESS_BIND_ADDR`, `STRESS_SOURCE__PATH`, ...).

use camera_capture::SourceConfig;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use stress_monitor::MonitorConfig;

use crate::rate_limit::RateLimitConfig;

/// Default configuration file, overridable with `STRESS_CONFIG`
pub const DEFAULT_CONFIG_FILE: &str = "stress-detector.toml";

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Listen address
    pub bind_addr: String,
    /// Maximum log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit JSON log lines
    pub log_json: bool,
    /// Allow cross-origin requests from any dashboard
    pub cors_allow_any: bool,
    /// Model paths and face detector tuning
    pub monitor: MonitorConfig,
    /// Live source feeding the capture loop
    pub source: SourceConfig,
    /// Upload endpoint rate limiting
    pub rate_limit: RateLimitConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".to_string(),
            log_level: "info".to_string(),
            log_json: false,
            cors_allow_any: true,
            monitor: MonitorConfig::default(),
            source: SourceConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from `STRESS_CONFIG` (or the default file) and the environment
    pub fn load() -> Result<Self, ConfigError> {
        let path =
            std::env::var("STRESS_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::load_from(&path)
    }

    /// Load from a given file (missing file is fine) and the environment
    pub fn load_from(path: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("STRESS")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
