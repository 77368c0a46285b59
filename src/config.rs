use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;

use crate::report::calendar::ViewerTimezone;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub report: ReportConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_allowed_origin")]
    pub allowed_origin: String,
}

fn default_allowed_origin() -> String {
    "http://localhost:5340".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub pool_size: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReportConfig {
    /// Used when the viewer has no usable timezone of their own.
    #[serde(default = "default_timezone")]
    pub default_timezone: String,
    #[serde(default = "default_recent_window_days")]
    pub recent_window_days: u64,
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            default_timezone: default_timezone(),
            recent_window_days: default_recent_window_days(),
            cache_ttl_secs: default_cache_ttl(),
        }
    }
}

fn default_timezone() -> String {
    "UTC".to_string()
}
fn default_recent_window_days() -> u64 {
    7
}
fn default_cache_ttl() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitConfig {
    pub per_second: u64,
    pub burst_size: u32,
}

impl AppConfig {
    /// Reject configurations the service cannot run with.
    pub fn validate(&self) -> Result<(), String> {
        if self.report.default_timezone.parse::<ViewerTimezone>().is_err() {
            return Err(format!(
                "report.default_timezone {:?} is not a valid UTC offset. \
                 Use UTC, +HH:MM or -HH:MM (or BURNRATE__REPORT__DEFAULT_TIMEZONE).",
                self.report.default_timezone
            ));
        }
        if self.report.recent_window_days == 0 {
            return Err("report.recent_window_days must be at least 1".to_string());
        }
        if self.rate_limit.per_second == 0 || self.rate_limit.burst_size == 0 {
            return Err("rate_limit.per_second and rate_limit.burst_size must be non-zero".to_string());
        }
        Ok(())
    }

    pub fn load(config_path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = Config::builder();

        let path = config_path.unwrap_or("config.toml");
        builder = builder.add_source(File::with_name(path).required(false));

        // Overlay with environment variables (BURNRATE__SERVER__PORT=3001, etc.)
        builder = builder.add_source(
            Environment::with_prefix("BURNRATE")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Parsed form of `report.default_timezone`. Falls back to UTC, which
    /// `validate` makes unreachable for a loaded config.
    pub fn default_timezone(&self) -> ViewerTimezone {
        self.report
            .default_timezone
            .parse()
            .unwrap_or_else(|_| ViewerTimezone::utc())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AppConfig {
        AppConfig {
            server: ServerConfig {
                host: "127.0.0.1".into(),
                port: 5340,
                allowed_origin: default_allowed_origin(),
            },
            database: DatabaseConfig {
                path: "burnrate.db".into(),
                pool_size: 4,
            },
            report: ReportConfig::default(),
            rate_limit: RateLimitConfig {
                per_second: 10,
                burst_size: 20,
            },
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(sample().validate().is_ok());
        assert_eq!(sample().default_timezone(), ViewerTimezone::utc());
    }

    #[test]
    fn test_bad_default_timezone_rejected() {
        let mut cfg = sample();
        cfg.report.default_timezone = "Mars/Olympus".into();
        let err = cfg.validate().unwrap_err();
        assert!(err.contains("default_timezone"));
    }

    #[test]
    fn test_zero_recent_window_rejected() {
        let mut cfg = sample();
        cfg.report.recent_window_days = 0;
        assert!(cfg.validate().is_err());
    }
}
