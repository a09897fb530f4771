use chrono::{FixedOffset, NaiveDate};
use domain::services::{PricingEngine, TrackingPolicy};
use serde::Deserialize;
use std::collections::HashMap;
use std::net::{AddrParseError, SocketAddr};
use std::time::Duration;

use crate::services::dispatch::DispatchPolicy;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
    pub dispatch: DispatchConfig,
    pub tracking: TrackingConfig,
    pub pricing: PricingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Empty selects the in-process stores.
    #[serde(default)]
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

impl DatabaseConfig {
    pub fn is_configured(&self) -> bool {
        !self.url.trim().is_empty()
    }

    pub fn pool_config(&self) -> persistence::db::DatabaseConfig {
        persistence::db::DatabaseConfig {
            url: self.url.clone(),
            max_connections: self.max_connections,
            min_connections: self.min_connections,
            connect_timeout_secs: self.connect_timeout_secs,
            idle_timeout_secs: self.idle_timeout_secs,
        }
    }
}

/// Technician location cache.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Redis URL; empty keeps the cache in process.
    #[serde(default)]
    pub url: String,

    #[serde(default = "default_cache_prefix")]
    pub key_prefix: String,

    #[serde(default = "default_location_ttl")]
    pub location_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            key_prefix: default_cache_prefix(),
            location_ttl_secs: default_location_ttl(),
        }
    }
}

impl CacheConfig {
    pub fn location_ttl(&self) -> Duration {
        Duration::from_secs(self.location_ttl_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

/// Offer protocol knobs. Durations are in seconds.
#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    #[serde(default = "default_initial_radius")]
    pub initial_radius_km: f64,

    #[serde(default = "default_radius_step")]
    pub radius_step_km: f64,

    #[serde(default = "default_max_radius")]
    pub max_radius_km: f64,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_offer_timeout")]
    pub offer_timeout_secs: u64,

    #[serde(default = "default_escalate_after")]
    pub escalate_after_secs: u64,

    #[serde(default = "default_retry_interval")]
    pub retry_interval_secs: u64,
}

impl DispatchConfig {
    pub fn policy(&self) -> DispatchPolicy {
        DispatchPolicy {
            initial_radius_km: self.initial_radius_km,
            radius_step_km: self.radius_step_km,
            max_radius_km: self.max_radius_km,
            max_attempts: self.max_attempts,
            offer_timeout: Duration::from_secs(self.offer_timeout_secs),
            escalate_after: Duration::from_secs(self.escalate_after_secs),
            retry_interval: Duration::from_secs(self.retry_interval_secs),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackingConfig {
    #[serde(default = "default_arrival_threshold")]
    pub arrival_threshold_km: f64,

    #[serde(default = "default_speed")]
    pub default_speed_kmh: f64,

    #[serde(default = "default_min_speed")]
    pub min_plausible_speed_kmh: f64,

    #[serde(default = "default_buffer_minutes")]
    pub buffer_minutes: f64,

    /// Per-request broadcast buffer; slow subscribers skip ahead.
    #[serde(default = "default_hub_capacity")]
    pub hub_capacity: usize,
}

impl TrackingConfig {
    pub fn policy(&self) -> TrackingPolicy {
        TrackingPolicy {
            arrival_threshold_km: self.arrival_threshold_km,
            default_speed_kmh: self.default_speed_kmh,
            min_plausible_speed_kmh: self.min_plausible_speed_kmh,
            buffer_minutes: self.buffer_minutes,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PricingConfig {
    /// Offset of the service area's local time from UTC.
    #[serde(default = "default_utc_offset")]
    pub utc_offset_minutes: i32,

    /// Public holidays as `YYYY-MM-DD`.
    #[serde(default)]
    pub holidays: Vec<String>,

    /// Code to percentage off the subtotal.
    #[serde(default)]
    pub discount_codes: HashMap<String, f64>,

    #[serde(default = "default_tax_rate")]
    pub tax_rate: f64,
}

impl PricingConfig {
    pub fn engine(&self) -> Result<PricingEngine, ConfigValidationError> {
        let offset = FixedOffset::east_opt(self.utc_offset_minutes * 60).ok_or_else(|| {
            ConfigValidationError::InvalidValue(format!(
                "utc_offset_minutes {} is out of range",
                self.utc_offset_minutes
            ))
        })?;
        let holidays = self
            .holidays
            .iter()
            .map(|d| {
                NaiveDate::parse_from_str(d, "%Y-%m-%d").map_err(|_| {
                    ConfigValidationError::InvalidValue(format!("holiday '{}' is not YYYY-MM-DD", d))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PricingEngine::new(offset)
            .with_holidays(holidays)
            .with_discount_codes(self.discount_codes.clone())
            .with_tax_rate(self.tax_rate))
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_request_timeout() -> u64 {
    30
}
fn default_shutdown_timeout() -> u64 {
    10
}
fn default_max_connections() -> u32 {
    20
}
fn default_min_connections() -> u32 {
    5
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_idle_timeout() -> u64 {
    600
}
fn default_cache_prefix() -> String {
    "rescue".to_string()
}
fn default_location_ttl() -> u64 {
    300
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "json".to_string()
}
fn default_initial_radius() -> f64 {
    5.0
}
fn default_radius_step() -> f64 {
    5.0
}
fn default_max_radius() -> f64 {
    50.0
}
fn default_max_attempts() -> u32 {
    10
}
fn default_offer_timeout() -> u64 {
    120
}
fn default_escalate_after() -> u64 {
    300
}
fn default_retry_interval() -> u64 {
    30
}
fn default_arrival_threshold() -> f64 {
    0.1
}
fn default_speed() -> f64 {
    30.0
}
fn default_min_speed() -> f64 {
    5.0
}
fn default_buffer_minutes() -> f64 {
    3.0
}
fn default_hub_capacity() -> usize {
    64
}
fn default_utc_offset() -> i32 {
    60
}
fn default_tax_rate() -> f64 {
    domain::services::pricing::DEFAULT_TAX_RATE
}

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

const EMBEDDED_DEFAULTS: &str = include_str!("../../../config/default.toml");

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Loading order (later sources override earlier):
    /// 1. config/default.toml - base configuration with defaults
    /// 2. config/local.toml - local overrides (optional, not in git)
    /// 3. Environment variables with RD__ prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("RD").separator("__"))
            .build()?;

        let cfg: Self = config.try_deserialize()?;
        cfg.validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Ok(cfg)
    }

    /// Builds a config from the compiled-in defaults plus overrides, without
    /// touching the file system or the environment. Not validated.
    pub fn load_for_test(overrides: &[(&str, &str)]) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder().add_source(config::File::from_str(
            EMBEDDED_DEFAULTS,
            config::FileFormat::Toml,
        ));

        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.server.port == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "Server port cannot be 0".to_string(),
            ));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigValidationError::InvalidValue(
                "min_connections cannot exceed max_connections".to_string(),
            ));
        }

        let dispatch = &self.dispatch;
        if dispatch.initial_radius_km <= 0.0 || dispatch.radius_step_km <= 0.0 {
            return Err(ConfigValidationError::InvalidValue(
                "dispatch radii must be positive".to_string(),
            ));
        }
        if dispatch.initial_radius_km > dispatch.max_radius_km {
            return Err(ConfigValidationError::InvalidValue(
                "initial_radius_km cannot exceed max_radius_km".to_string(),
            ));
        }
        if dispatch.max_attempts == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if dispatch.offer_timeout_secs == 0
            || dispatch.escalate_after_secs == 0
            || dispatch.retry_interval_secs == 0
        {
            return Err(ConfigValidationError::InvalidValue(
                "dispatch timeouts must be positive".to_string(),
            ));
        }

        if self.tracking.default_speed_kmh <= 0.0 || self.tracking.hub_capacity == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "tracking default speed and hub capacity must be positive".to_string(),
            ));
        }

        if self.cache.location_ttl_secs == 0 {
            return Err(ConfigValidationError::MissingRequired(
                "RD__CACHE__LOCATION_TTL_SECS must be positive".to_string(),
            ));
        }

        self.pricing.engine()?;
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, AddrParseError> {
        format!("{}:{}", self.server.host, self.server.port).parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_load_with_defaults() {
        let config = Config::load_for_test(&[]).expect("Failed to load config");

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert!(!config.database.is_configured());
        assert_eq!(config.dispatch.max_radius_km, 50.0);
        assert_eq!(config.dispatch.offer_timeout_secs, 120);
        assert_eq!(config.cache.location_ttl_secs, 300);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_override() {
        let config = Config::load_for_test(&[
            ("server.port", "9000"),
            ("logging.level", "debug"),
            ("dispatch.max_attempts", "3"),
        ])
        .expect("Failed to load config");

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.dispatch.policy().max_attempts, 3);
    }

    #[test]
    fn test_dispatch_policy_durations() {
        let config = Config::load_for_test(&[]).unwrap();
        let policy = config.dispatch.policy();
        assert_eq!(policy.offer_timeout, Duration::from_secs(120));
        assert_eq!(policy.escalate_after, Duration::from_secs(300));
        assert_eq!(policy.retry_interval, Duration::from_secs(30));
    }

    #[test]
    fn test_validation_rejects_inverted_radius() {
        let config = Config::load_for_test(&[
            ("dispatch.initial_radius_km", "60"),
            ("dispatch.max_radius_km", "50"),
        ])
        .unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("initial_radius_km"));
    }

    #[test]
    fn test_validation_rejects_zero_timeout() {
        let config = Config::load_for_test(&[("dispatch.offer_timeout_secs", "0")]).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_invalid_pool_settings() {
        let config = Config::load_for_test(&[
            ("database.min_connections", "100"),
            ("database.max_connections", "10"),
        ])
        .unwrap();

        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("min_connections"));
    }

    #[test]
    fn test_bad_holiday_is_rejected() {
        let mut config = Config::load_for_test(&[]).unwrap();
        config.pricing.holidays = vec!["25/12/2024".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_socket_addr() {
        let config = Config::load_for_test(&[
            ("server.host", "127.0.0.1"),
            ("server.port", "3000"),
        ])
        .unwrap();

        assert_eq!(config.socket_addr().unwrap().to_string(), "127.0.0.1:3000");
    }
}
