//! Configuration management for the weather agent
//!
//! Handles loading configuration from files, environment variables,
//! and provides validation for all configuration settings.

use crate::WeatherAgentError;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure for the weather agent
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Outbound HTTP settings shared by all clients
    pub http: HttpConfig,
    /// Buienradar API configuration
    pub buienradar: BuienradarConfig,
    /// Geocoding (Nominatim) configuration
    pub geocoding: GeocodingConfig,
    /// Cache configuration
    pub cache: CacheConfig,
    /// Thresholds used by the recommendation rules
    pub advice: AdviceConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Default application settings
    pub defaults: DefaultsConfig,
}

/// Buienradar API configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuienradarConfig {
    /// URL of the JSON feed with all station measurements
    pub feed_url: String,
    /// URL of the per-coordinate rain forecast
    pub raintext_url: String,
}

/// Outbound HTTP settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Request timeout in seconds
    pub timeout_seconds: u32,
    /// Maximum number of retries for transient failures
    pub max_retries: u32,
    /// User agent sent with every request (required by Nominatim)
    pub user_agent: String,
}

/// Geocoding configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocodingConfig {
    /// Base URL of the Nominatim instance
    pub base_url: String,
    /// Appended to every free-text query, e.g. "Leiden, Netherlands"
    pub country_suffix: String,
}

/// Cache configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// TTL of the station feed in minutes
    pub feed_ttl_minutes: u32,
    /// TTL of rain forecasts in minutes
    pub rain_ttl_minutes: u32,
    /// TTL of geocoding results in hours
    pub geocode_ttl_hours: u32,
    /// Stale entries older than this are not used as a fallback
    pub max_stale_minutes: u32,
    /// Cache directory location
    pub location: String,
}

/// Thresholds for the recommendation rules
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdviceConfig {
    /// Raintext value (0-255) above which rain is expected
    pub rain_threshold: u8,
    /// Temperature in Celsius below which it counts as cold
    pub cold_threshold_celsius: f64,
    /// Wind speed in m/s above which westerly wind counts as windy
    pub windy_threshold_ms: f64,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Log format (pretty or json)
    pub format: String,
}

/// Default application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    /// City used when none is given
    pub city: String,
    /// Port of the local JSON server
    pub server_port: u16,
}

// Default value functions
fn default_feed_url() -> String {
    "https://data.buienradar.nl/2.0/feed/json".to_string()
}

fn default_raintext_url() -> String {
    "https://gpsgadget.buienradar.nl/data/raintext".to_string()
}

fn default_timeout() -> u32 {
    10
}

fn default_max_retries() -> u32 {
    2
}

fn default_geocoding_url() -> String {
    "https://nominatim.openstreetmap.org".to_string()
}

fn default_country_suffix() -> String {
    "Netherlands".to_string()
}

fn default_user_agent() -> String {
    format!("weather-agent/{}", env!("CARGO_PKG_VERSION"))
}

fn default_feed_ttl() -> u32 {
    10
}

fn default_rain_ttl() -> u32 {
    5
}

fn default_geocode_ttl() -> u32 {
    168
}

fn default_max_stale() -> u32 {
    180
}

fn default_cache_location() -> String {
    dirs::cache_dir()
        .map(|dir| dir.join("weather-agent").to_string_lossy().into_owned())
        .unwrap_or_else(|| "~/.cache/weather-agent".to_string())
}

fn default_rain_threshold() -> u8 {
    70
}

fn default_cold_threshold() -> f64 {
    10.0
}

fn default_windy_threshold() -> f64 {
    6.0
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_city() -> String {
    "Leiden".to_string()
}

fn default_server_port() -> u16 {
    8080
}

impl Default for BuienradarConfig {
    fn default() -> Self {
        Self {
            feed_url: default_feed_url(),
            raintext_url: default_raintext_url(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout(),
            max_retries: default_max_retries(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            base_url: default_geocoding_url(),
            country_suffix: default_country_suffix(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            feed_ttl_minutes: default_feed_ttl(),
            rain_ttl_minutes: default_rain_ttl(),
            geocode_ttl_hours: default_geocode_ttl(),
            max_stale_minutes: default_max_stale(),
            location: default_cache_location(),
        }
    }
}

impl Default for AdviceConfig {
    fn default() -> Self {
        Self {
            rain_threshold: default_rain_threshold(),
            cold_threshold_celsius: default_cold_threshold(),
            windy_threshold_ms: default_windy_threshold(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            city: default_city(),
            server_port: default_server_port(),
        }
    }
}

impl CacheConfig {
    #[must_use]
    pub fn feed_ttl(&self) -> Duration {
        Duration::from_secs(u64::from(self.feed_ttl_minutes) * 60)
    }

    #[must_use]
    pub fn rain_ttl(&self) -> Duration {
        Duration::from_secs(u64::from(self.rain_ttl_minutes) * 60)
    }

    #[must_use]
    pub fn geocode_ttl(&self) -> Duration {
        Duration::from_secs(u64::from(self.geocode_ttl_hours) * 60 * 60)
    }

    #[must_use]
    pub fn max_stale(&self) -> Duration {
        Duration::from_secs(u64::from(self.max_stale_minutes) * 60)
    }

    /// Cache directory with a leading `~` expanded to the home directory
    #[must_use]
    pub fn directory(&self) -> PathBuf {
        match self.location.strip_prefix("~/") {
            Some(rest) => dirs::home_dir()
                .map(|home| home.join(rest))
                .unwrap_or_else(|| PathBuf::from(&self.location)),
            None => PathBuf::from(&self.location),
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path(None)
    }

    /// Load configuration from specified path
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        let explicit = config_path.is_some();
        let config_file = config_path.unwrap_or_else(|| {
            Self::get_config_path().unwrap_or_else(|| PathBuf::from("config.toml"))
        });

        if explicit && !config_file.exists() {
            return Err(WeatherAgentError::config(format!(
                "config file {} does not exist",
                config_file.display()
            ))
            .into());
        }

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // Environment overrides, e.g. WEATHER_AGENT_CACHE__FEED_TTL_MINUTES=5
        builder = builder.add_source(
            Environment::with_prefix("WEATHER_AGENT")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let mut config: AppConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        config.apply_defaults();
        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("weather-agent").join("config.toml"))
    }

    /// Apply default values to missing configuration fields
    pub fn apply_defaults(&mut self) {
        if self.buienradar.feed_url.is_empty() {
            self.buienradar.feed_url = default_feed_url();
        }
        if self.buienradar.raintext_url.is_empty() {
            self.buienradar.raintext_url = default_raintext_url();
        }
        if self.http.timeout_seconds == 0 {
            self.http.timeout_seconds = default_timeout();
        }
        if self.http.user_agent.is_empty() {
            self.http.user_agent = default_user_agent();
        }
        if self.geocoding.base_url.is_empty() {
            self.geocoding.base_url = default_geocoding_url();
        }
        if self.cache.feed_ttl_minutes == 0 {
            self.cache.feed_ttl_minutes = default_feed_ttl();
        }
        if self.cache.rain_ttl_minutes == 0 {
            self.cache.rain_ttl_minutes = default_rain_ttl();
        }
        if self.cache.geocode_ttl_hours == 0 {
            self.cache.geocode_ttl_hours = default_geocode_ttl();
        }
        if self.cache.location.is_empty() {
            self.cache.location = default_cache_location();
        }
        if self.logging.level.is_empty() {
            self.logging.level = default_log_level();
        }
        if self.logging.format.is_empty() {
            self.logging.format = default_log_format();
        }
        if self.defaults.city.trim().is_empty() {
            self.defaults.city = default_city();
        }
        if self.defaults.server_port == 0 {
            self.defaults.server_port = default_server_port();
        }
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        Ok(())
    }

    /// Validate numeric configuration ranges
    fn validate_numeric_ranges(&self) -> Result<()> {
        if self.http.timeout_seconds > 300 {
            return Err(WeatherAgentError::config("HTTP timeout cannot exceed 300 seconds").into());
        }

        if self.http.max_retries > 10 {
            return Err(WeatherAgentError::config("HTTP max retries cannot exceed 10").into());
        }

        if self.cache.feed_ttl_minutes > 24 * 60 || self.cache.rain_ttl_minutes > 24 * 60 {
            return Err(WeatherAgentError::config(
                "Weather data TTLs cannot exceed 1440 minutes (1 day)",
            )
            .into());
        }

        if self.cache.geocode_ttl_hours > 24 * 30 {
            return Err(WeatherAgentError::config(
                "Geocode TTL cannot exceed 720 hours (30 days)",
            )
            .into());
        }

        if !(0.0..=60.0).contains(&self.advice.windy_threshold_ms) {
            return Err(WeatherAgentError::config(
                "Windy threshold must be between 0 and 60 m/s",
            )
            .into());
        }

        if !(-50.0..=50.0).contains(&self.advice.cold_threshold_celsius) {
            return Err(WeatherAgentError::config(
                "Cold threshold must be between -50 and 50 °C",
            )
            .into());
        }

        Ok(())
    }

    /// Validate string configuration values
    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(WeatherAgentError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            ))
            .into());
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(WeatherAgentError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            ))
            .into());
        }

        for (name, url) in [
            ("Buienradar feed URL", &self.buienradar.feed_url),
            ("Buienradar raintext URL", &self.buienradar.raintext_url),
            ("Geocoding base URL", &self.geocoding.base_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(WeatherAgentError::config(format!(
                    "{name} must be a valid HTTP or HTTPS URL"
                ))
                .into());
            }
        }

        Ok(())
    }
}
