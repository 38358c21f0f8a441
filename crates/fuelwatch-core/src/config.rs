use anyhow::{Context, Result};
use fuelwatch_intel::{IndustryType, RoadProfile, SiteProfile};
use fuelwatch_weather::geokey::{DEFAULT_PRECISION, MAX_PRECISION};
use fuelwatch_weather::http::{
    DEFAULT_INITIAL_DELAY_MS, DEFAULT_MAX_DELAY_MS, DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT_SECS,
};
use fuelwatch_weather::primary::PRIMARY_API_BASE;
use fuelwatch_weather::secondary::SECONDARY_API_BASE;
use fuelwatch_weather::{EngineSettings, RetryConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::error::{AppError, ConfigError};

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// All errors joined into one line
    pub fn error_summary(&self) -> String {
        if self.errors.is_empty() {
            return String::new();
        }
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Upstream providers, caching and retry policy
    #[serde(default)]
    pub weather: WeatherConfig,

    /// Default site used by the command-line tool
    #[serde(default)]
    pub site: SiteConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    #[serde(default = "default_primary_url")]
    pub primary_base_url: String,

    #[serde(default = "default_secondary_url")]
    pub secondary_base_url: String,

    /// Per-request timeout for upstream calls
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_forecast_ttl")]
    pub forecast_ttl_minutes: u64,

    #[serde(default = "default_observation_ttl")]
    pub observation_ttl_minutes: u64,

    /// Geohash length used for cache keys and primary lookups
    #[serde(default = "default_precision")]
    pub geokey_precision: usize,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_delay")]
    pub retry_initial_delay_ms: u64,

    #[serde(default = "default_max_delay")]
    pub retry_max_delay_ms: u64,
}

fn default_primary_url() -> String {
    PRIMARY_API_BASE.to_string()
}

fn default_secondary_url() -> String {
    SECONDARY_API_BASE.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_forecast_ttl() -> u64 {
    180
}

fn default_observation_ttl() -> u64 {
    15
}

fn default_precision() -> usize {
    DEFAULT_PRECISION
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_initial_delay() -> u64 {
    DEFAULT_INITIAL_DELAY_MS
}

fn default_max_delay() -> u64 {
    DEFAULT_MAX_DELAY_MS
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            primary_base_url: default_primary_url(),
            secondary_base_url: default_secondary_url(),
            request_timeout_secs: default_timeout_secs(),
            forecast_ttl_minutes: default_forecast_ttl(),
            observation_ttl_minutes: default_observation_ttl(),
            geokey_precision: default_precision(),
            max_retries: default_max_retries(),
            retry_initial_delay_ms: default_initial_delay(),
            retry_max_delay_ms: default_max_delay(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    #[serde(default)]
    pub industry: IndustryType,

    /// Litres currently on site
    #[serde(default = "default_tank_level")]
    pub tank_level_l: f64,

    #[serde(default = "default_daily_consumption")]
    pub daily_consumption_l: f64,

    #[serde(default)]
    pub road: RoadProfile,
}

fn default_tank_level() -> f64 {
    10_000.0
}

fn default_daily_consumption() -> f64 {
    1_500.0
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            industry: IndustryType::default(),
            tank_level_l: default_tank_level(),
            daily_consumption_l: default_daily_consumption(),
            road: RoadProfile::default(),
        }
    }
}

impl SiteConfig {
    pub fn to_profile(&self) -> SiteProfile {
        SiteProfile {
            industry: self.industry,
            road: self.road.clone(),
            tank_level_l: self.tank_level_l,
            daily_consumption_l: self.daily_consumption_l,
        }
    }
}

impl WeatherConfig {
    pub fn to_engine_settings(&self) -> EngineSettings {
        EngineSettings {
            primary_base_url: self.primary_base_url.clone(),
            secondary_base_url: self.secondary_base_url.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            forecast_ttl: Duration::from_secs(self.forecast_ttl_minutes.saturating_mul(60)),
            observation_ttl: Duration::from_secs(self.observation_ttl_minutes.saturating_mul(60)),
            geokey_precision: self.geokey_precision,
            retry: RetryConfig::new(
                self.max_retries,
                self.retry_initial_delay_ms,
                self.retry_max_delay_ms,
            ),
        }
    }
}

impl Config {
    /// Load configuration from file, creating default if it doesn't exist
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save_to(path)?;
            tracing::info!("Wrote default config to {}", path.display());
            return Ok(config);
        }

        let contents = std::fs::read_to_string(path).context("Failed to read config file")?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| AppError::Config(ConfigError::ParseError(e.to_string())))
            .context("Failed to parse config file")?;

        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Returns the config along with any validation warnings.
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        Self::validated(Self::load()?)
    }

    pub fn load_validated_from(path: &Path) -> Result<(Self, ValidationResult)> {
        Self::validated(Self::load_from(path)?)
    }

    fn validated(config: Self) -> Result<(Self, ValidationResult)> {
        let validation = config.validate();

        if !validation.is_valid() {
            return Err(AppError::Config(ConfigError::Invalid(validation.error_summary())).into());
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    /// Validate the configuration
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();
        let weather = &self.weather;

        self.validate_url(
            &weather.primary_base_url,
            "weather.primary_base_url",
            &mut result,
        );
        self.validate_url(
            &weather.secondary_base_url,
            "weather.secondary_base_url",
            &mut result,
        );

        if weather.request_timeout_secs == 0 {
            result.add_error(
                "weather.request_timeout_secs",
                "Request timeout must be greater than 0",
            );
        } else if weather.request_timeout_secs > 120 {
            result.add_warning(
                "weather.request_timeout_secs",
                "Request timeout is unusually long (>120s)",
            );
        }

        if weather.forecast_ttl_minutes == 0 {
            result.add_error(
                "weather.forecast_ttl_minutes",
                "Forecast TTL must be greater than 0",
            );
        } else if weather.forecast_ttl_minutes > 24 * 60 {
            result.add_warning(
                "weather.forecast_ttl_minutes",
                "Forecasts cached for more than 24 hours will be stale",
            );
        }

        if weather.observation_ttl_minutes == 0 {
            result.add_error(
                "weather.observation_ttl_minutes",
                "Observation TTL must be greater than 0",
            );
        } else if weather.observation_ttl_minutes > weather.forecast_ttl_minutes {
            result.add_warning(
                "weather.observation_ttl_minutes",
                "Observations are cached longer than forecasts",
            );
        }

        if !(1..=MAX_PRECISION).contains(&weather.geokey_precision) {
            result.add_error(
                "weather.geokey_precision",
                format!("Precision must be between 1 and {}", MAX_PRECISION),
            );
        } else if weather.geokey_precision > 8 {
            result.add_warning(
                "weather.geokey_precision",
                "High precision keys make cache hits between nearby sites unlikely",
            );
        }

        if weather.retry_initial_delay_ms > weather.retry_max_delay_ms {
            result.add_warning(
                "weather.retry_initial_delay_ms",
                "Initial retry delay exceeds the maximum delay",
            );
        }

        if self.site.road.closure_threshold_mm <= 0.0 {
            result.add_error(
                "site.road.closure_threshold_mm",
                "Closure threshold must be greater than 0",
            );
        }

        if self.site.tank_level_l < 0.0 {
            result.add_error("site.tank_level_l", "Tank level cannot be negative");
        }

        if self.site.daily_consumption_l < 0.0 {
            result.add_error(
                "site.daily_consumption_l",
                "Daily consumption cannot be negative",
            );
        } else if self.site.daily_consumption_l == 0.0 {
            result.add_warning(
                "site.daily_consumption_l",
                "Zero consumption treats supply as unlimited",
            );
        }

        result
    }

    /// Validate a URL field
    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Save configuration to file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Get the path to the configuration file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| {
                AppError::Config(ConfigError::NotFound("platform config directory".into()))
            })?
            .join("fuelwatch");

        Ok(config_dir.join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use fuelwatch_intel::AccessRoadType;

    #[test]
    fn test_valid_default_config() {
        let config = Config::default();
        let result = config.validate();
        assert!(result.is_valid(), "Default config should be valid: {:?}", result.errors);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_invalid_url() {
        let mut config = Config::default();
        config.weather.primary_base_url = "not-a-url".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result
            .errors
            .iter()
            .any(|e| e.field == "weather.primary_base_url"));
    }

    #[test]
    fn test_invalid_url_scheme() {
        let mut config = Config::default();
        config.weather.secondary_base_url = "ftp://localhost:8080".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.message.contains("http or https")));
    }

    #[test]
    fn test_zero_ttl_and_timeout() {
        let mut config = Config::default();
        config.weather.forecast_ttl_minutes = 0;
        config.weather.request_timeout_secs = 0;
        let result = config.validate();
        assert_eq!(result.errors.len(), 2);
    }

    #[test]
    fn test_precision_bounds() {
        let mut config = Config::default();
        config.weather.geokey_precision = 0;
        assert!(!config.validate().is_valid());
        config.weather.geokey_precision = 13;
        assert!(!config.validate().is_valid());
        config.weather.geokey_precision = 9;
        let result = config.validate();
        assert!(result.is_valid());
        assert!(result
            .warnings
            .iter()
            .any(|w| w.field == "weather.geokey_precision"));
    }

    #[test]
    fn test_closure_threshold_must_be_positive() {
        let mut config = Config::default();
        config.site.road.closure_threshold_mm = 0.0;
        let result = config.validate();
        assert!(result
            .errors
            .iter()
            .any(|e| e.field == "site.road.closure_threshold_mm"));
    }

    #[test]
    fn test_validation_result_error_summary() {
        let mut result = ValidationResult::default();
        result.add_error("field1", "error1");
        result.add_error("field2", "error2");
        let summary = result.error_summary();
        assert!(summary.contains("field1"));
        assert!(summary.contains("field2"));
    }

    #[test]
    fn test_engine_settings_conversion() {
        let config = Config::default();
        let settings = config.weather.to_engine_settings();
        assert_eq!(settings.forecast_ttl, Duration::from_secs(3 * 60 * 60));
        assert_eq!(settings.observation_ttl, Duration::from_secs(15 * 60));
        assert_eq!(settings.request_timeout, Duration::from_secs(10));
        assert_eq!(settings.geokey_precision, 7);
        assert_eq!(settings.retry.max_retries, 2);
    }

    #[test]
    fn test_first_load_writes_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fuelwatch").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.weather.forecast_ttl_minutes, 180);

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.weather.primary_base_url, config.weather.primary_base_url);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[site]
industry = "mining"
tank_level_l = 2500.0

[site.road]
access_road_type = "unsealed"
closure_threshold_mm = 30.0
typical_closure_duration_days = 4
alternative_route_available = true
"#,
        )
        .unwrap();

        let (config, _) = Config::load_validated_from(&path).unwrap();
        assert_eq!(config.site.industry, IndustryType::Mining);
        assert_eq!(config.site.road.access_road_type, AccessRoadType::Unsealed);
        assert_eq!(config.site.daily_consumption_l, 1_500.0);
        assert_eq!(config.weather.observation_ttl_minutes, 15);

        let profile = config.site.to_profile();
        assert_eq!(profile.tank_level_l, 2500.0);
        assert!(profile.road.alternative_route_available);
    }

    #[test]
    fn test_invalid_file_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = Config::default();
        config.weather.observation_ttl_minutes = 0;
        config.save_to(&path).unwrap();

        let err = Config::load_validated_from(&path).unwrap_err();
        assert!(err.to_string().contains("weather.observation_ttl_minutes"));
        assert!(matches!(
            err.downcast_ref::<AppError>(),
            Some(AppError::Config(ConfigError::Invalid(_)))
        ));
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[weather\nprimary_base_url = 3").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        let app_err = err.downcast_ref::<AppError>().unwrap();
        assert!(matches!(app_err, AppError::Config(ConfigError::ParseError(_))));
        assert!(!app_err.user_message().is_empty());
    }

    #[test]
    fn test_huge_ttl_saturates() {
        let weather = WeatherConfig {
            forecast_ttl_minutes: u64::MAX,
            observation_ttl_minutes: u64::MAX / 2,
            ..WeatherConfig::default()
        };

        let settings = weather.to_engine_settings();
        assert_eq!(settings.forecast_ttl, Duration::from_secs(u64::MAX));
        assert_eq!(settings.observation_ttl, Duration::from_secs(u64::MAX));
    }
}
