use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::geokey::GeoKey;

/// Geographic coordinate in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoCoordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoCoordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Latitude in [-90, 90] and longitude in [-180, 180]
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Inclusive latitude/longitude box used for coverage and region gates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_latitude: f64,
    pub max_latitude: f64,
    pub min_longitude: f64,
    pub max_longitude: f64,
}

impl BoundingBox {
    pub const fn new(
        min_latitude: f64,
        max_latitude: f64,
        min_longitude: f64,
        max_longitude: f64,
    ) -> Self {
        Self {
            min_latitude,
            max_latitude,
            min_longitude,
            max_longitude,
        }
    }

    pub fn contains(&self, coordinate: &GeoCoordinate) -> bool {
        (self.min_latitude..=self.max_latitude).contains(&coordinate.latitude)
            && (self.min_longitude..=self.max_longitude).contains(&coordinate.longitude)
    }
}

/// One calendar day of forecast. Values are never null once normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyPoint {
    pub date: NaiveDate,
    pub temp_max: f64,
    pub temp_min: f64,
    pub precipitation_sum: f64,
    pub rain_sum: f64,
    pub wind_speed_max: f64,
    pub wind_direction_dominant: f64,
}

/// One hour of forecast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyPoint {
    pub timestamp: DateTime<Utc>,
    pub temp: f64,
    pub precipitation: f64,
    pub rain: f64,
    pub wind_speed: f64,
}

/// Volumetric soil moisture (m³/m³) by depth. Passed through for
/// downstream consumers; the analysis code never reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoilMoisturePoint {
    pub timestamp: DateTime<Utc>,
    pub depth_0_1cm: Option<f64>,
    pub depth_1_3cm: Option<f64>,
    pub depth_3_9cm: Option<f64>,
    pub depth_9_27cm: Option<f64>,
}

/// Which provider path produced a forecast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForecastSource {
    Primary,
    Secondary,
    Hybrid,
}

/// Fused forecast for a single coordinate.
///
/// `daily` is chronological with one entry per calendar day. `hourly` may be
/// empty when only the secondary provider answered without hourly data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherForecast {
    pub coordinate: GeoCoordinate,
    pub timezone: String,
    pub source: ForecastSource,
    pub daily: Vec<DailyPoint>,
    pub hourly: Vec<HourlyPoint>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub soil_moisture: Vec<SoilMoisturePoint>,
}

/// Current conditions at the nearest primary-provider station
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationSnapshot {
    pub temp: f64,
    pub feels_like: f64,
    pub humidity: f64,
    pub wind_speed_kmh: f64,
    pub wind_direction: String,
    pub gust_speed_kmh: f64,
    pub rain_since_9am: f64,
    pub station_name: String,
    pub observed_at: DateTime<Utc>,
}

/// A candidate from the primary provider's location search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationMatch {
    pub key: GeoKey,
    pub name: String,
    pub region: String,
}

/// Weather acquisition errors.
///
/// These stay inside the crate's clients; the forecast service logs them and
/// degrades to another provider or to "unavailable".
#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Upstream returned {status}: {body}")]
    Http { status: u16, body: String },
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Invalid geokey: {0}")]
    InvalidGeoKey(String),
    #[error("Coordinate outside provider coverage")]
    OutOfCoverage,
    #[error("Provider returned no data")]
    NoData,
    #[error("All {0} attempts failed")]
    RetriesExhausted(u32),
}

impl WeatherError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Network(_) | Self::RetriesExhausted(_) => {
                "Weather service unreachable. Please try again later."
            }
            Self::Http { status, .. } if *status >= 500 => {
                "Weather service is experiencing issues. Please try again later."
            }
            Self::Http { .. } => "Weather request was rejected.",
            Self::Parse(_) => "Received an unexpected weather response.",
            Self::InvalidGeoKey(_) => "Location identifier is invalid.",
            Self::OutOfCoverage => "Location is outside this provider's coverage.",
            Self::NoData => "No forecast data available for this location.",
        }
    }

    /// Whether a retry has a chance of succeeding
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(e) => e.is_timeout() || e.is_connect(),
            Self::Http { status, .. } => *status >= 500 || *status == 408 || *status == 429,
            Self::RetriesExhausted(_) => true,
            _ => false,
        }
    }
}
