//! Primary provider: regional, short-range, high accuracy. Addressed by
//! geokey and only valid inside its coverage box.

use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDate, Timelike, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::instrument;

use crate::geokey::GeoKey;
use crate::http::{self, RetryConfig};
use crate::types::{
    BoundingBox, DailyPoint, ForecastSource, GeoCoordinate, HourlyPoint, LocationMatch,
    ObservationSnapshot, WeatherError, WeatherForecast,
};

pub const PRIMARY_API_BASE: &str = "https://api.weather.bom.gov.au/v1";

/// Area the primary provider serves
pub const PRIMARY_COVERAGE: BoundingBox = BoundingBox::new(-44.0, -9.0, 112.0, 155.0);

/// Longest horizon the primary daily endpoint returns
pub const PRIMARY_MAX_DAYS: usize = 7;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
    #[serde(default)]
    metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseMetadata {
    observation_time: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RainAmount {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub units: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Rain {
    pub amount: Option<RainAmount>,
    pub chance: Option<f64>,
}

impl Rain {
    /// Upper bound of the forecast range, falling back to the lower bound
    fn millimetres(&self) -> f64 {
        self.amount
            .as_ref()
            .and_then(|a| a.max.or(a.min))
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Wind {
    pub speed_kilometre: Option<f64>,
    pub direction: Option<String>,
}

/// Daily record as the provider sends it
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PrimaryDaily {
    pub date: Option<String>,
    pub temp_max: Option<f64>,
    pub temp_min: Option<f64>,
    pub rain: Option<Rain>,
    pub icon_descriptor: Option<String>,
    pub short_text: Option<String>,
}

/// Hourly record as the provider sends it
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PrimaryHourly {
    pub time: Option<String>,
    pub temp: Option<f64>,
    pub rain: Option<Rain>,
    pub wind: Option<Wind>,
}

#[derive(Debug, Default, Deserialize)]
struct RawObservation {
    temp: Option<f64>,
    temp_feels_like: Option<f64>,
    humidity: Option<f64>,
    wind: Option<Wind>,
    gust: Option<Wind>,
    rain_since_9am: Option<f64>,
    station: Option<RawStation>,
}

#[derive(Debug, Default, Deserialize)]
struct RawStation {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawLocation {
    geohash: Option<String>,
    name: Option<String>,
    state: Option<String>,
}

pub struct PrimaryClient {
    client: Client,
    base_url: String,
    retry: RetryConfig,
}

impl PrimaryClient {
    pub fn new(
        base_url: &str,
        timeout: std::time::Duration,
        retry: RetryConfig,
    ) -> Result<Self, WeatherError> {
        Ok(Self {
            client: http::build_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry,
        })
    }

    pub fn covers(&self, coordinate: &GeoCoordinate) -> bool {
        PRIMARY_COVERAGE.contains(coordinate)
    }

    #[instrument(skip(self), level = "info")]
    pub async fn daily(&self, key: &GeoKey) -> Result<Vec<PrimaryDaily>, WeatherError> {
        let url = format!("{}/locations/{}/forecasts/daily", self.base_url, key);
        let envelope: Envelope<Vec<PrimaryDaily>> =
            http::get_json(&self.client, &url, &self.retry).await?;
        if envelope.data.is_empty() {
            return Err(WeatherError::NoData);
        }
        Ok(envelope.data)
    }

    #[instrument(skip(self), level = "info")]
    pub async fn hourly(&self, key: &GeoKey) -> Result<Vec<PrimaryHourly>, WeatherError> {
        let url = format!("{}/locations/{}/forecasts/hourly", self.base_url, key);
        let envelope: Envelope<Vec<PrimaryHourly>> =
            http::get_json(&self.client, &url, &self.retry).await?;
        Ok(envelope.data)
    }

    #[instrument(skip(self), level = "info")]
    pub async fn observations(&self, key: &GeoKey) -> Result<ObservationSnapshot, WeatherError> {
        let url = format!("{}/locations/{}/observations", self.base_url, key);
        let envelope: Envelope<RawObservation> =
            http::get_json(&self.client, &url, &self.retry).await?;

        let observed_at = envelope
            .metadata
            .and_then(|m| m.observation_time)
            .and_then(|t| parse_timestamp(&t))
            .unwrap_or_else(Utc::now);
        let obs = envelope.data;
        let wind = obs.wind.unwrap_or_default();

        Ok(ObservationSnapshot {
            temp: obs.temp.unwrap_or(0.0),
            feels_like: obs.temp_feels_like.unwrap_or(0.0),
            humidity: obs.humidity.unwrap_or(0.0),
            wind_speed_kmh: wind.speed_kilometre.unwrap_or(0.0),
            wind_direction: wind.direction.unwrap_or_default(),
            gust_speed_kmh: obs.gust.and_then(|g| g.speed_kilometre).unwrap_or(0.0),
            rain_since_9am: obs.rain_since_9am.unwrap_or(0.0),
            station_name: obs.station.and_then(|s| s.name).unwrap_or_default(),
            observed_at,
        })
    }

    /// Candidate locations for a free-text query; entries without a valid
    /// geohash are skipped.
    #[instrument(skip(self), level = "info")]
    pub async fn search(&self, query: &str) -> Result<Vec<LocationMatch>, WeatherError> {
        let url = format!(
            "{}/locations?search={}",
            self.base_url,
            urlencoding::encode(query)
        );
        let envelope: Envelope<Vec<RawLocation>> =
            http::get_json(&self.client, &url, &self.retry).await?;

        Ok(envelope
            .data
            .into_iter()
            .filter_map(|raw| {
                let key = GeoKey::parse(raw.geohash.as_deref()?).ok()?;
                Some(LocationMatch {
                    key,
                    name: raw.name.unwrap_or_default(),
                    region: raw.state.unwrap_or_default(),
                })
            })
            .collect())
    }
}

/// Turn raw primary records into a forecast, defaulting nulls to zero.
///
/// Daily dates arrive as the UTC instant of local midnight, which also gives
/// the local UTC offset used to bucket hourly records into days. Daily wind
/// comes from the hourly maxima since the daily endpoint has none.
pub fn normalize(
    coordinate: GeoCoordinate,
    daily: &[PrimaryDaily],
    hourly: &[PrimaryHourly],
) -> WeatherForecast {
    let offset = daily
        .iter()
        .find_map(|d| d.date.as_deref().and_then(parse_timestamp))
        .map(offset_from_local_midnight)
        .unwrap_or_else(Duration::zero);

    let hourly: Vec<HourlyPoint> = hourly
        .iter()
        .filter_map(|h| {
            let timestamp = h.time.as_deref().and_then(parse_timestamp)?;
            let rain = h.rain.as_ref().map(Rain::millimetres).unwrap_or(0.0);
            Some(HourlyPoint {
                timestamp,
                temp: h.temp.unwrap_or(0.0),
                precipitation: rain,
                rain,
                wind_speed: h
                    .wind
                    .as_ref()
                    .and_then(|w| w.speed_kilometre)
                    .unwrap_or(0.0),
            })
        })
        .collect();

    let mut wind_by_day: HashMap<NaiveDate, f64> = HashMap::new();
    for point in &hourly {
        let day = (point.timestamp + offset).date_naive();
        let max = wind_by_day.entry(day).or_insert(0.0);
        *max = max.max(point.wind_speed);
    }

    let daily: Vec<DailyPoint> = daily
        .iter()
        .filter_map(|d| {
            let date = d.date.as_deref().and_then(|s| local_date(s, offset))?;
            let rain = d.rain.as_ref().map(Rain::millimetres).unwrap_or(0.0);
            Some(DailyPoint {
                date,
                temp_max: d.temp_max.unwrap_or(0.0),
                temp_min: d.temp_min.unwrap_or(0.0),
                precipitation_sum: rain,
                rain_sum: rain,
                wind_speed_max: wind_by_day.get(&date).copied().unwrap_or(0.0),
                wind_direction_dominant: 0.0,
            })
        })
        .collect();

    WeatherForecast {
        coordinate,
        timezone: format_offset(offset),
        source: ForecastSource::Primary,
        daily,
        hourly,
        soil_moisture: Vec::new(),
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

fn local_date(raw: &str, offset: Duration) -> Option<NaiveDate> {
    match parse_timestamp(raw) {
        Some(ts) => Some((ts + offset).date_naive()),
        None => NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok(),
    }
}

fn offset_from_local_midnight(midnight: DateTime<Utc>) -> Duration {
    let secs = i64::from(midnight.num_seconds_from_midnight());
    if secs == 0 {
        Duration::zero()
    } else {
        Duration::seconds(86_400 - secs)
    }
}

fn format_offset(offset: Duration) -> String {
    let minutes = offset.num_minutes();
    if minutes == 0 {
        return "UTC".to_string();
    }
    format!("UTC+{:02}:{:02}", minutes / 60, minutes % 60)
}
