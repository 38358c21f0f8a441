//! Secondary provider: global coverage, up to 16 days, addressed by raw
//! latitude/longitude. Responses are columnar arrays keyed by variable.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::instrument;

use crate::http::{self, RetryConfig};
use crate::types::{
    DailyPoint, ForecastSource, GeoCoordinate, HourlyPoint, SoilMoisturePoint, WeatherError,
    WeatherForecast,
};

pub const SECONDARY_API_BASE: &str = "https://api.open-meteo.com/v1";

/// Longest horizon the secondary provider serves
pub const SECONDARY_MAX_DAYS: u32 = 16;

const DAILY_VARIABLES: &str = "temperature_2m_max,temperature_2m_min,precipitation_sum,\
rain_sum,wind_speed_10m_max,wind_direction_10m_dominant";

const HOURLY_VARIABLES: &str = "temperature_2m,precipitation,rain,wind_speed_10m,\
soil_moisture_0_to_1cm,soil_moisture_1_to_3cm,soil_moisture_3_to_9cm,soil_moisture_9_to_27cm";

type Column = Option<Vec<Option<f64>>>;

/// Raw secondary response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SecondaryResponse {
    pub timezone: Option<String>,
    pub utc_offset_seconds: Option<i64>,
    pub daily: Option<SecondaryDaily>,
    pub hourly: Option<SecondaryHourly>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SecondaryDaily {
    pub time: Vec<String>,
    pub temperature_2m_max: Column,
    pub temperature_2m_min: Column,
    pub precipitation_sum: Column,
    pub rain_sum: Column,
    pub wind_speed_10m_max: Column,
    pub wind_direction_10m_dominant: Column,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SecondaryHourly {
    pub time: Vec<String>,
    pub temperature_2m: Column,
    pub precipitation: Column,
    pub rain: Column,
    pub wind_speed_10m: Column,
    pub soil_moisture_0_to_1cm: Column,
    pub soil_moisture_1_to_3cm: Column,
    pub soil_moisture_3_to_9cm: Column,
    pub soil_moisture_9_to_27cm: Column,
}

pub struct SecondaryClient {
    client: Client,
    base_url: String,
    retry: RetryConfig,
}

impl SecondaryClient {
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

    /// Fetch and normalize a `days`-long forecast (clamped to 1..=16)
    #[instrument(skip(self), level = "info")]
    pub async fn forecast(
        &self,
        coordinate: GeoCoordinate,
        days: u32,
    ) -> Result<WeatherForecast, WeatherError> {
        let days = days.clamp(1, SECONDARY_MAX_DAYS);
        let url = format!(
            "{}/forecast?latitude={}&longitude={}&daily={}&hourly={}\
             &forecast_days={}&timezone=auto",
            self.base_url,
            coordinate.latitude,
            coordinate.longitude,
            DAILY_VARIABLES,
            HOURLY_VARIABLES,
            days,
        );

        let raw: SecondaryResponse = http::get_json(&self.client, &url, &self.retry).await?;
        let forecast = normalize(coordinate, raw);
        if forecast.daily.is_empty() {
            return Err(WeatherError::NoData);
        }
        Ok(forecast)
    }
}

/// Zip the columnar arrays into points, defaulting nulls and short columns
/// to zero. Local hourly timestamps are shifted to UTC with the response's
/// offset.
pub fn normalize(coordinate: GeoCoordinate, raw: SecondaryResponse) -> WeatherForecast {
    let offset = Duration::seconds(raw.utc_offset_seconds.unwrap_or(0));
    let daily_raw = raw.daily.unwrap_or_default();
    let hourly_raw = raw.hourly.unwrap_or_default();

    let daily = daily_raw
        .time
        .iter()
        .enumerate()
        .filter_map(|(i, day)| {
            let date = NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()?;
            Some(DailyPoint {
                date,
                temp_max: value_at(&daily_raw.temperature_2m_max, i),
                temp_min: value_at(&daily_raw.temperature_2m_min, i),
                precipitation_sum: value_at(&daily_raw.precipitation_sum, i),
                rain_sum: value_at(&daily_raw.rain_sum, i),
                wind_speed_max: value_at(&daily_raw.wind_speed_10m_max, i),
                wind_direction_dominant: value_at(&daily_raw.wind_direction_10m_dominant, i),
            })
        })
        .collect();

    let timestamps: Vec<Option<DateTime<Utc>>> = hourly_raw
        .time
        .iter()
        .map(|t| parse_local(t).map(|local| (local - offset).and_utc()))
        .collect();

    let hourly = timestamps
        .iter()
        .enumerate()
        .filter_map(|(i, ts)| {
            Some(HourlyPoint {
                timestamp: (*ts)?,
                temp: value_at(&hourly_raw.temperature_2m, i),
                precipitation: value_at(&hourly_raw.precipitation, i),
                rain: value_at(&hourly_raw.rain, i),
                wind_speed: value_at(&hourly_raw.wind_speed_10m, i),
            })
        })
        .collect();

    let has_soil = [
        &hourly_raw.soil_moisture_0_to_1cm,
        &hourly_raw.soil_moisture_1_to_3cm,
        &hourly_raw.soil_moisture_3_to_9cm,
        &hourly_raw.soil_moisture_9_to_27cm,
    ]
    .iter()
    .any(|column| column.is_some());

    let soil_moisture = if has_soil {
        timestamps
            .iter()
            .enumerate()
            .filter_map(|(i, ts)| {
                Some(SoilMoisturePoint {
                    timestamp: (*ts)?,
                    depth_0_1cm: optional_at(&hourly_raw.soil_moisture_0_to_1cm, i),
                    depth_1_3cm: optional_at(&hourly_raw.soil_moisture_1_to_3cm, i),
                    depth_3_9cm: optional_at(&hourly_raw.soil_moisture_3_to_9cm, i),
                    depth_9_27cm: optional_at(&hourly_raw.soil_moisture_9_to_27cm, i),
                })
            })
            .collect()
    } else {
        Vec::new()
    };

    WeatherForecast {
        coordinate,
        timezone: raw.timezone.unwrap_or_else(|| "UTC".to_string()),
        source: ForecastSource::Secondary,
        daily,
        hourly,
        soil_moisture,
    }
}

fn optional_at(column: &Column, i: usize) -> Option<f64> {
    column.as_ref().and_then(|values| values.get(i).copied().flatten())
}

fn value_at(column: &Column, i: usize) -> f64 {
    optional_at(column, i).unwrap_or(0.0)
}

fn parse_local(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M").ok()
}
