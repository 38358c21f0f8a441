//! Forecast acquisition and fusion.
//!
//! Inside primary coverage the near-term days come from the primary provider
//! and anything past its horizon from the secondary. Every upstream failure
//! degrades to the other provider or to `None`; nothing here returns an error
//! to the caller.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::cache::{TtlCache, FORECAST_TTL, OBSERVATION_TTL};
use crate::geokey::{self, GeoKey, DEFAULT_PRECISION};
use crate::http::{RetryConfig, DEFAULT_TIMEOUT_SECS};
use crate::primary::{self, PrimaryClient, PRIMARY_API_BASE, PRIMARY_MAX_DAYS};
use crate::secondary::{SecondaryClient, SECONDARY_API_BASE};
use crate::types::{
    ForecastSource, GeoCoordinate, LocationMatch, ObservationSnapshot, WeatherError,
    WeatherForecast,
};

/// Everything the engine needs to talk to its providers
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub primary_base_url: String,
    pub secondary_base_url: String,
    pub request_timeout: Duration,
    pub forecast_ttl: Duration,
    pub observation_ttl: Duration,
    pub geokey_precision: usize,
    pub retry: RetryConfig,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            primary_base_url: PRIMARY_API_BASE.to_string(),
            secondary_base_url: SECONDARY_API_BASE.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            forecast_ttl: FORECAST_TTL,
            observation_ttl: OBSERVATION_TTL,
            geokey_precision: DEFAULT_PRECISION,
            retry: RetryConfig::default(),
        }
    }
}

type KeyLock = Arc<tokio::sync::Mutex<()>>;

pub struct ForecastService {
    primary: PrimaryClient,
    secondary: SecondaryClient,
    forecasts: Arc<TtlCache<WeatherForecast>>,
    observations: Arc<TtlCache<ObservationSnapshot>>,
    precision: usize,
    in_flight: Mutex<HashMap<String, KeyLock>>,
}

impl ForecastService {
    /// Build a service with its own caches sized from `settings`
    pub fn new(settings: &EngineSettings) -> Result<Self, WeatherError> {
        Self::with_caches(
            settings,
            Arc::new(TtlCache::new(settings.forecast_ttl)),
            Arc::new(TtlCache::new(settings.observation_ttl)),
        )
    }

    /// Build a service around caches owned by the caller
    pub fn with_caches(
        settings: &EngineSettings,
        forecasts: Arc<TtlCache<WeatherForecast>>,
        observations: Arc<TtlCache<ObservationSnapshot>>,
    ) -> Result<Self, WeatherError> {
        Ok(Self {
            primary: PrimaryClient::new(
                &settings.primary_base_url,
                settings.request_timeout,
                settings.retry.clone(),
            )?,
            secondary: SecondaryClient::new(
                &settings.secondary_base_url,
                settings.request_timeout,
                settings.retry.clone(),
            )?,
            forecasts,
            observations,
            precision: settings.geokey_precision,
            in_flight: Mutex::new(HashMap::new()),
        })
    }

    pub fn forecast_cache(&self) -> &TtlCache<WeatherForecast> {
        &self.forecasts
    }

    pub fn observation_cache(&self) -> &TtlCache<ObservationSnapshot> {
        &self.observations
    }

    /// Fused forecast for `days` days, or `None` when no provider answered.
    pub async fn get_forecast(
        &self,
        coordinate: GeoCoordinate,
        days: u32,
    ) -> Option<WeatherForecast> {
        let key = geokey::encode(&coordinate, self.precision);
        let cache_key = format!("{}:{}", key, days);

        if let Some(hit) = self.forecasts.get(&cache_key) {
            tracing::debug!("Forecast cache hit for {}", cache_key);
            return Some(hit);
        }

        let lock = self.key_lock(&cache_key);
        let guard = lock.lock().await;

        // A concurrent caller may have filled it while we waited
        let result = match self.forecasts.get(&cache_key) {
            Some(hit) => Some(hit),
            None => {
                let fetched = self.acquire_forecast(coordinate, &key, days).await;
                if let Some(forecast) = &fetched {
                    self.forecasts.put(cache_key.clone(), forecast.clone());
                }
                fetched
            }
        };

        drop(guard);
        self.release_key(&cache_key, lock);
        result
    }

    /// Current conditions from the primary provider, when in coverage.
    pub async fn get_observations(&self, coordinate: GeoCoordinate) -> Option<ObservationSnapshot> {
        if !self.primary.covers(&coordinate) {
            tracing::debug!("No observation source outside primary coverage");
            return None;
        }

        let key = geokey::encode(&coordinate, self.precision);
        let cache_key = key.to_string();
        if let Some(hit) = self.observations.get(&cache_key) {
            tracing::debug!("Observation cache hit for {}", cache_key);
            return Some(hit);
        }

        let lock_key = format!("obs:{}", cache_key);
        let lock = self.key_lock(&lock_key);
        let guard = lock.lock().await;

        let result = match self.observations.get(&cache_key) {
            Some(hit) => Some(hit),
            None => match self.primary.observations(&key).await {
                Ok(snapshot) => {
                    self.observations.put(cache_key, snapshot.clone());
                    Some(snapshot)
                }
                Err(e) => {
                    tracing::warn!("Observations unavailable for {}: {}", key, e);
                    None
                }
            },
        };

        drop(guard);
        self.release_key(&lock_key, lock);
        result
    }

    /// First location matching `query`. Not cached.
    pub async fn search_location(&self, query: &str) -> Option<LocationMatch> {
        let query = query.trim();
        if query.is_empty() {
            return None;
        }

        match self.primary.search(query).await {
            Ok(matches) => matches.into_iter().next(),
            Err(e) => {
                tracing::warn!("Location search for '{}' failed: {}", query, e);
                None
            }
        }
    }

    async fn acquire_forecast(
        &self,
        coordinate: GeoCoordinate,
        key: &GeoKey,
        days: u32,
    ) -> Option<WeatherForecast> {
        if !self.primary.covers(&coordinate) {
            tracing::info!("{} outside primary coverage, using secondary provider", key);
            return self.secondary_only(coordinate, days).await;
        }

        let extended = days as usize > PRIMARY_MAX_DAYS;
        let extended_fetch = async {
            if extended {
                Some(self.secondary.forecast(coordinate, days).await)
            } else {
                None
            }
        };

        let (daily, hourly, secondary) = tokio::join!(
            self.primary.daily(key),
            self.primary.hourly(key),
            extended_fetch
        );

        let secondary = secondary.and_then(|result| match result {
            Ok(forecast) => Some(forecast),
            Err(e) => {
                tracing::warn!("Secondary forecast failed for {}: {}", key, e);
                None
            }
        });

        let daily = match daily {
            Ok(daily) => daily,
            Err(e) => {
                tracing::warn!("Primary daily forecast failed for {}: {}", key, e);
                if extended {
                    // Already requested concurrently; reuse rather than refetch
                    return secondary;
                }
                return self.secondary_only(coordinate, days).await;
            }
        };

        let hourly = hourly.unwrap_or_else(|e| {
            tracing::warn!("Primary hourly forecast failed for {}, continuing without: {}", key, e);
            Vec::new()
        });

        let mut primary = primary::normalize(coordinate, &daily, &hourly);

        if !extended {
            let days = days.max(1) as usize;
            primary.daily.truncate(days);
            primary.hourly.truncate(days * 24);
            tracing::info!("Primary forecast for {} ({} days)", key, primary.daily.len());
            return Some(primary);
        }

        match secondary {
            Some(secondary) => {
                let merged = merge(primary, secondary);
                tracing::info!("Hybrid forecast for {} ({} days)", key, merged.daily.len());
                Some(merged)
            }
            None => {
                tracing::warn!("Extended days unavailable for {}, returning primary only", key);
                Some(primary)
            }
        }
    }

    async fn secondary_only(
        &self,
        coordinate: GeoCoordinate,
        days: u32,
    ) -> Option<WeatherForecast> {
        match self.secondary.forecast(coordinate, days).await {
            Ok(forecast) => {
                tracing::info!("Secondary forecast ({} days)", forecast.daily.len());
                Some(forecast)
            }
            Err(e) => {
                tracing::warn!("Secondary forecast failed: {}", e);
                None
            }
        }
    }

    fn key_lock(&self, key: &str) -> KeyLock {
        self.in_flight.lock().entry(key.to_string()).or_default().clone()
    }

    fn release_key(&self, key: &str, lock: KeyLock) {
        let mut in_flight = self.in_flight.lock();
        // Map plus our handle: nobody else is waiting on this key
        if Arc::strong_count(&lock) <= 2 {
            in_flight.remove(key);
        }
    }
}

/// Splice a primary forecast onto a longer secondary one.
///
/// Days: the primary's first `min(7, len)` days, then the secondary from the
/// same index on. Hours: all primary hours, then the secondary from index
/// `primary.hourly.len()`; matched by count, not by timestamp.
pub fn merge(primary: WeatherForecast, secondary: WeatherForecast) -> WeatherForecast {
    let mut daily: Vec<_> = primary.daily.into_iter().take(PRIMARY_MAX_DAYS).collect();
    let primary_days = daily.len();
    daily.extend(secondary.daily.into_iter().skip(primary_days));

    let primary_hours = primary.hourly.len();
    let mut hourly = primary.hourly;
    hourly.extend(secondary.hourly.into_iter().skip(primary_hours));

    WeatherForecast {
        coordinate: primary.coordinate,
        timezone: secondary.timezone,
        source: ForecastSource::Hybrid,
        daily,
        hourly,
        soil_moisture: secondary.soil_moisture,
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use crate::types::{DailyPoint, HourlyPoint};
    use chrono::{Duration as ChronoDuration, NaiveDate, TimeZone, Utc};

    fn day(offset: i64, rain: f64) -> DailyPoint {
        DailyPoint {
            date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap() + ChronoDuration::days(offset),
            temp_max: 30.0,
            temp_min: 18.0,
            precipitation_sum: rain,
            rain_sum: rain,
            wind_speed_max: 20.0,
            wind_direction_dominant: 180.0,
        }
    }

    fn hour(offset: i64, rain: f64) -> HourlyPoint {
        HourlyPoint {
            timestamp: Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap()
                + ChronoDuration::hours(offset),
            temp: 25.0,
            precipitation: rain,
            rain,
            wind_speed: 10.0,
        }
    }

    fn forecast(source: ForecastSource, days: i64, hours: i64, rain: f64) -> WeatherForecast {
        WeatherForecast {
            coordinate: GeoCoordinate::new(-23.36, 119.73),
            timezone: "Australia/Perth".into(),
            source,
            daily: (0..days).map(|d| day(d, rain)).collect(),
            hourly: (0..hours).map(|h| hour(h, rain)).collect(),
            soil_moisture: Vec::new(),
        }
    }

    #[test]
    fn test_merge_daily_boundary() {
        let primary = forecast(ForecastSource::Primary, 7, 72, 1.0);
        let secondary = forecast(ForecastSource::Secondary, 16, 384, 2.0);

        let merged = merge(primary.clone(), secondary.clone());

        assert_eq!(merged.source, ForecastSource::Hybrid);
        assert_eq!(merged.daily.len(), 16);
        assert_eq!(&merged.daily[0..7], &primary.daily[..]);
        assert_eq!(&merged.daily[7..16], &secondary.daily[7..16]);
    }

    #[test]
    fn test_merge_hourly_by_count() {
        let primary = forecast(ForecastSource::Primary, 7, 72, 1.0);
        let secondary = forecast(ForecastSource::Secondary, 16, 384, 2.0);

        let merged = merge(primary, secondary.clone());

        assert_eq!(merged.hourly.len(), 384);
        assert_eq!(merged.hourly[71].rain, 1.0);
        assert_eq!(merged.hourly[72], secondary.hourly[72]);
    }

    #[test]
    fn test_merge_with_short_primary_keeps_days_contiguous() {
        let primary = forecast(ForecastSource::Primary, 5, 0, 1.0);
        let secondary = forecast(ForecastSource::Secondary, 10, 0, 2.0);

        let merged = merge(primary, secondary);

        assert_eq!(merged.daily.len(), 10);
        assert_eq!(merged.daily[4].rain_sum, 1.0);
        assert_eq!(merged.daily[5].rain_sum, 2.0);
        for pair in merged.daily.windows(2) {
            assert_eq!(pair[1].date - pair[0].date, ChronoDuration::days(1));
        }
        assert!(merged.hourly.is_empty());
    }

    #[test]
    fn test_default_settings() {
        let settings = EngineSettings::default();
        assert_eq!(settings.geokey_precision, 7);
        assert_eq!(settings.forecast_ttl, Duration::from_secs(10_800));
        assert_eq!(settings.observation_ttl, Duration::from_secs(900));
        assert_eq!(settings.request_timeout, Duration::from_secs(10));
    }
}
