//! Harvest, seeding and spraying window prediction for agricultural sites.

use chrono::{Datelike, Duration, NaiveDate};
use fuelwatch_weather::{DailyPoint, WeatherForecast};
use serde::{Deserialize, Serialize};

const HARVEST_MONTHS: std::ops::RangeInclusive<u32> = 9..=12;
const HARVEST_DRY_RAIN_MM: f64 = 2.0;
const HARVEST_MIN_RUN_DAYS: usize = 7;
const HARVEST_LOOKAHEAD_DAYS: usize = 7;
const HARVEST_LATE_RAIN_MM: f64 = 15.0;

const SEEDING_MONTHS: std::ops::RangeInclusive<u32> = 3..=7;
const SEEDING_BREAK_RAIN_MM: f64 = 20.0;
const SEEDING_DELAY_DAYS: i64 = 3;
const SEEDING_WINDOW_DAYS: i64 = 7;

const SPRAY_SEARCH_DAYS: usize = 7;
const SPRAY_MIN_RUN_DAYS: usize = 2;
const SPRAY_MAX_WIND_KMH: f64 = 15.0;
const SPRAY_MAX_RAIN_MM: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Harvest,
    Seeding,
    Spraying,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowStatus {
    Opening,
    Optimal,
    Closing,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuelImpact {
    pub expected_multiplier: f64,
    pub estimated_daily_usage_l: f64,
    pub estimated_total_usage_l: f64,
}

impl FuelImpact {
    fn over(expected_multiplier: f64, estimated_daily_usage_l: f64, days: usize) -> Self {
        Self {
            expected_multiplier,
            estimated_daily_usage_l,
            estimated_total_usage_l: estimated_daily_usage_l * days as f64,
        }
    }

    fn none() -> Self {
        Self {
            expected_multiplier: 1.0,
            estimated_daily_usage_l: 0.0,
            estimated_total_usage_l: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationWindow {
    pub operation: Operation,
    pub status: WindowStatus,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// 0-100
    pub confidence: u8,
    pub reasoning: String,
    pub fuel_impact: FuelImpact,
    pub recommendations: Vec<String>,
}

/// First run of consecutive days matching `qualifies` that is at least
/// `min_len` long, as inclusive indices. The run extends as far as it
/// continues to qualify.
fn find_run<F>(days: &[DailyPoint], min_len: usize, qualifies: F) -> Option<(usize, usize)>
where
    F: Fn(&DailyPoint) -> bool,
{
    let mut start = None;
    for (i, day) in days.iter().enumerate() {
        if qualifies(day) {
            start.get_or_insert(i);
        } else if let Some(s) = start.take() {
            if i - s >= min_len {
                return Some((s, i - 1));
            }
        }
    }
    start
        .filter(|&s| days.len() - s >= min_len)
        .map(|s| (s, days.len() - 1))
}

fn in_season(forecast: &WeatherForecast, months: &std::ops::RangeInclusive<u32>) -> bool {
    forecast
        .daily
        .first()
        .is_some_and(|day| months.contains(&day.date.month()))
}

/// Harvest window: the first dry run of at least a week during harvest
/// season (September to December).
pub fn predict_harvest(forecast: &WeatherForecast) -> Option<OperationWindow> {
    if !in_season(forecast, &HARVEST_MONTHS) {
        return None;
    }

    let daily = &forecast.daily;
    let (start, end) = find_run(daily, HARVEST_MIN_RUN_DAYS, |d| {
        d.rain_sum < HARVEST_DRY_RAIN_MM
    })?;
    let days = end - start + 1;

    let late_rain: f64 = daily
        .iter()
        .skip(end + 1)
        .take(HARVEST_LOOKAHEAD_DAYS)
        .map(|d| d.rain_sum)
        .sum();

    let mut recommendations = vec![
        "Fill header and chaser bin tanks before the window opens".to_string(),
        "Schedule bulk delivery to cover peak harvest usage".to_string(),
    ];
    if late_rain > HARVEST_LATE_RAIN_MM {
        recommendations.push(format!(
            "Deliver before {}: {:.0}mm of rain expected after the dry window",
            daily[end].date, late_rain
        ));
    }

    Some(OperationWindow {
        operation: Operation::Harvest,
        status: WindowStatus::Optimal,
        start_date: daily[start].date,
        end_date: daily[end].date,
        confidence: 85,
        reasoning: format!(
            "{} consecutive dry days (<{:.0}mm) from {}",
            days, HARVEST_DRY_RAIN_MM, daily[start].date
        ),
        fuel_impact: FuelImpact::over(2.5, 800.0, days),
        recommendations,
    })
}

/// Seeding window: opens a few days after the autumn break (the first day
/// with 20mm or more) between March and July.
pub fn predict_seeding(forecast: &WeatherForecast) -> Option<OperationWindow> {
    if !in_season(forecast, &SEEDING_MONTHS) {
        return None;
    }

    let daily = &forecast.daily;
    let first = daily.first()?;

    let Some(season_break) = daily.iter().find(|d| d.rain_sum >= SEEDING_BREAK_RAIN_MM) else {
        return Some(OperationWindow {
            operation: Operation::Seeding,
            status: WindowStatus::Closed,
            start_date: first.date,
            end_date: first.date,
            confidence: 50,
            reasoning: format!(
                "Waiting for the break: no day with {:.0}mm or more in the forecast",
                SEEDING_BREAK_RAIN_MM
            ),
            fuel_impact: FuelImpact::none(),
            recommendations: vec!["Keep seeding equipment fuelled and ready".to_string()],
        });
    };

    let start_date = season_break.date + Duration::days(SEEDING_DELAY_DAYS);
    let end_date = start_date + Duration::days(SEEDING_WINDOW_DAYS - 1);

    Some(OperationWindow {
        operation: Operation::Seeding,
        status: WindowStatus::Opening,
        start_date,
        end_date,
        confidence: 80,
        reasoning: format!(
            "Break of {:.0}mm on {}; soil should be workable from {}",
            season_break.rain_sum, season_break.date, start_date
        ),
        fuel_impact: FuelImpact::over(1.8, 300.0, SEEDING_WINDOW_DAYS as usize),
        recommendations: vec![
            format!("Top up seeding tractor fuel before {}", start_date),
            "Expect sustained daily usage while the window is open".to_string(),
        ],
    })
}

/// Spraying window: two or more calm, dry days within the next week.
pub fn predict_spraying(forecast: &WeatherForecast) -> Option<OperationWindow> {
    let daily = &forecast.daily;
    let search = &daily[..daily.len().min(SPRAY_SEARCH_DAYS)];

    let (start, end) = find_run(search, SPRAY_MIN_RUN_DAYS, |d| {
        d.wind_speed_max < SPRAY_MAX_WIND_KMH && d.rain_sum < SPRAY_MAX_RAIN_MM
    })?;
    let days = end - start + 1;

    Some(OperationWindow {
        operation: Operation::Spraying,
        status: WindowStatus::Optimal,
        start_date: search[start].date,
        end_date: search[end].date,
        confidence: 75,
        reasoning: format!(
            "{} days with wind below {:.0} km/h and no meaningful rain",
            days, SPRAY_MAX_WIND_KMH
        ),
        fuel_impact: FuelImpact::over(1.3, 120.0, days),
        recommendations: vec![
            "Fuel boom sprayers the evening before".to_string(),
            "Spray early while winds are lightest".to_string(),
        ],
    })
}

/// Run every predictor and keep the windows that apply.
pub fn predict_operations(forecast: &WeatherForecast) -> Vec<OperationWindow> {
    let windows: Vec<_> = [
        predict_harvest(forecast),
        predict_seeding(forecast),
        predict_spraying(forecast),
    ]
    .into_iter()
    .flatten()
    .collect();

    tracing::debug!(
        "Predicted {} operation windows over {} days",
        windows.len(),
        forecast.daily.len()
    );
    windows
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use fuelwatch_weather::{ForecastSource, GeoCoordinate};

    /// Daily series from (rain, wind) pairs starting on `start`
    fn forecast_from(start: NaiveDate, days: &[(f64, f64)]) -> WeatherForecast {
        WeatherForecast {
            coordinate: GeoCoordinate::new(-33.6, 117.0),
            timezone: "Australia/Perth".into(),
            source: ForecastSource::Hybrid,
            daily: days
                .iter()
                .enumerate()
                .map(|(i, &(rain, wind))| DailyPoint {
                    date: start + Duration::days(i as i64),
                    temp_max: 24.0,
                    temp_min: 10.0,
                    precipitation_sum: rain,
                    rain_sum: rain,
                    wind_speed_max: wind,
                    wind_direction_dominant: 180.0,
                })
                .collect(),
            hourly: Vec::new(),
            soil_moisture: Vec::new(),
        }
    }

    fn date(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, month, day).unwrap()
    }

    fn rain_only(start: NaiveDate, rain: &[f64]) -> WeatherForecast {
        let days: Vec<_> = rain.iter().map(|&r| (r, 25.0)).collect();
        forecast_from(start, &days)
    }

    #[test]
    fn test_harvest_dry_window_stops_at_rain() {
        let mut rain = vec![0.5; 10];
        rain[7] = 5.0;
        let forecast = rain_only(date(10, 1), &rain);

        let window = predict_harvest(&forecast).unwrap();
        assert_eq!(window.status, WindowStatus::Optimal);
        assert_eq!(window.start_date, date(10, 1));
        assert_eq!(window.end_date, date(10, 7));
        assert_eq!(window.confidence, 85);
        assert_eq!(window.fuel_impact.expected_multiplier, 2.5);
        assert_eq!(window.fuel_impact.estimated_daily_usage_l, 800.0);
        assert_eq!(window.fuel_impact.estimated_total_usage_l, 5600.0);
    }

    #[test]
    fn test_harvest_late_rain_recommendation() {
        let mut rain = vec![0.0; 12];
        rain[8] = 10.0;
        rain[9] = 8.0;
        let forecast = rain_only(date(11, 3), &rain);

        let window = predict_harvest(&forecast).unwrap();
        assert_eq!(window.end_date, date(11, 10));
        assert!(window
            .recommendations
            .iter()
            .any(|r| r.starts_with("Deliver before 2025-11-10")));

        let dry = rain_only(date(11, 3), &[0.0; 12]);
        let window = predict_harvest(&dry).unwrap();
        assert!(!window.recommendations.iter().any(|r| r.starts_with("Deliver")));
    }

    #[test]
    fn test_harvest_out_of_season_or_short() {
        assert!(predict_harvest(&rain_only(date(6, 1), &[0.0; 10])).is_none());
        assert!(predict_harvest(&rain_only(date(10, 1), &[0.0; 6])).is_none());
        assert!(predict_harvest(&rain_only(date(10, 1), &[])).is_none());
    }

    #[test]
    fn test_seeding_opens_after_break() {
        let forecast = rain_only(date(4, 20), &[0.0, 3.0, 22.0, 5.0, 0.0]);
        let window = predict_seeding(&forecast).unwrap();

        assert_eq!(window.status, WindowStatus::Opening);
        assert_eq!(window.start_date, date(4, 25));
        assert_eq!(window.end_date, date(5, 1));
        assert_eq!(window.confidence, 80);
        assert_eq!(window.fuel_impact.expected_multiplier, 1.8);
        assert_eq!(window.fuel_impact.estimated_total_usage_l, 2100.0);
    }

    #[test]
    fn test_seeding_waits_for_break() {
        let forecast = rain_only(date(5, 1), &[5.0, 10.0, 19.9]);
        let window = predict_seeding(&forecast).unwrap();

        assert_eq!(window.status, WindowStatus::Closed);
        assert!(window.reasoning.contains("Waiting for the break"));
        assert_eq!(window.fuel_impact.estimated_daily_usage_l, 0.0);
        assert_eq!(window.fuel_impact.estimated_total_usage_l, 0.0);
    }

    #[test]
    fn test_seeding_out_of_season() {
        assert!(predict_seeding(&rain_only(date(9, 1), &[30.0])).is_none());
        assert!(predict_seeding(&rain_only(date(5, 1), &[])).is_none());
    }

    #[test]
    fn test_spraying_calm_dry_run() {
        let forecast = forecast_from(
            date(8, 1),
            &[(0.0, 25.0), (0.0, 10.0), (0.5, 12.0), (0.0, 14.0), (3.0, 5.0)],
        );
        let window = predict_spraying(&forecast).unwrap();

        assert_eq!(window.start_date, date(8, 2));
        assert_eq!(window.end_date, date(8, 4));
        assert_eq!(window.confidence, 75);
        assert_eq!(window.fuel_impact.expected_multiplier, 1.3);
        assert_eq!(window.fuel_impact.estimated_total_usage_l, 360.0);
    }

    #[test]
    fn test_spraying_only_searches_first_week() {
        let mut days = vec![(0.0, 30.0); 10];
        days[7] = (0.0, 5.0);
        days[8] = (0.0, 5.0);
        assert!(predict_spraying(&forecast_from(date(8, 1), &days)).is_none());

        // A run touching day 7 is cut at the week boundary
        days[6] = (0.0, 5.0);
        assert!(predict_spraying(&forecast_from(date(8, 1), &days)).is_none());
        days[5] = (0.0, 5.0);
        let window = predict_spraying(&forecast_from(date(8, 1), &days)).unwrap();
        assert_eq!(window.end_date, date(8, 7));
    }

    #[test]
    fn test_single_calm_day_is_not_a_window() {
        let forecast = forecast_from(date(8, 1), &[(0.0, 5.0), (0.0, 20.0), (0.0, 5.0)]);
        assert!(predict_spraying(&forecast).is_none());
        assert!(predict_spraying(&forecast_from(date(8, 1), &[])).is_none());
    }

    #[test]
    fn test_predict_operations_collects_applicable() {
        // October: harvest and spraying apply, seeding does not
        let forecast = forecast_from(date(10, 1), &[(0.0, 8.0); 8]);
        let ops: Vec<_> = predict_operations(&forecast)
            .iter()
            .map(|w| w.operation)
            .collect();
        assert_eq!(ops, vec![Operation::Harvest, Operation::Spraying]);
    }

    #[test]
    fn test_find_run_extends_to_end() {
        let forecast = rain_only(date(10, 1), &[5.0, 0.0, 0.0, 0.0]);
        let run = find_run(&forecast.daily, 2, |d| d.rain_sum < 1.0);
        assert_eq!(run, Some((1, 3)));
        assert_eq!(find_run(&forecast.daily, 4, |d| d.rain_sum < 1.0), None);
    }
}
