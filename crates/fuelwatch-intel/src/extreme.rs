//! Extreme weather event detection over a fused forecast.
//!
//! Each category is one left-to-right pass over the daily series. Heat runs
//! coalesce into multi-day events; cyclone, storm and heavy-rain days are
//! reported individually.

use chrono::NaiveDate;
use fuelwatch_weather::{DailyPoint, GeoCoordinate, WeatherForecast};
use serde::{Deserialize, Serialize};

use crate::policy::{
    in_cyclone_region, IndustryThresholds, IndustryType, RegionConfig, CYCLONE_ALERT_WIND_KMH,
    HEAT_ALERT_RUN_DAYS, STORM_MIN_RAIN_MM, STORM_WARNING_WIND_KMH,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventType {
    Heat,
    Cyclone,
    Storm,
    HeavyRain,
}

/// Ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Watch,
    Warning,
    Alert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventImpact {
    pub equipment_risk: RiskLevel,
    pub site_access_risk: RiskLevel,
    pub worker_safety_risk: RiskLevel,
    pub fuel_consumption_multiplier: f64,
    pub advisory: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtremeWeatherEvent {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub severity: Severity,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// °C for heat, km/h for wind events, mm for rain
    pub peak_value: f64,
    pub impact: EventImpact,
    pub recommendations: Vec<String>,
}

/// Detect events using the region policy implied by `coordinate`.
///
/// Without a coordinate there is no cyclone scan and the default region
/// policy applies. Results are ordered alert first, then by start date.
pub fn detect_events(
    forecast: &WeatherForecast,
    industry: IndustryType,
    coordinate: Option<&GeoCoordinate>,
) -> Vec<ExtremeWeatherEvent> {
    let region = RegionConfig::for_coordinate(coordinate);
    detect_events_with_region(forecast, industry, coordinate, &region)
}

pub fn detect_events_with_region(
    forecast: &WeatherForecast,
    industry: IndustryType,
    coordinate: Option<&GeoCoordinate>,
    region: &RegionConfig,
) -> Vec<ExtremeWeatherEvent> {
    let thresholds = industry.thresholds();
    let daily = &forecast.daily;

    let mut events = detect_heat(daily, thresholds, industry);
    if industry == IndustryType::Mining && coordinate.is_some_and(in_cyclone_region) {
        events.extend(detect_cyclones(daily, thresholds));
    }
    events.extend(detect_storms(daily, thresholds, industry));
    events.extend(detect_heavy_rain(daily, thresholds, region, industry));

    events.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| a.start_date.cmp(&b.start_date))
    });

    tracing::debug!(
        "Detected {} extreme weather events over {} days ({:?}, region {})",
        events.len(),
        daily.len(),
        industry,
        region.region
    );
    events
}

fn detect_heat(
    daily: &[DailyPoint],
    thresholds: &IndustryThresholds,
    industry: IndustryType,
) -> Vec<ExtremeWeatherEvent> {
    let mut events = Vec::new();
    // (first index, last index, peak)
    let mut run: Option<(usize, usize, f64)> = None;

    for (i, day) in daily.iter().enumerate() {
        if day.temp_max >= thresholds.extreme_heat_c {
            run = Some(match run {
                Some((start, _, peak)) => (start, i, peak.max(day.temp_max)),
                None => (i, i, day.temp_max),
            });
        } else if let Some((start, end, peak)) = run.take() {
            events.push(heat_event(daily, start, end, peak, industry));
        }
    }
    if let Some((start, end, peak)) = run {
        events.push(heat_event(daily, start, end, peak, industry));
    }

    events
}

fn heat_event(
    daily: &[DailyPoint],
    start: usize,
    end: usize,
    peak: f64,
    industry: IndustryType,
) -> ExtremeWeatherEvent {
    let run_days = end - start + 1;
    let severity = if run_days >= HEAT_ALERT_RUN_DAYS {
        Severity::Alert
    } else {
        Severity::Warning
    };

    let mut recommendations = vec![
        "Enforce hydration and rest breaks during the hottest hours".to_string(),
        "Expect roughly 20% higher fuel use from cooling and idling".to_string(),
    ];
    if industry == IndustryType::Mining {
        recommendations.push("Shift heavy equipment work to early morning shifts".to_string());
        recommendations.push("Check radiators, coolant levels and tyre pressures".to_string());
    } else {
        recommendations.push("Reschedule strenuous outdoor work to cooler periods".to_string());
    }

    ExtremeWeatherEvent {
        event_type: EventType::Heat,
        severity,
        start_date: daily[start].date,
        end_date: daily[end].date,
        peak_value: peak,
        impact: EventImpact {
            equipment_risk: RiskLevel::High,
            site_access_risk: RiskLevel::Low,
            worker_safety_risk: RiskLevel::High,
            fuel_consumption_multiplier: 1.2,
            advisory: format!(
                "{} day(s) of extreme heat peaking at {:.0}°C",
                run_days, peak
            ),
        },
        recommendations,
    }
}

fn detect_cyclones(
    daily: &[DailyPoint],
    thresholds: &IndustryThresholds,
) -> Vec<ExtremeWeatherEvent> {
    daily
        .iter()
        .filter(|day| day.wind_speed_max >= thresholds.cyclone_wind_kmh)
        .map(|day| {
            // A cyclonic rain band escalates even sub-120 km/h days
            let severity = if day.wind_speed_max >= CYCLONE_ALERT_WIND_KMH
                || day.rain_sum >= thresholds.heavy_rain_24h_mm
            {
                Severity::Alert
            } else {
                Severity::Warning
            };

            ExtremeWeatherEvent {
                event_type: EventType::Cyclone,
                severity,
                start_date: day.date,
                end_date: day.date,
                peak_value: day.wind_speed_max,
                impact: EventImpact {
                    equipment_risk: RiskLevel::High,
                    site_access_risk: RiskLevel::High,
                    worker_safety_risk: RiskLevel::High,
                    fuel_consumption_multiplier: 0.5,
                    advisory: format!(
                        "Cyclonic winds of {:.0} km/h with {:.0}mm rain on {}",
                        day.wind_speed_max, day.rain_sum, day.date
                    ),
                },
                recommendations: vec![
                    "Fill all site tanks to capacity before the system arrives".to_string(),
                    "Secure or relocate mobile equipment and fuel trailers".to_string(),
                    "Activate the site cyclone plan and confirm evacuation routes".to_string(),
                    "Expect operations to scale down; deliveries may be suspended".to_string(),
                ],
            }
        })
        .collect()
}

fn detect_storms(
    daily: &[DailyPoint],
    thresholds: &IndustryThresholds,
    industry: IndustryType,
) -> Vec<ExtremeWeatherEvent> {
    daily
        .iter()
        .filter(|day| {
            day.wind_speed_max >= thresholds.storm_wind_kmh
                && day.wind_speed_max < thresholds.cyclone_wind_kmh
                && day.rain_sum >= STORM_MIN_RAIN_MM
        })
        .map(|day| {
            let severity = if day.wind_speed_max >= STORM_WARNING_WIND_KMH {
                Severity::Warning
            } else {
                Severity::Watch
            };

            let mut recommendations = vec![
                "Secure loose materials and check drainage around fuel storage".to_string(),
            ];
            if industry == IndustryType::Mining {
                recommendations.push("Suspend crane and elevated work during gusts".to_string());
            } else {
                recommendations.push("Postpone spraying and elevated work".to_string());
            }

            ExtremeWeatherEvent {
                event_type: EventType::Storm,
                severity,
                start_date: day.date,
                end_date: day.date,
                peak_value: day.wind_speed_max,
                impact: EventImpact {
                    equipment_risk: RiskLevel::Moderate,
                    site_access_risk: RiskLevel::Moderate,
                    worker_safety_risk: RiskLevel::Moderate,
                    fuel_consumption_multiplier: 0.9,
                    advisory: format!(
                        "Storm conditions: {:.0} km/h winds and {:.0}mm rain on {}",
                        day.wind_speed_max, day.rain_sum, day.date
                    ),
                },
                recommendations,
            }
        })
        .collect()
}

fn detect_heavy_rain(
    daily: &[DailyPoint],
    thresholds: &IndustryThresholds,
    region: &RegionConfig,
    industry: IndustryType,
) -> Vec<ExtremeWeatherEvent> {
    let severe = region.severe_flood_threshold_mm;

    daily
        .iter()
        .filter(|day| region.cares_about_rain || day.rain_sum >= severe)
        .filter(|day| day.rain_sum >= thresholds.heavy_rain_24h_mm)
        .map(|day| {
            let severity = if day.rain_sum >= severe {
                Severity::Alert
            } else if day.rain_sum >= thresholds.heavy_rain_48h_mm {
                Severity::Warning
            } else {
                Severity::Watch
            };

            let mut recommendations = vec![
                "Deliver fuel before rainfall; access roads may close".to_string(),
            ];
            if industry == IndustryType::Mining {
                recommendations
                    .push("Check bunding and pit dewatering pump fuel levels".to_string());
            }
            if severity == Severity::Alert {
                recommendations
                    .push("Prepare for flooding and extended site isolation".to_string());
            }

            ExtremeWeatherEvent {
                event_type: EventType::HeavyRain,
                severity,
                start_date: day.date,
                end_date: day.date,
                peak_value: day.rain_sum,
                impact: EventImpact {
                    equipment_risk: RiskLevel::Low,
                    site_access_risk: RiskLevel::High,
                    worker_safety_risk: RiskLevel::Moderate,
                    fuel_consumption_multiplier: 1.0,
                    advisory: format!("{:.0}mm of rain forecast on {}", day.rain_sum, day.date),
                },
                recommendations,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use chrono::Duration;
    use fuelwatch_weather::ForecastSource;

    fn forecast_from(days: &[(f64, f64, f64)]) -> WeatherForecast {
        let start = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap();
        WeatherForecast {
            coordinate: GeoCoordinate::new(-20.74, 116.85),
            timezone: "Australia/Perth".into(),
            source: ForecastSource::Secondary,
            daily: days
                .iter()
                .enumerate()
                .map(|(i, &(temp_max, wind, rain))| DailyPoint {
                    date: start + Duration::days(i as i64),
                    temp_max,
                    temp_min: 25.0,
                    precipitation_sum: rain,
                    rain_sum: rain,
                    wind_speed_max: wind,
                    wind_direction_dominant: 0.0,
                })
                .collect(),
            hourly: Vec::new(),
            soil_moisture: Vec::new(),
        }
    }

    fn temps(values: &[f64]) -> WeatherForecast {
        let days: Vec<_> = values.iter().map(|&t| (t, 10.0, 0.0)).collect();
        forecast_from(&days)
    }

    #[test]
    fn test_heat_runs_coalesce() {
        let forecast = temps(&[46.0, 47.0, 44.0, 30.0, 46.0]);
        let events = detect_events(&forecast, IndustryType::General, None);

        assert_eq!(events.len(), 2);
        let first = &events[0];
        assert_eq!(first.event_type, EventType::Heat);
        assert_eq!(first.severity, Severity::Warning);
        assert_eq!(first.start_date, forecast.daily[0].date);
        assert_eq!(first.end_date, forecast.daily[1].date);
        assert_eq!(first.peak_value, 47.0);

        let second = &events[1];
        assert_eq!(second.start_date, forecast.daily[4].date);
        assert_eq!(second.end_date, forecast.daily[4].date);
        assert_eq!(second.peak_value, 46.0);
        assert_eq!(second.severity, Severity::Warning);
        assert_eq!(second.impact.fuel_consumption_multiplier, 1.2);
    }

    #[test]
    fn test_three_day_heat_is_alert() {
        let forecast = temps(&[46.0, 47.0, 48.0]);
        let events = detect_events(&forecast, IndustryType::Mining, None);

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].severity, Severity::Alert);
        assert_eq!(events[0].end_date, forecast.daily[2].date);
        assert_eq!(events[0].peak_value, 48.0);
    }

    #[test]
    fn test_44_degrees_never_qualifies() {
        let forecast = temps(&[44.9, 44.0, 43.0]);
        assert!(detect_events(&forecast, IndustryType::Mining, None).is_empty());
    }

    #[test]
    fn test_cyclone_end_to_end() {
        let forecast = forecast_from(&[
            (35.0, 20.0, 0.0),
            (34.0, 30.0, 5.0),
            (33.0, 45.0, 12.0),
            (30.0, 95.0, 50.0),
            (31.0, 40.0, 8.0),
        ]);
        let port_hedland = GeoCoordinate::new(-20.31, 118.6);

        let events = detect_events(&forecast, IndustryType::Mining, Some(&port_hedland));
        let cyclone = events
            .iter()
            .find(|e| e.event_type == EventType::Cyclone)
            .unwrap();

        assert_eq!(cyclone.severity, Severity::Alert);
        assert_eq!(cyclone.start_date, forecast.daily[3].date);
        assert_eq!(cyclone.impact.equipment_risk, RiskLevel::High);
        assert_eq!(cyclone.impact.fuel_consumption_multiplier, 0.5);
        // 95 km/h is at or above the cyclone threshold, so not a storm
        assert!(events.iter().all(|e| e.event_type != EventType::Storm));
    }

    #[test]
    fn test_cyclone_without_rain_band_is_warning() {
        let forecast = forecast_from(&[(30.0, 100.0, 5.0)]);
        let site = GeoCoordinate::new(-20.31, 118.6);
        let events = detect_events(&forecast, IndustryType::Mining, Some(&site));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].severity, Severity::Warning);
    }

    #[test]
    fn test_no_cyclone_scan_for_general_or_outside_region() {
        let forecast = forecast_from(&[(30.0, 130.0, 0.0)]);
        let hedland = GeoCoordinate::new(-20.31, 118.6);
        let perth = GeoCoordinate::new(-31.95, 115.86);

        assert!(detect_events(&forecast, IndustryType::General, Some(&hedland)).is_empty());
        assert!(detect_events(&forecast, IndustryType::Mining, Some(&perth)).is_empty());
        assert!(detect_events(&forecast, IndustryType::Mining, None).is_empty());
    }

    #[test]
    fn test_storm_severity() {
        let forecast = forecast_from(&[
            (30.0, 55.0, 12.0), // general storm watch
            (30.0, 75.0, 15.0), // warning
            (30.0, 75.0, 5.0),  // too dry
            (30.0, 40.0, 20.0), // too calm
        ]);
        let events = detect_events(&forecast, IndustryType::General, None);

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].severity, Severity::Warning);
        assert_eq!(events[0].peak_value, 75.0);
        assert_eq!(events[1].severity, Severity::Watch);
        assert_eq!(events[1].impact.fuel_consumption_multiplier, 0.9);

        // Mining storm threshold is higher
        let mining = detect_events(&forecast, IndustryType::Mining, None);
        assert_eq!(mining.len(), 1);
    }

    #[test]
    fn test_rain_suppressed_outside_caring_regions() {
        let region = RegionConfig::new("wheatbelt", false, 80.0);

        let moderate = forecast_from(&[(25.0, 10.0, 30.0)]);
        let events =
            detect_events_with_region(&moderate, IndustryType::General, None, &region);
        assert!(events.is_empty());

        let severe = forecast_from(&[(25.0, 10.0, 85.0)]);
        let events = detect_events_with_region(&severe, IndustryType::General, None, &region);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::HeavyRain);
        assert_eq!(events[0].severity, Severity::Alert);
    }

    #[test]
    fn test_rain_severity_in_caring_region() {
        let region = RegionConfig::new("pilbara", true, 80.0);
        let forecast = forecast_from(&[
            (25.0, 10.0, 30.0),
            (25.0, 10.0, 55.0),
            (25.0, 10.0, 90.0),
            (25.0, 10.0, 10.0),
        ]);
        let events = detect_events_with_region(&forecast, IndustryType::General, None, &region);

        let severities: Vec<_> = events.iter().map(|e| e.severity).collect();
        assert_eq!(
            severities,
            vec![Severity::Alert, Severity::Warning, Severity::Watch]
        );
        assert!(events.iter().all(|e| e.impact.fuel_consumption_multiplier == 1.0));
    }

    #[test]
    fn test_sorted_by_severity_then_date() {
        let forecast = forecast_from(&[
            (46.0, 10.0, 0.0),  // heat warning, day 0
            (30.0, 55.0, 12.0), // storm watch, day 1
            (30.0, 10.0, 0.0),
            (46.0, 10.0, 0.0), // heat run, days 3-5 -> alert
            (47.0, 10.0, 0.0),
            (46.0, 10.0, 0.0),
        ]);
        let events = detect_events(&forecast, IndustryType::General, None);

        let summary: Vec<_> = events
            .iter()
            .map(|e| (e.event_type, e.severity, e.start_date))
            .collect();
        assert_eq!(
            summary,
            vec![
                (EventType::Heat, Severity::Alert, forecast.daily[3].date),
                (EventType::Heat, Severity::Warning, forecast.daily[0].date),
                (EventType::Storm, Severity::Watch, forecast.daily[1].date),
            ]
        );
    }

    #[test]
    fn test_empty_forecast() {
        let forecast = forecast_from(&[]);
        assert!(detect_events(&forecast, IndustryType::Mining, None).is_empty());
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let forecast = temps(&[46.0]);
        let events = detect_events(&forecast, IndustryType::General, None);
        let json = serde_json::to_value(&events[0]).unwrap();
        assert_eq!(json["type"], "heat");
        assert_eq!(json["severity"], "warning");
    }
}
