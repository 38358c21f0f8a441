//! Access road closure risk against on-site fuel supply.

use chrono::{DateTime, NaiveTime, Utc};
use fuelwatch_weather::WeatherForecast;
use serde::{Deserialize, Serialize};

/// Hours of hourly rain summed for the closure outlook
pub const OUTLOOK_HOURS: usize = 48;

/// Consumption below this is treated as no consumption
const MIN_DAILY_CONSUMPTION_L: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessRoadType {
    Sealed,
    Gravel,
    Unsealed,
}

/// Site access road characteristics, supplied by fleet configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadProfile {
    pub access_road_type: AccessRoadType,
    /// 48h rainfall (mm) above which the road is expected to be impassable
    pub closure_threshold_mm: f64,
    pub typical_closure_duration_days: u32,
    pub alternative_route_available: bool,
}

impl RoadProfile {
    /// Typical figures for a road surface with no alternative route
    pub fn for_road_type(access_road_type: AccessRoadType) -> Self {
        let (closure_threshold_mm, typical_closure_duration_days) = match access_road_type {
            AccessRoadType::Sealed => (100.0, 1),
            AccessRoadType::Gravel => (50.0, 3),
            AccessRoadType::Unsealed => (25.0, 5),
        };
        Self {
            access_road_type,
            closure_threshold_mm,
            typical_closure_duration_days,
            alternative_route_available: false,
        }
    }
}

impl Default for RoadProfile {
    fn default() -> Self {
        Self::for_road_type(AccessRoadType::Gravel)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoadRiskLevel {
    Low,
    Moderate,
    High,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadRiskAssessment {
    pub risk_level: RoadRiskLevel,
    /// Closure probability, 0-100
    pub probability: u8,
    pub estimated_closure_date: Option<DateTime<Utc>>,
    /// Days; zero when no closure is expected
    pub estimated_closure_duration: u32,
    pub rainfall_48h_mm: f64,
    /// `None` when consumption is effectively zero
    pub days_of_supply: Option<f64>,
    pub reasoning: String,
    pub recommendations: Vec<String>,
}

/// Closure probability (%) for a 48h rainfall to closure-threshold ratio
pub fn closure_probability(ratio: f64) -> u8 {
    if ratio >= 1.2 {
        95
    } else if ratio >= 1.0 {
        80
    } else if ratio >= 0.8 {
        60
    } else if ratio >= 0.5 {
        30
    } else {
        10
    }
}

/// Assess the chance the access road closes in the next 48 hours and
/// whether the tank would outlast a closure.
pub fn assess_risk(
    forecast: &WeatherForecast,
    road: &RoadProfile,
    current_tank_level_l: f64,
    daily_consumption_l: f64,
) -> RoadRiskAssessment {
    let threshold = road.closure_threshold_mm;
    let (rainfall_48h, crossing) = rainfall_outlook(forecast, threshold);

    let ratio = if threshold > 0.0 {
        rainfall_48h / threshold
    } else if rainfall_48h > 0.0 {
        f64::INFINITY
    } else {
        0.0
    };
    let probability = closure_probability(ratio);

    let days_of_supply = (daily_consumption_l > MIN_DAILY_CONSUMPTION_L)
        .then(|| current_tank_level_l / daily_consumption_l);
    let closure_days = road.typical_closure_duration_days;
    let exceeds = ratio >= 1.0;

    let risk_level = if exceeds && days_of_supply.is_some_and(|d| d <= f64::from(closure_days)) {
        RoadRiskLevel::Critical
    } else if exceeds {
        RoadRiskLevel::High
    } else if probability > 50 {
        RoadRiskLevel::Moderate
    } else {
        RoadRiskLevel::Low
    };

    let supply_text = match days_of_supply {
        Some(days) => format!("{:.1} days of fuel on site", days),
        None => "no measurable daily consumption".to_string(),
    };

    let reasoning = match risk_level {
        RoadRiskLevel::Critical => format!(
            "{:.0}mm of rain expected in 48h exceeds the {:.0}mm closure threshold. \
             With {} the site would run dry during a typical {}-day closure.",
            rainfall_48h, threshold, supply_text, closure_days
        ),
        RoadRiskLevel::High => format!(
            "{:.0}mm of rain expected in 48h exceeds the {:.0}mm closure threshold. \
             Current supply ({}) should outlast a typical {}-day closure.",
            rainfall_48h, threshold, supply_text, closure_days
        ),
        RoadRiskLevel::Moderate => format!(
            "{:.0}mm of rain expected in 48h is approaching the {:.0}mm closure threshold.",
            rainfall_48h, threshold
        ),
        RoadRiskLevel::Low => format!(
            "{:.0}mm of rain expected in 48h, well below the {:.0}mm closure threshold.",
            rainfall_48h, threshold
        ),
    };

    let mut recommendations = Vec::new();
    match risk_level {
        RoadRiskLevel::Critical => {
            recommendations.push("Schedule an emergency delivery before rain starts".to_string());
            recommendations.push("Fill all tanks to capacity".to_string());
            recommendations.push("Reduce non-essential fuel use until access reopens".to_string());
        }
        RoadRiskLevel::High => {
            recommendations.push("Top up tanks before the road closes".to_string());
            recommendations.push("Monitor road condition reports".to_string());
        }
        RoadRiskLevel::Moderate => {
            recommendations.push("Consider bringing the next delivery forward".to_string());
        }
        RoadRiskLevel::Low => {
            recommendations.push("No action required; continue normal deliveries".to_string());
        }
    }
    if risk_level >= RoadRiskLevel::High && road.alternative_route_available {
        recommendations.push("Confirm the alternative route is open for tankers".to_string());
    }
    if risk_level >= RoadRiskLevel::Moderate && road.access_road_type != AccessRoadType::Sealed {
        recommendations.push("Unsealed surfaces may stay closed after rain stops".to_string());
    }

    tracing::debug!(
        "Road risk {:?}: {:.1}mm/48h vs {:.1}mm threshold, probability {}%",
        risk_level,
        rainfall_48h,
        threshold,
        probability
    );

    RoadRiskAssessment {
        risk_level,
        probability,
        estimated_closure_date: crossing,
        estimated_closure_duration: if crossing.is_some() { closure_days } else { 0 },
        rainfall_48h_mm: rainfall_48h,
        days_of_supply,
        reasoning,
        recommendations,
    }
}

/// 48h rainfall total and the moment cumulative rain first reaches
/// `threshold`. Falls back to the first two daily totals when the forecast
/// has no hourly series.
fn rainfall_outlook(forecast: &WeatherForecast, threshold: f64) -> (f64, Option<DateTime<Utc>>) {
    let samples: Vec<(DateTime<Utc>, f64)> = if forecast.hourly.is_empty() {
        forecast
            .daily
            .iter()
            .take(OUTLOOK_HOURS / 24)
            .map(|day| (day.date.and_time(NaiveTime::MIN).and_utc(), day.rain_sum))
            .collect()
    } else {
        forecast
            .hourly
            .iter()
            .take(OUTLOOK_HOURS)
            .map(|hour| (hour.timestamp, hour.rain))
            .collect()
    };

    let mut total = 0.0;
    let mut crossing = None;
    for (at, rain) in samples {
        total += rain;
        if crossing.is_none() && total > 0.0 && total >= threshold {
            crossing = Some(at);
        }
    }
    (total, crossing)
}
