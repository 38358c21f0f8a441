use fuelwatch_weather::WeatherForecast;
use serde::{Deserialize, Serialize};

use crate::extreme::{detect_events, ExtremeWeatherEvent};
use crate::operations::{predict_operations, OperationWindow};
use crate::policy::IndustryType;
use crate::road_risk::{assess_risk, RoadProfile, RoadRiskAssessment};

/// What the engine needs to know about a customer site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteProfile {
    pub industry: IndustryType,
    pub road: RoadProfile,
    pub tank_level_l: f64,
    pub daily_consumption_l: f64,
}

/// Everything the dashboard shows for one site and forecast
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteAdvisory {
    pub events: Vec<ExtremeWeatherEvent>,
    pub road_risk: RoadRiskAssessment,
    /// Agricultural windows; always empty for mining sites
    pub operations: Vec<OperationWindow>,
}

impl SiteAdvisory {
    pub fn build(forecast: &WeatherForecast, site: &SiteProfile) -> Self {
        let events = detect_events(forecast, site.industry, Some(&forecast.coordinate));
        let road_risk = assess_risk(
            forecast,
            &site.road,
            site.tank_level_l,
            site.daily_consumption_l,
        );
        let operations = match site.industry {
            IndustryType::General => predict_operations(forecast),
            IndustryType::Mining => Vec::new(),
        };

        tracing::info!(
            "Advisory for ({:.3}, {:.3}): {} events, road risk {:?}, {} operation windows",
            forecast.coordinate.latitude,
            forecast.coordinate.longitude,
            events.len(),
            road_risk.risk_level,
            operations.len()
        );

        Self {
            events,
            road_risk,
            operations,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use crate::extreme::{EventType, Severity};
    use crate::road_risk::{AccessRoadType, RoadRiskLevel};
    use chrono::{Datelike, Duration, NaiveDate};
    use fuelwatch_weather::{DailyPoint, ForecastSource, GeoCoordinate};

    fn pilbara_wet_season() -> WeatherForecast {
        let start = NaiveDate::from_ymd_opt(2025, 1, 20).unwrap();
        let days = [
            (38.0, 20.0, 0.0),
            (37.0, 30.0, 5.0),
            (36.0, 45.0, 60.0),
            (31.0, 95.0, 50.0),
            (33.0, 40.0, 8.0),
        ];
        WeatherForecast {
            coordinate: GeoCoordinate::new(-20.31, 118.6),
            timezone: "Australia/Perth".into(),
            source: ForecastSource::Hybrid,
            daily: days
                .iter()
                .enumerate()
                .map(|(i, &(temp_max, wind, rain))| DailyPoint {
                    date: start + Duration::days(i as i64),
                    temp_max,
                    temp_min: 26.0,
                    precipitation_sum: rain,
                    rain_sum: rain,
                    wind_speed_max: wind,
                    wind_direction_dominant: 300.0,
                })
                .collect(),
            hourly: Vec::new(),
            soil_moisture: Vec::new(),
        }
    }

    fn site(industry: IndustryType) -> SiteProfile {
        SiteProfile {
            industry,
            road: RoadProfile::for_road_type(AccessRoadType::Unsealed),
            tank_level_l: 4000.0,
            daily_consumption_l: 1000.0,
        }
    }

    #[test]
    fn test_mining_site_advisory() {
        let advisory = SiteAdvisory::build(&pilbara_wet_season(), &site(IndustryType::Mining));

        let cyclone = advisory
            .events
            .iter()
            .find(|e| e.event_type == EventType::Cyclone)
            .unwrap();
        assert_eq!(cyclone.severity, Severity::Alert);
        // Daily fallback: 0 + 5mm in the first 48h, well under 25mm
        assert_eq!(advisory.road_risk.risk_level, RoadRiskLevel::Low);
        assert_eq!(advisory.road_risk.days_of_supply, Some(4.0));
        assert!(advisory.operations.is_empty());
    }

    #[test]
    fn test_general_site_gets_operations() {
        let mut forecast = pilbara_wet_season();
        for day in &mut forecast.daily {
            day.date = day.date.with_month(4).unwrap();
        }
        let advisory = SiteAdvisory::build(&forecast, &site(IndustryType::General));

        // 60mm on day 2 is the seeding break
        let seeding = advisory.operations.first().unwrap();
        assert_eq!(seeding.start_date, forecast.daily[2].date + Duration::days(3));
        assert!(advisory.events.iter().all(|e| e.event_type != EventType::Cyclone));
    }

    #[test]
    fn test_advisory_serializes() {
        let advisory = SiteAdvisory::build(&pilbara_wet_season(), &site(IndustryType::Mining));
        let json = serde_json::to_value(&advisory).unwrap();
        assert!(json["events"].is_array());
        assert_eq!(json["road_risk"]["risk_level"], "low");
    }
}
