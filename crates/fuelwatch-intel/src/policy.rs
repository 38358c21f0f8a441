//! Threshold and region policy tables.

use fuelwatch_weather::{BoundingBox, GeoCoordinate};
use serde::{Deserialize, Serialize};

/// Selects which threshold table applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IndustryType {
    Mining,
    #[default]
    General,
}

/// Per-industry detection thresholds (°C, km/h, mm)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IndustryThresholds {
    pub extreme_heat_c: f64,
    pub cyclone_wind_kmh: f64,
    pub storm_wind_kmh: f64,
    pub heavy_rain_24h_mm: f64,
    pub heavy_rain_48h_mm: f64,
}

const MINING_THRESHOLDS: IndustryThresholds = IndustryThresholds {
    extreme_heat_c: 45.0,
    cyclone_wind_kmh: 90.0,
    storm_wind_kmh: 60.0,
    heavy_rain_24h_mm: 50.0,
    heavy_rain_48h_mm: 100.0,
};

const GENERAL_THRESHOLDS: IndustryThresholds = IndustryThresholds {
    extreme_heat_c: 45.0,
    cyclone_wind_kmh: 90.0,
    storm_wind_kmh: 50.0,
    heavy_rain_24h_mm: 25.0,
    heavy_rain_48h_mm: 50.0,
};

impl IndustryType {
    pub fn thresholds(self) -> &'static IndustryThresholds {
        match self {
            Self::Mining => &MINING_THRESHOLDS,
            Self::General => &GENERAL_THRESHOLDS,
        }
    }
}

/// Wind at or above which a cyclone day is an alert on its own
pub const CYCLONE_ALERT_WIND_KMH: f64 = 120.0;

/// Storm days at or above this wind are warnings rather than watches
pub const STORM_WARNING_WIND_KMH: f64 = 70.0;

/// Rain needed alongside storm-force wind
pub const STORM_MIN_RAIN_MM: f64 = 10.0;

/// Consecutive heat days that escalate to an alert
pub const HEAT_ALERT_RUN_DAYS: usize = 3;

pub const DEFAULT_SEVERE_FLOOD_MM: f64 = 80.0;

/// Northern Australia band where cyclone detection applies
pub const CYCLONE_REGION: BoundingBox = BoundingBox::new(-26.0, -10.0, 112.0, 155.0);

pub fn in_cyclone_region(coordinate: &GeoCoordinate) -> bool {
    CYCLONE_REGION.contains(coordinate)
}

/// Rain-alert policy for a geography
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionConfig {
    pub region: String,
    /// Remote sites where rain-driven access disruption matters
    pub cares_about_rain: bool,
    pub severe_flood_threshold_mm: f64,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            region: "default".to_string(),
            cares_about_rain: false,
            severe_flood_threshold_mm: DEFAULT_SEVERE_FLOOD_MM,
        }
    }
}

struct RegionRule {
    id: &'static str,
    bounds: BoundingBox,
    cares_about_rain: bool,
    severe_flood_threshold_mm: f64,
}

// First match wins
const REGIONS: &[RegionRule] = &[
    RegionRule {
        id: "pilbara",
        bounds: BoundingBox::new(-24.5, -19.5, 115.0, 121.5),
        cares_about_rain: true,
        severe_flood_threshold_mm: 80.0,
    },
    RegionRule {
        id: "kimberley",
        bounds: BoundingBox::new(-19.5, -13.5, 121.5, 129.0),
        cares_about_rain: true,
        severe_flood_threshold_mm: 80.0,
    },
    RegionRule {
        id: "top_end",
        bounds: BoundingBox::new(-17.0, -10.5, 129.0, 138.0),
        cares_about_rain: true,
        severe_flood_threshold_mm: 80.0,
    },
    RegionRule {
        id: "gulf_country",
        bounds: BoundingBox::new(-22.0, -10.0, 138.0, 146.0),
        cares_about_rain: true,
        severe_flood_threshold_mm: 80.0,
    },
    RegionRule {
        id: "goldfields",
        bounds: BoundingBox::new(-33.0, -26.0, 119.0, 126.0),
        cares_about_rain: true,
        severe_flood_threshold_mm: 80.0,
    },
];

impl RegionConfig {
    pub fn new(
        region: impl Into<String>,
        cares_about_rain: bool,
        severe_flood_threshold_mm: f64,
    ) -> Self {
        Self {
            region: region.into(),
            cares_about_rain,
            severe_flood_threshold_mm,
        }
    }

    /// Region policy for a coordinate; the default policy when unknown.
    pub fn for_coordinate(coordinate: Option<&GeoCoordinate>) -> Self {
        coordinate
            .and_then(|c| REGIONS.iter().find(|rule| rule.bounds.contains(c)))
            .map(|rule| {
                Self::new(rule.id, rule.cares_about_rain, rule.severe_flood_threshold_mm)
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    #[test]
    fn test_tables_share_heat_and_cyclone() {
        let mining = IndustryType::Mining.thresholds();
        let general = IndustryType::General.thresholds();
        assert_eq!(mining.extreme_heat_c, general.extreme_heat_c);
        assert_eq!(mining.cyclone_wind_kmh, general.cyclone_wind_kmh);
        assert_ne!(mining.storm_wind_kmh, general.storm_wind_kmh);
        assert_ne!(mining.heavy_rain_24h_mm, general.heavy_rain_24h_mm);
    }

    #[test]
    fn test_region_lookup() {
        let pilbara = RegionConfig::for_coordinate(Some(&GeoCoordinate::new(-22.7, 118.0)));
        assert_eq!(pilbara.region, "pilbara");
        assert!(pilbara.cares_about_rain);

        let melbourne = RegionConfig::for_coordinate(Some(&GeoCoordinate::new(-37.81, 144.96)));
        assert_eq!(melbourne, RegionConfig::default());

        assert_eq!(RegionConfig::for_coordinate(None), RegionConfig::default());
    }

    #[test]
    fn test_cyclone_region() {
        assert!(in_cyclone_region(&GeoCoordinate::new(-20.31, 118.6))); // Port Hedland
        assert!(!in_cyclone_region(&GeoCoordinate::new(-31.95, 115.86))); // Perth
    }

    #[test]
    fn test_industry_serde() {
        let parsed: IndustryType = serde_json::from_str("\"mining\"").unwrap();
        assert_eq!(parsed, IndustryType::Mining);
        assert_eq!(IndustryType::default(), IndustryType::General);
    }
}
