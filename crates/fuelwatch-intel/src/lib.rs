//! Risk and scheduling analysis over fused forecasts
//!
//! Every function here is pure: given a forecast and site context it
//! returns events, assessments or windows without touching the network.

pub mod advisory;
pub mod extreme;
pub mod operations;
pub mod policy;
pub mod road_risk;

pub use advisory::{SiteAdvisory, SiteProfile};
pub use extreme::{
    detect_events, detect_events_with_region, EventImpact, EventType, ExtremeWeatherEvent,
    RiskLevel, Severity,
};
pub use operations::{
    predict_harvest, predict_operations, predict_seeding, predict_spraying, FuelImpact, Operation,
    OperationWindow, WindowStatus,
};
pub use policy::{IndustryThresholds, IndustryType, RegionConfig};
pub use road_risk::{
    assess_risk, closure_probability, AccessRoadType, RoadProfile, RoadRiskAssessment,
    RoadRiskLevel,
};
