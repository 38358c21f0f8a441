//! Weather acquisition for FuelWatch
//!
//! Fetches forecasts from a regional primary provider and a global secondary
//! provider, fuses them into one series, and caches results by geokey.

pub mod cache;
pub mod geokey;
pub mod http;
pub mod primary;
pub mod secondary;
pub mod service;
pub mod types;

pub use cache::{CacheStats, TtlCache};
pub use geokey::GeoKey;
pub use http::RetryConfig;
pub use service::{EngineSettings, ForecastService};
pub use types::*;
