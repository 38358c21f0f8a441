//! Base-32 interleaved-bit geohash used as cache key and primary-provider
//! location identifier.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{BoundingBox, GeoCoordinate, WeatherError};

const BASE32: &[u8; 32] = b"0123456789bcdefghjkmnpqrstuvwxyz";

/// Precision used for service-area keys
pub const DEFAULT_PRECISION: usize = 7;

/// Longest key we produce; beyond 12 characters f64 resolution runs out.
pub const MAX_PRECISION: usize = 12;

/// Fixed-precision geohash string.
///
/// Only constructed by [`encode`] or [`GeoKey::parse`], so every key decodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GeoKey(String);

impl GeoKey {
    /// Validate an externally supplied geohash (case-insensitive).
    pub fn parse(raw: &str) -> Result<Self, WeatherError> {
        let key = raw.trim().to_ascii_lowercase();
        if key.is_empty() || key.len() > MAX_PRECISION {
            return Err(WeatherError::InvalidGeoKey(raw.to_string()));
        }
        if !key.bytes().all(|b| BASE32.contains(&b)) {
            return Err(WeatherError::InvalidGeoKey(raw.to_string()));
        }
        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn precision(&self) -> usize {
        self.0.len()
    }

    /// The cell this key covers
    pub fn bounds(&self) -> BoundingBox {
        let mut lat = (-90.0_f64, 90.0_f64);
        let mut lon = (-180.0_f64, 180.0_f64);
        let mut even = true;

        for byte in self.0.bytes() {
            // parse() and encode() only admit alphabet characters
            let index = BASE32.iter().position(|&c| c == byte).unwrap_or(0);
            for shift in (0..5).rev() {
                let bit = (index >> shift) & 1 == 1;
                let range = if even { &mut lon } else { &mut lat };
                let mid = (range.0 + range.1) / 2.0;
                if bit {
                    range.0 = mid;
                } else {
                    range.1 = mid;
                }
                even = !even;
            }
        }

        BoundingBox::new(lat.0, lat.1, lon.0, lon.1)
    }
}

impl fmt::Display for GeoKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for GeoKey {
    type Error = WeatherError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<GeoKey> for String {
    fn from(key: GeoKey) -> Self {
        key.0
    }
}

/// Encode a coordinate at the given precision (clamped to 1..=12).
///
/// Ranges are not validated; out-of-range input yields a key for the
/// nearest edge cell.
pub fn encode(coordinate: &GeoCoordinate, precision: usize) -> GeoKey {
    let precision = precision.clamp(1, MAX_PRECISION);
    let mut lat = (-90.0_f64, 90.0_f64);
    let mut lon = (-180.0_f64, 180.0_f64);
    let mut even = true;
    let mut bit = 0;
    let mut index = 0usize;
    let mut key = String::with_capacity(precision);

    while key.len() < precision {
        let (range, value) = if even {
            (&mut lon, coordinate.longitude)
        } else {
            (&mut lat, coordinate.latitude)
        };
        let mid = (range.0 + range.1) / 2.0;
        if value >= mid {
            index = (index << 1) | 1;
            range.0 = mid;
        } else {
            index <<= 1;
            range.1 = mid;
        }
        even = !even;

        bit += 1;
        if bit == 5 {
            key.push(BASE32[index] as char);
            bit = 0;
            index = 0;
        }
    }

    GeoKey(key)
}

/// Midpoint of the key's cell
pub fn decode(key: &GeoKey) -> GeoCoordinate {
    let cell = key.bounds();
    GeoCoordinate::new(
        (cell.min_latitude + cell.max_latitude) / 2.0,
        (cell.min_longitude + cell.max_longitude) / 2.0,
    )
}
