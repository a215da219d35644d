use foundation::math::{Vec3, lat_lon_to_unit};
use serde::{Deserialize, Serialize};

/// A location in degrees. Field names follow the airport dataset
/// (`latitude` / `longitude`) so parsed records deserialize directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    #[serde(rename = "latitude")]
    pub lat: f64,
    #[serde(rename = "longitude")]
    pub lon: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Country code of the containing feature, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl Point {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat,
            lon,
            name: None,
            country: None,
        }
    }

    pub fn named(lat: f64, lon: f64, name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::new(lat, lon)
        }
    }

    /// Finite and within `|lat| <= 90`, `|lon| <= 180`.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && self.lat.abs() <= 90.0
            && self.lon.abs() <= 180.0
    }

    pub fn direction(&self) -> Vec3 {
        lat_lon_to_unit(self.lat, self.lon)
    }
}
