use serde::{Deserialize, Serialize};

use crate::LonLat;

/// A rectangle in world space.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GPSBounds {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl GPSBounds {
    pub fn new() -> GPSBounds {
        GPSBounds {
            min_lon: f64::MAX,
            min_lat: f64::MAX,
            max_lon: f64::MIN,
            max_lat: f64::MIN,
        }
    }

    pub fn from_corners(min: LonLat, max: LonLat) -> GPSBounds {
        GPSBounds {
            min_lon: min.longitude,
            min_lat: min.latitude,
            max_lon: max.longitude,
            max_lat: max.latitude,
        }
    }

    /// True until the first update
    pub fn is_empty(&self) -> bool {
        self.min_lon > self.max_lon
    }

    pub fn update(&mut self, pt: LonLat) {
        self.min_lon = self.min_lon.min(pt.longitude);
        self.max_lon = self.max_lon.max(pt.longitude);
        self.min_lat = self.min_lat.min(pt.latitude);
        self.max_lat = self.max_lat.max(pt.latitude);
    }

    pub fn contains(&self, pt: LonLat) -> bool {
        pt.longitude >= self.min_lon
            && pt.longitude <= self.max_lon
            && pt.latitude >= self.min_lat
            && pt.latitude <= self.max_lat
    }
}

impl Default for GPSBounds {
    fn default() -> Self {
        GPSBounds::new()
    }
}
