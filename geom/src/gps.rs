use std::fmt;

use ordered_float::NotNan;
use serde::{Deserialize, Serialize};

use crate::{Angle, EPSILON_DEGREES};

/// A raw world-space coordinate. Longitude is x, latitude is y.
#[derive(Copy, Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct LonLat {
    pub longitude: f64,
    pub latitude: f64,
}

impl LonLat {
    pub fn new(lon: f64, lat: f64) -> LonLat {
        LonLat {
            longitude: lon,
            latitude: lat,
        }
    }

    /// Haversine distance in meters.
    pub fn gps_dist_meters(&self, other: LonLat) -> f64 {
        let earth_radius_m = 6_371_000.0;
        let lon1 = self.longitude.to_radians();
        let lon2 = other.longitude.to_radians();
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();

        let delta_lat = lat2 - lat1;
        let delta_lon = lon2 - lon1;

        let a = (delta_lat / 2.0).sin().powi(2)
            + (delta_lon / 2.0).sin().powi(2) * lat1.cos() * lat2.cos();
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
        earth_radius_m * c
    }

    pub fn angle_to(&self, to: LonLat) -> Angle {
        Angle::new((to.latitude - self.latitude).atan2(to.longitude - self.longitude))
    }

    pub fn approx_eq(&self, other: LonLat) -> bool {
        (self.longitude - other.longitude).abs() < EPSILON_DEGREES
            && (self.latitude - other.latitude).abs() < EPSILON_DEGREES
    }

    pub fn to_hashable(self) -> HashablePt2D {
        HashablePt2D::new(self.longitude, self.latitude)
    }
}

impl fmt::Display for LonLat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "LonLat({0}, {1})", self.longitude, self.latitude)
    }
}

impl From<LonLat> for geo::Coordinate<f64> {
    fn from(pt: LonLat) -> Self {
        geo::Coordinate {
            x: pt.longitude,
            y: pt.latitude,
        }
    }
}

/// A hashable and orderable point, so coordinates can key maps and sets.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct HashablePt2D {
    x_nan: NotNan<f64>,
    y_nan: NotNan<f64>,
}

impl HashablePt2D {
    pub fn new(x: f64, y: f64) -> HashablePt2D {
        HashablePt2D {
            x_nan: NotNan::new(x).unwrap(),
            y_nan: NotNan::new(y).unwrap(),
        }
    }

    pub fn x(&self) -> f64 {
        self.x_nan.into_inner()
    }

    pub fn y(&self) -> f64 {
        self.y_nan.into_inner()
    }

    pub fn to_lonlat(self) -> LonLat {
        LonLat::new(self.x(), self.y())
    }
}

impl From<LonLat> for HashablePt2D {
    fn from(pt: LonLat) -> Self {
        HashablePt2D::new(pt.longitude, pt.latitude)
    }
}
