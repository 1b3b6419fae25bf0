use std::collections::HashSet;
use std::fmt;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::LonLat;

/// Like a polyline, but closed. The first and last point are equal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ring {
    // first equals last
    pts: Vec<LonLat>,
}

impl Ring {
    pub fn new(pts: Vec<LonLat>) -> Result<Ring> {
        if pts.len() < 4 {
            bail!("Can't make a ring with < 3 distinct points: {:?}", pts);
        }
        if !pts[0].approx_eq(*pts.last().unwrap()) {
            bail!("Can't make a ring with mismatched endpoints: {:?}", pts);
        }
        if pts
            .windows(2)
            .any(|pair| pair[0].approx_eq(pair[1]))
        {
            bail!("Ring has duplicate adjacent points: {:?}", pts);
        }

        let result = Ring { pts };

        let mut seen_pts = HashSet::new();
        for pt in result.pts.iter().skip(1) {
            seen_pts.insert(pt.to_hashable());
        }
        if seen_pts.len() != result.pts.len() - 1 {
            bail!("Ring has repeat points: {}", result);
        }

        Ok(result)
    }

    pub fn points(&self) -> &Vec<LonLat> {
        &self.pts
    }

    pub fn into_points(self) -> Vec<LonLat> {
        self.pts
    }

    /// Absolute area via the shoelace formula, in square degrees. Only meaningful relative to
    /// other rings in the same region.
    pub fn area(&self) -> f64 {
        self.signed_area().abs()
    }

    /// Positive when the ring winds counter-clockwise in (lon, lat) space.
    fn signed_area(&self) -> f64 {
        let mut sum = 0.0;
        for pair in self.pts.windows(2) {
            sum += pair[0].longitude * pair[1].latitude - pair[1].longitude * pair[0].latitude;
        }
        sum / 2.0
    }

    pub fn is_clockwise(&self) -> bool {
        self.signed_area() < 0.0
    }

    /// Total boundary length in meters.
    pub fn perimeter_meters(&self) -> f64 {
        self.pts
            .windows(2)
            .map(|pair| pair[0].gps_dist_meters(pair[1]))
            .sum()
    }

    pub fn to_geo(&self) -> geo::Polygon<f64> {
        let exterior: geo::LineString<f64> =
            self.pts.iter().map(|pt| geo::Coordinate::from(*pt)).collect();
        geo::Polygon::new(exterior, Vec::new())
    }
}

impl fmt::Display for Ring {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Ring::new(vec![")?;
        for pt in &self.pts {
            writeln!(f, "  LonLat::new({}, {}),", pt.longitude, pt.latitude)?;
        }
        write!(f, "])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square(clockwise: bool) -> Vec<LonLat> {
        let mut pts = vec![
            LonLat::new(0.0, 0.0),
            LonLat::new(1.0, 0.0),
            LonLat::new(1.0, 1.0),
            LonLat::new(0.0, 1.0),
            LonLat::new(0.0, 0.0),
        ];
        if clockwise {
            pts.reverse();
        }
        pts
    }

    #[test]
    fn area_and_winding() {
        let ccw = Ring::new(unit_square(false)).unwrap();
        let cw = Ring::new(unit_square(true)).unwrap();
        assert!((ccw.area() - 1.0).abs() < 1e-12);
        assert!((cw.area() - 1.0).abs() < 1e-12);
        assert!(!ccw.is_clockwise());
        assert!(cw.is_clockwise());
    }

    #[test]
    fn degenerate_rings_rejected() {
        assert!(Ring::new(vec![
            LonLat::new(0.0, 0.0),
            LonLat::new(1.0, 0.0),
            LonLat::new(0.0, 0.0),
        ])
        .is_err());
        assert!(Ring::new(vec![
            LonLat::new(0.0, 0.0),
            LonLat::new(1.0, 0.0),
            LonLat::new(1.0, 1.0),
            LonLat::new(0.0, 1.0),
        ])
        .is_err());
    }
}
