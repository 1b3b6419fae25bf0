use std::fmt;

use crate::{LonLat, EPSILON_DEGREES};

/// A line segment between two world-space points.
#[derive(Clone, Copy, Debug)]
pub struct Line(LonLat, LonLat);

impl Line {
    pub fn new(pt1: LonLat, pt2: LonLat) -> Line {
        Line(pt1, pt2)
    }

    pub fn pt1(&self) -> LonLat {
        self.0
    }

    pub fn pt2(&self) -> LonLat {
        self.1
    }

    /// The single point where the two segments properly cross, if any. Endpoint-coincident
    /// contact, tangential touches, and collinear overlap all yield None; flattening must only
    /// split at transversal crossings.
    pub fn intersection(&self, other: &Line) -> Option<LonLat> {
        if !self.crosses(other) {
            return None;
        }
        let pt = infinite_line_intersection(self, other)?;
        // The strict ccw test already rejected endpoint contact, but the determinant solve can
        // still land within epsilon of an endpoint for nearly-degenerate input.
        for endpt in [self.0, self.1, other.0, other.1] {
            if pt.approx_eq(endpt) {
                return None;
            }
        }
        Some(pt)
    }

    /// True if the segments properly cross. From
    /// http://bryceboe.com/2006/10/23/line-segment-intersection-algorithm/ -- the strict
    /// inequalities mean shared endpoints and collinear overlap don't count.
    pub fn crosses(&self, other: &Line) -> bool {
        is_counter_clockwise(self.0, other.0, other.1) != is_counter_clockwise(self.1, other.0, other.1)
            && is_counter_clockwise(self.0, self.1, other.0)
                != is_counter_clockwise(self.0, self.1, other.1)
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Line({} to {})", self.0, self.1)
    }
}

fn is_counter_clockwise(pt1: LonLat, pt2: LonLat, pt3: LonLat) -> bool {
    (pt3.latitude - pt1.latitude) * (pt2.longitude - pt1.longitude)
        > (pt2.latitude - pt1.latitude) * (pt3.longitude - pt1.longitude)
}

fn infinite_line_intersection(l1: &Line, l2: &Line) -> Option<LonLat> {
    let (x1, y1) = (l1.0.longitude, l1.0.latitude);
    let (x2, y2) = (l1.1.longitude, l1.1.latitude);
    let (x3, y3) = (l2.0.longitude, l2.0.latitude);
    let (x4, y4) = (l2.1.longitude, l2.1.latitude);

    let denom = (x1 - x2) * (y3 - y4) - (y1 - y2) * (x3 - x4);
    if denom.abs() < EPSILON_DEGREES * EPSILON_DEGREES {
        return None;
    }
    let num_x = (x1 * y2 - y1 * x2) * (x3 - x4) - (x1 - x2) * (x3 * y4 - y3 * x4);
    let num_y = (x1 * y2 - y1 * x2) * (y3 - y4) - (y1 - y2) * (x3 * y4 - y3 * x4);
    Some(LonLat::new(num_x / denom, num_y / denom))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proper_crossing() {
        let l1 = Line::new(LonLat::new(0.0, 0.0), LonLat::new(2.0, 2.0));
        let l2 = Line::new(LonLat::new(0.0, 2.0), LonLat::new(2.0, 0.0));
        let pt = l1.intersection(&l2).unwrap();
        assert!(pt.approx_eq(LonLat::new(1.0, 1.0)));
    }

    #[test]
    fn shared_endpoint_is_not_a_crossing() {
        let l1 = Line::new(LonLat::new(0.0, 0.0), LonLat::new(1.0, 1.0));
        let l2 = Line::new(LonLat::new(1.0, 1.0), LonLat::new(2.0, 0.0));
        assert!(l1.intersection(&l2).is_none());
    }

    #[test]
    fn collinear_overlap_is_not_a_crossing() {
        let l1 = Line::new(LonLat::new(0.0, 0.0), LonLat::new(2.0, 0.0));
        let l2 = Line::new(LonLat::new(1.0, 0.0), LonLat::new(3.0, 0.0));
        assert!(l1.intersection(&l2).is_none());
    }

    #[test]
    fn touch_without_crossing() {
        // l2 ends exactly on l1's interior; tangential, not transversal.
        let l1 = Line::new(LonLat::new(0.0, 0.0), LonLat::new(2.0, 0.0));
        let l2 = Line::new(LonLat::new(1.0, 0.0), LonLat::new(1.0, 1.0));
        assert!(l1.intersection(&l2).is_none());
    }
}
