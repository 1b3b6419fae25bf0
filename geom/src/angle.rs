use std::f64;
use std::fmt;

/// An angle in radians. Following mathematical convention, 0 points along positive x (east) and
/// angles increase counter-clockwise.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Angle(f64);

impl Angle {
    pub fn new(rads: f64) -> Angle {
        Angle(rads)
    }

    /// Result in [0, 2pi).
    pub fn normalized_radians(&self) -> f64 {
        self.0.rem_euclid(2.0 * f64::consts::PI)
    }

    pub fn normalized_degrees(&self) -> f64 {
        self.normalized_radians().to_degrees()
    }

    /// How far is it from `self` to `other`, turning clockwise? Result in (0, 2pi].
    pub fn clockwise_distance_to(&self, other: Angle) -> f64 {
        let delta = (self.normalized_radians() - other.normalized_radians())
            .rem_euclid(2.0 * f64::consts::PI);
        if delta == 0.0 {
            2.0 * f64::consts::PI
        } else {
            delta
        }
    }
}

impl fmt::Display for Angle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Angle({} degrees)", self.normalized_degrees())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clockwise_distance() {
        let east = Angle::new(0.0);
        let north = Angle::new(f64::consts::FRAC_PI_2);
        let south = Angle::new(-f64::consts::FRAC_PI_2);
        // Turning clockwise from east, south comes before north.
        assert!(east.clockwise_distance_to(south) < east.clockwise_distance_to(north));
        // A full turn, never zero, so an edge doubling back sorts last.
        assert_eq!(
            east.clockwise_distance_to(Angle::new(0.0)),
            2.0 * f64::consts::PI
        );
    }
}
