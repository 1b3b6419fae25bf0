//! Geometry and tile math for the barrier graph. Everything here is pure -- no IO, no state
//! beyond the values themselves. World coordinates are always (longitude, latitude) doubles;
//! anything that feeds a content identifier goes through `QuantizedPt` first, so that two
//! independent computations of the same geometry agree bit-for-bit.

#[macro_use]
extern crate anyhow;

mod angle;
mod bounds;
mod gps;
mod line;
mod ring;
mod tile;

pub use crate::angle::Angle;
pub use crate::bounds::GPSBounds;
pub use crate::gps::{HashablePt2D, LonLat};
pub use crate::line::Line;
pub use crate::ring::Ring;
pub use crate::tile::{QuantizedPt, TileId, TILE_RESOLUTION};

/// Two points closer than this (in degrees) are considered the same place.
pub const EPSILON_DEGREES: f64 = 1e-9;
