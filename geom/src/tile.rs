use std::f64::consts::PI;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{GPSBounds, LonLat};

/// Every tile-local coordinate axis is quantized into this many steps.
pub const TILE_RESOLUTION: u32 = 4096;

/// A slippy-map (Web Mercator) tile. The unit of lazy loading and of the serialized artifacts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TileId {
    pub x: u32,
    pub y: u32,
    pub z: u8,
}

impl TileId {
    pub fn new(x: u32, y: u32, z: u8) -> TileId {
        assert!(z <= 28, "zoom {} too deep to encode", z);
        assert!(x < (1 << z) && y < (1 << z), "tile ({}, {}) out of range for zoom {}", x, y, z);
        TileId { x, y, z }
    }

    /// The tile containing a point at some zoom. Points exactly on a tile's east or south border
    /// belong to the neighbor, so membership is unambiguous.
    pub fn containing(pt: LonLat, zoom: u8) -> TileId {
        let n = f64::from(1u32 << zoom);
        let x = ((pt.longitude + 180.0) / 360.0 * n).floor();
        let lat_rad = pt.latitude.to_radians();
        let y = ((1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * n).floor();
        TileId::new(
            (x.max(0.0) as u32).min((1 << zoom) - 1),
            (y.max(0.0) as u32).min((1 << zoom) - 1),
            zoom,
        )
    }

    /// A stable bijective encoding, used as the artifact filename and in every content
    /// identifier.
    pub fn encode(self) -> u64 {
        (u64::from(self.z) << 56) | (u64::from(self.x) << 28) | u64::from(self.y)
    }

    pub fn decode(id: u64) -> TileId {
        TileId::new(
            ((id >> 28) & 0xFFF_FFFF) as u32,
            (id & 0xFFF_FFFF) as u32,
            (id >> 56) as u8,
        )
    }

    pub fn bounds(self) -> GPSBounds {
        let n = f64::from(1u32 << self.z);
        let lon = |x: f64| x / n * 360.0 - 180.0;
        let lat = |y: f64| (PI * (1.0 - 2.0 * y / n)).sinh().atan().to_degrees();
        // y grows southward, so the tile's max latitude comes from its min y.
        GPSBounds::from_corners(
            LonLat::new(lon(f64::from(self.x)), lat(f64::from(self.y + 1))),
            LonLat::new(lon(f64::from(self.x + 1)), lat(f64::from(self.y))),
        )
    }

    pub fn parent(self) -> Option<TileId> {
        if self.z == 0 {
            return None;
        }
        Some(TileId::new(self.x / 2, self.y / 2, self.z - 1))
    }

    pub fn children(self) -> Vec<TileId> {
        let (x, y) = (self.x * 2, self.y * 2);
        vec![
            TileId::new(x, y, self.z + 1),
            TileId::new(x + 1, y, self.z + 1),
            TileId::new(x, y + 1, self.z + 1),
            TileId::new(x + 1, y + 1, self.z + 1),
        ]
    }

    /// All tiles at `zoom` covered by this tile. Just `self` when zoom matches.
    pub fn descendants(self, zoom: u8) -> Vec<TileId> {
        assert!(zoom >= self.z);
        let mut current = vec![self];
        for _ in self.z..zoom {
            current = current.into_iter().flat_map(|t| t.children()).collect();
        }
        current
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

/// A world coordinate snapped to the fixed grid of its containing tile. This is what all content
/// identifiers hash and what the binary tile format stores; the same place always quantizes the
/// same way, no matter which build computed it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QuantizedPt {
    pub tile: TileId,
    pub x: u16,
    pub y: u16,
}

impl QuantizedPt {
    pub fn from_lonlat(pt: LonLat, zoom: u8) -> QuantizedPt {
        let tile = TileId::containing(pt, zoom);
        let b = tile.bounds();
        let res = f64::from(TILE_RESOLUTION);
        let fx = (pt.longitude - b.min_lon) / (b.max_lon - b.min_lon) * res;
        let fy = (pt.latitude - b.min_lat) / (b.max_lat - b.min_lat) * res;
        QuantizedPt {
            tile,
            x: (fx.floor().max(0.0) as u32).min(TILE_RESOLUTION - 1) as u16,
            y: (fy.floor().max(0.0) as u32).min(TILE_RESOLUTION - 1) as u16,
        }
    }

    /// The center of the quantization cell. Re-quantizing the result is a fixpoint.
    pub fn to_lonlat(self) -> LonLat {
        let b = self.tile.bounds();
        let res = f64::from(TILE_RESOLUTION);
        LonLat::new(
            b.min_lon + (f64::from(self.x) + 0.5) / res * (b.max_lon - b.min_lon),
            b.min_lat + (f64::from(self.y) + 0.5) / res * (b.max_lat - b.min_lat),
        )
    }
}

impl fmt::Display for QuantizedPt {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}, {} in {})", self.x, self.y, self.tile)
    }
}
