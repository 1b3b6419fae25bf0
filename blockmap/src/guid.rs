//! Content-addressed identifiers. Two independent builds of the same geometry must emit
//! bit-identical ids, so everything hashes quantized integer coordinates, never floats. The ids
//! are the join keys when serialized tiles get stitched back together.

use std::fmt;

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

use geom::QuantizedPt;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Guid(pub [u8; 16]);

impl Guid {
    /// The section terminator in the binary tile format. Never a real identifier.
    pub const EMPTY: Guid = Guid([0; 16]);

    pub fn is_empty(self) -> bool {
        self == Guid::EMPTY
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Guid({})", self)
    }
}

fn hash_pts(domain: u8, pts: &[QuantizedPt]) -> Guid {
    let mut context = md5::Context::new();
    context.consume([domain]);
    let mut buf = [0u8; 12];
    for pt in pts {
        LittleEndian::write_u64(&mut buf[0..8], pt.tile.encode());
        LittleEndian::write_u16(&mut buf[8..10], pt.x);
        LittleEndian::write_u16(&mut buf[10..12], pt.y);
        context.consume(buf);
    }
    Guid(context.compute().0)
}

pub fn vertex_guid(pt: QuantizedPt) -> Guid {
    hash_pts(b'V', &[pt])
}

/// Over the full coincidence-shape sequence `[v1, shape..., v2]` in canonical forward
/// orientation, so an edge discovered from either endpoint agrees.
pub fn edge_guid(pts: &[QuantizedPt]) -> Guid {
    hash_pts(b'E', pts)
}

/// Over the open boundary ring (no repeated closing point), in the graph's fixed winding order,
/// rotated to start at the lexicographically top-left point: smallest longitude, ties broken by
/// largest latitude. Rotation-invariant for a given ring, deliberately not reflection-invariant.
pub fn face_guid(ring: &[QuantizedPt]) -> Guid {
    assert!(!ring.is_empty());
    let start = top_left_index(ring);
    let mut rotated = Vec::with_capacity(ring.len());
    rotated.extend_from_slice(&ring[start..]);
    rotated.extend_from_slice(&ring[..start]);
    hash_pts(b'F', &rotated)
}

fn top_left_index(ring: &[QuantizedPt]) -> usize {
    // Tile y grows southward but the local y axis grows northward; flip the local axis so the
    // combined key grows southward and min key means max latitude.
    let key = |pt: &QuantizedPt| {
        (
            u64::from(pt.tile.x) * u64::from(geom::TILE_RESOLUTION) + u64::from(pt.x),
            u64::from(pt.tile.y) * u64::from(geom::TILE_RESOLUTION)
                + u64::from(geom::TILE_RESOLUTION - 1 - u32::from(pt.y)),
        )
    };
    let mut best = 0;
    for i in 1..ring.len() {
        if key(&ring[i]) < key(&ring[best]) {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use geom::{LonLat, TileId};

    fn q(lon: f64, lat: f64) -> QuantizedPt {
        QuantizedPt::from_lonlat(LonLat::new(lon, lat), 14)
    }

    #[test]
    fn determinism() {
        let a = q(13.41, 52.51);
        assert_eq!(vertex_guid(a), vertex_guid(q(13.41, 52.51)));
        assert_ne!(vertex_guid(a), vertex_guid(q(13.42, 52.51)));
        // Domains don't collide
        assert_ne!(vertex_guid(a), edge_guid(&[a]));
    }

    #[test]
    fn face_guid_rotation_invariant() {
        let ring = vec![
            q(13.410, 52.510),
            q(13.412, 52.510),
            q(13.412, 52.512),
            q(13.410, 52.512),
        ];
        let mut rotated = ring.clone();
        rotated.rotate_left(2);
        assert_eq!(face_guid(&ring), face_guid(&rotated));

        // But reversing the winding gives a different identity
        let mut reversed = ring.clone();
        reversed.reverse();
        assert_ne!(face_guid(&ring), face_guid(&reversed));
    }
}
