//! Raw input types, modeled after an OSM extract: points with ids, line features referencing
//! those points, and free-form tags on both.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use geom::LonLat;

pub type Tags = BTreeMap<String, String>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeID(pub i64);
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WayID(pub i64);

impl fmt::Display for NodeID {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "https://www.openstreetmap.org/node/{}", self.0)
    }
}
impl fmt::Display for WayID {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "https://www.openstreetmap.org/way/{}", self.0)
    }
}

/// One feature from a raw tile. Tile sources yield a flat batch of these; the barrier graph's
/// multi-pass ingestion sorts out what becomes a vertex, a shape point, or nothing.
#[derive(Clone, Debug)]
pub enum RawFeature {
    Point {
        id: NodeID,
        pt: LonLat,
    },
    Line {
        id: WayID,
        nodes: Vec<NodeID>,
        tags: Tags,
    },
}

/// The tag marking the synthetic frame injected along a tile's bounds during a build. Polygons
/// containing one of these edges touch the tile boundary and get special treatment downstream.
pub const TILE_EDGE_KEY: &str = "_tile_edge";
pub const TILE_EDGE_VALUE: &str = "yes";

pub fn is_tile_edge(tags: &Tags) -> bool {
    tags.get(TILE_EDGE_KEY).map(|x| x.as_str()) == Some(TILE_EDGE_VALUE)
}

/// Shorthand constructors shared by the unit tests of several modules.
#[cfg(test)]
pub mod tests_support {
    use super::*;

    pub fn point(id: i64, lon: f64, lat: f64) -> RawFeature {
        RawFeature::Point {
            id: NodeID(id),
            pt: LonLat::new(lon, lat),
        }
    }

    pub fn line(id: i64, nodes: &[i64], tags: Tags) -> RawFeature {
        RawFeature::Line {
            id: WayID(id),
            nodes: nodes.iter().map(|n| NodeID(*n)).collect(),
            tags,
        }
    }

    pub fn road_tags() -> Tags {
        let mut tags = Tags::new();
        tags.insert("highway".to_string(), "residential".to_string());
        tags
    }
}
