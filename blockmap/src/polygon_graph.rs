//! The read-side graph, reconstructed from one or more serialized tiles. Everything is keyed by
//! content identifier: reading a second tile's artifact dedups the shared boundary geometry and
//! the result is one consistent graph, as if both tiles were built together.

use std::collections::{BTreeMap, HashMap};

use anyhow::Result;

use geom::{LonLat, QuantizedPt, Ring};

use crate::graph::{EdgeID, FaceID, Graph, VertexID};
use crate::guid::Guid;
use crate::osm::Tags;

#[derive(Clone, Debug)]
pub struct PolyEdgeData {
    pub shape: Vec<QuantizedPt>,
    pub tags: Tags,
}

#[derive(Clone, Debug)]
pub struct PolyFaceData {
    pub guid: Guid,
    /// Boundary edges in traversal order, with the direction each was traversed relative to the
    /// edge's stored orientation.
    pub boundary: Vec<(EdgeID, bool)>,
    /// (land-use label, percent of the face's area)
    pub landuse: Vec<(String, f64)>,
}

pub struct PolygonGraph {
    pub graph: Graph<QuantizedPt, PolyEdgeData, PolyFaceData>,
    vertex_by_guid: HashMap<Guid, VertexID>,
    edge_by_guid: HashMap<Guid, EdgeID>,
    face_by_guid: BTreeMap<Guid, FaceID>,
}

impl PolygonGraph {
    pub fn new() -> PolygonGraph {
        PolygonGraph {
            graph: Graph::new(),
            vertex_by_guid: HashMap::new(),
            edge_by_guid: HashMap::new(),
            face_by_guid: BTreeMap::new(),
        }
    }

    pub fn ensure_vertex(&mut self, guid: Guid, pt: QuantizedPt) -> VertexID {
        if let Some(v) = self.vertex_by_guid.get(&guid) {
            return *v;
        }
        let v = self.graph.add_vertex(pt);
        self.vertex_by_guid.insert(guid, v);
        v
    }

    pub fn vertex_for(&self, guid: Guid) -> Option<VertexID> {
        self.vertex_by_guid.get(&guid).cloned()
    }

    pub fn ensure_edge(&mut self, guid: Guid, v1: VertexID, v2: VertexID, data: PolyEdgeData) -> EdgeID {
        if let Some(e) = self.edge_by_guid.get(&guid) {
            return *e;
        }
        let e = self.graph.add_edge(v1, v2, data);
        self.edge_by_guid.insert(guid, e);
        e
    }

    pub fn edge_for(&self, guid: Guid) -> Option<EdgeID> {
        self.edge_by_guid.get(&guid).cloned()
    }

    pub fn has_face(&self, guid: Guid) -> bool {
        self.face_by_guid.contains_key(&guid)
    }

    pub fn add_face(&mut self, data: PolyFaceData) -> FaceID {
        let guid = data.guid;
        assert!(!self.has_face(guid), "face {} added twice", guid);
        let f = self.graph.new_face(data);
        self.face_by_guid.insert(guid, f);
        f
    }

    /// The full geometry of an edge in stored orientation, in world space.
    pub fn edge_polyline(&self, id: EdgeID) -> Vec<LonLat> {
        let edge = self.graph.edge(id);
        let mut pts = Vec::with_capacity(edge.data.shape.len() + 2);
        pts.push(self.graph.vertex(edge.v1).to_lonlat());
        pts.extend(edge.data.shape.iter().map(|q| q.to_lonlat()));
        pts.push(self.graph.vertex(edge.v2).to_lonlat());
        pts
    }

    pub fn edge_length_meters(&self, id: EdgeID) -> f64 {
        self.edge_polyline(id)
            .windows(2)
            .map(|pair| pair[0].gps_dist_meters(pair[1]))
            .sum()
    }

    /// Glues a face's boundary back into a ring.
    pub fn face_ring(&self, face: FaceID) -> Result<Ring> {
        let mut pts: Vec<LonLat> = Vec::new();
        for (edge, forward) in &self.graph.face(face).data.boundary {
            let mut piece = self.edge_polyline(*edge);
            if !forward {
                piece.reverse();
            }
            piece.pop();
            pts.extend(piece);
        }
        if pts.is_empty() {
            bail!("{} has an empty boundary", face);
        }
        pts.push(pts[0]);
        pts.dedup_by(|a, b| a.approx_eq(*b));
        Ring::new(pts)
    }

    /// Every stored face as (ring geometry, content identifier), in identifier order, skipping
    /// degenerate boundaries. Iterating `face_by_guid` also dedups across merged tiles by
    /// construction.
    pub fn polygons(&self) -> Vec<(Ring, Guid)> {
        let mut result = Vec::new();
        for (guid, face) in &self.face_by_guid {
            if let Ok(ring) = self.face_ring(*face) {
                result.push((ring, *guid));
            }
        }
        result
    }

    pub fn faces(&self) -> impl Iterator<Item = FaceID> + '_ {
        self.face_by_guid.values().cloned()
    }

    /// Chains a set of edges into a closed ring by matching endpoints. When the walk closes
    /// before using every edge, the leftovers are a nested inner loop and get discarded; when
    /// several closed loops form, the largest is the outer ring. Fails if no loop closes at all.
    pub fn outer_ring(&self, edges: &[EdgeID]) -> Result<Ring> {
        let mut unused: Vec<EdgeID> = edges.to_vec();
        let mut best: Option<Ring> = None;
        while !unused.is_empty() {
            match self.chain_one_loop(&mut unused) {
                Some(ring) => {
                    if best.as_ref().map(|b| ring.area() > b.area()).unwrap_or(true) {
                        best = Some(ring);
                    }
                }
                None => {
                    break;
                }
            }
        }
        best.ok_or_else(|| anyhow!("No closed ring in {} edges", edges.len()))
    }

    fn chain_one_loop(&self, unused: &mut Vec<EdgeID>) -> Option<Ring> {
        let first = unused.remove(0);
        let (start, mut current) = {
            let e = self.graph.edge(first);
            (e.v1, e.v2)
        };
        let mut hops = vec![(first, true)];
        while current != start {
            let idx = unused.iter().position(|id| {
                let e = self.graph.edge(*id);
                e.v1 == current || e.v2 == current
            })?;
            let id = unused.remove(idx);
            let forward = self.graph.edge(id).v1 == current;
            current = self.graph.other_endpoint(id, current);
            hops.push((id, forward));
        }

        let mut pts: Vec<LonLat> = Vec::new();
        for (edge, forward) in hops {
            let mut piece = self.edge_polyline(edge);
            if !forward {
                piece.reverse();
            }
            piece.pop();
            pts.extend(piece);
        }
        pts.push(pts[0]);
        pts.dedup_by(|a, b| a.approx_eq(*b));
        Ring::new(pts).ok()
    }
}

impl Default for PolygonGraph {
    fn default() -> Self {
        PolygonGraph::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guid::{edge_guid, vertex_guid};
    use geom::{LonLat, QuantizedPt};

    fn q(lon: f64, lat: f64) -> QuantizedPt {
        QuantizedPt::from_lonlat(LonLat::new(lon, lat), 14)
    }

    fn add_edge(pg: &mut PolygonGraph, a: QuantizedPt, b: QuantizedPt) -> EdgeID {
        let v1 = pg.ensure_vertex(vertex_guid(a), a);
        let v2 = pg.ensure_vertex(vertex_guid(b), b);
        pg.ensure_edge(
            edge_guid(&[a, b]),
            v1,
            v2,
            PolyEdgeData {
                shape: Vec::new(),
                tags: Tags::new(),
            },
        )
    }

    #[test]
    fn dedup_by_guid() {
        let mut pg = PolygonGraph::new();
        let a = q(13.410, 52.510);
        let b = q(13.412, 52.510);
        let e1 = add_edge(&mut pg, a, b);
        let e2 = add_edge(&mut pg, a, b);
        assert_eq!(e1, e2);
        assert_eq!(2, pg.graph.num_vertices());
    }

    #[test]
    fn outer_ring_discards_inner_loop() {
        let mut pg = PolygonGraph::new();
        // Outer square
        let corners = [
            q(13.410, 52.510),
            q(13.414, 52.510),
            q(13.414, 52.514),
            q(13.410, 52.514),
        ];
        let mut edges = Vec::new();
        for i in 0..4 {
            edges.push(add_edge(&mut pg, corners[i], corners[(i + 1) % 4]));
        }
        // A small disconnected triangle inside
        let inner = [
            q(13.411, 52.511),
            q(13.412, 52.511),
            q(13.4115, 52.5115),
        ];
        for i in 0..3 {
            edges.push(add_edge(&mut pg, inner[i], inner[(i + 1) % 3]));
        }

        let ring = pg.outer_ring(&edges).unwrap();
        assert_eq!(5, ring.points().len());
        // The outer square's area, not the triangle's
        assert!(ring.area() > 1e-5);
    }
}
