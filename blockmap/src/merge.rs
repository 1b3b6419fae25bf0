//! Fuses adjacent urban polygons into larger ones, guided by a pluggable cost heuristic. The
//! merger works entirely on the read-side graph; the underlying faces and edges stay untouched,
//! only the polygon layer on top changes.

use std::collections::BTreeMap;

use anyhow::Result;

use geom::Ring;

use crate::classify::BarrierClassifier;
use crate::graph::EdgeID;
use crate::osm::is_tile_edge;
use crate::polygon_graph::PolygonGraph;

/// Only meaningful within one merge session; never content-addressed, never persisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PolygonID(pub usize);

impl std::fmt::Display for PolygonID {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "Polygon #{}", self.0)
    }
}

pub struct UrbanPolygon {
    pub id: PolygonID,
    /// Boundary edges, unordered. Each appears once.
    pub edges: Vec<EdgeID>,
    /// Accumulated over merges, so it counts swallowed inner geometry too.
    pub area: f64,
    pub ring: Ring,
    /// Classification label -> accumulated weight, merged additively.
    pub classes: BTreeMap<String, f64>,
    /// Polygons closed off by the synthetic tile frame rather than real barriers. They never
    /// merge and never count toward a target polygon count.
    pub touches_tile_edge: bool,
}

impl UrbanPolygon {
    pub fn dominant_class(&self) -> Option<&str> {
        self.classes
            .iter()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(label, _)| label.as_str())
    }
}

/// Scores a merge candidate; higher means merge sooner. The edge is the shared boundary between
/// the two polygons.
pub trait MergeCost {
    fn score(
        &self,
        graph: &PolygonGraph,
        shared_edge: EdgeID,
        a: &UrbanPolygon,
        b: &UrbanPolygon,
    ) -> f64;
}

/// Prefers fusing small, similarly-sized neighbors across a long shared boundary, and neighbors
/// whose dominant barrier class agrees.
pub struct DefaultCost;

impl MergeCost for DefaultCost {
    fn score(
        &self,
        graph: &PolygonGraph,
        shared_edge: EdgeID,
        a: &UrbanPolygon,
        b: &UrbanPolygon,
    ) -> f64 {
        let shared = graph.edge_length_meters(shared_edge);
        let perimeter = a
            .ring
            .perimeter_meters()
            .min(b.ring.perimeter_meters())
            .max(1.0);
        let boundary_gain = shared / perimeter;

        let bigger = a.area.max(b.area);
        let similarity = if bigger > 0.0 {
            a.area.min(b.area) / bigger
        } else {
            1.0
        };

        let class_bonus = match (a.dominant_class(), b.dominant_class()) {
            (Some(x), Some(y)) if x == y => 1.0,
            _ => 0.0,
        };

        boundary_gain + similarity + class_bonus
    }
}

/// One run of the merger. Owns the polygon arena and the edge ownership index; identifiers are
/// allocated from a counter scoped to this session.
pub struct MergeSession<'a> {
    graph: &'a PolygonGraph,
    next_id: usize,
    polygons: BTreeMap<PolygonID, UrbanPolygon>,
    owners: BTreeMap<EdgeID, Vec<PolygonID>>,
}

impl<'a> MergeSession<'a> {
    /// Seeds one polygon per stored face. Fails if any edge already has more than two owners;
    /// that means the face data upstream is corrupt.
    pub fn new(graph: &'a PolygonGraph, classifier: &BarrierClassifier) -> Result<MergeSession<'a>> {
        let mut session = MergeSession {
            graph,
            next_id: 0,
            polygons: BTreeMap::new(),
            owners: BTreeMap::new(),
        };
        for face in graph.faces() {
            let ring = match graph.face_ring(face) {
                Ok(ring) => ring,
                Err(err) => {
                    warn!("Skipping degenerate {}: {}", face, err);
                    continue;
                }
            };
            let mut edges: Vec<EdgeID> = graph
                .graph
                .face(face)
                .data
                .boundary
                .iter()
                .map(|(e, _)| *e)
                .collect();
            edges.sort();
            edges.dedup();

            let mut classes: BTreeMap<String, f64> = BTreeMap::new();
            let mut touches_tile_edge = false;
            for e in &edges {
                let tags = &graph.graph.edge(*e).data.tags;
                if is_tile_edge(tags) {
                    touches_tile_edge = true;
                }
                if let (Some(label), Some(weight)) =
                    (classifier.classify(tags), classifier.weight(tags))
                {
                    *classes.entry(label.to_string()).or_insert(0.0) += weight;
                }
            }

            let area = ring.area();
            let id = session.allocate(UrbanPolygon {
                id: PolygonID(0),
                edges,
                area,
                ring,
                classes,
                touches_tile_edge,
            });
            for e in session.polygons[&id].edges.clone() {
                session.claim(e, id)?;
            }
        }
        Ok(session)
    }

    fn allocate(&mut self, mut polygon: UrbanPolygon) -> PolygonID {
        let id = PolygonID(self.next_id);
        self.next_id += 1;
        polygon.id = id;
        self.polygons.insert(id, polygon);
        id
    }

    fn claim(&mut self, edge: EdgeID, id: PolygonID) -> Result<()> {
        let owners = self.owners.entry(edge).or_default();
        owners.push(id);
        if owners.len() > 2 {
            bail!("{} is owned by {} polygons", edge, owners.len());
        }
        Ok(())
    }

    /// How many polygons count toward a target. Tile-frame polygons are permanent fixtures.
    pub fn countable(&self) -> usize {
        self.polygons
            .values()
            .filter(|p| !p.touches_tile_edge)
            .count()
    }

    /// Fuses pairs until only `target_count` countable polygons remain or no candidate is left.
    /// Consumes the session and returns the surviving polygons.
    pub fn merge(mut self, target_count: usize, cost: &dyn MergeCost) -> Result<Vec<UrbanPolygon>> {
        // Sorted ascending by score; the best candidate pops off the end.
        let mut candidates: Vec<(f64, EdgeID, [PolygonID; 2])> = Vec::new();
        for (edge, owners) in &self.owners {
            if let Some(pair) = self.mergeable_pair(owners) {
                let score = cost.score(
                    self.graph,
                    *edge,
                    &self.polygons[&pair[0]],
                    &self.polygons[&pair[1]],
                );
                candidates.push((score, *edge, pair));
            }
        }
        candidates.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

        while self.countable() > target_count {
            let (_, edge, pair) = match candidates.pop() {
                Some(c) => c,
                None => {
                    break;
                }
            };
            // Stale entries linger after their polygons merged away; the ownership index is the
            // source of truth.
            match self.owners.get(&edge) {
                Some(owners) if self.mergeable_pair(owners) == Some(pair) => {}
                _ => {
                    continue;
                }
            }

            let merged = self.fuse(pair[0], pair[1])?;

            // Re-score every surviving boundary edge of the new polygon
            for e in self.polygons[&merged].edges.clone() {
                if let Some(new_pair) = self.mergeable_pair(&self.owners[&e]) {
                    let score = cost.score(
                        self.graph,
                        e,
                        &self.polygons[&new_pair[0]],
                        &self.polygons[&new_pair[1]],
                    );
                    let idx = candidates
                        .binary_search_by(|probe| {
                            probe
                                .0
                                .partial_cmp(&score)
                                .unwrap_or(std::cmp::Ordering::Equal)
                        })
                        .unwrap_or_else(|idx| idx);
                    candidates.insert(idx, (score, e, new_pair));
                }
            }
        }

        info!(
            "Merge session done with {} polygons ({} countable)",
            self.polygons.len(),
            self.countable()
        );
        Ok(self.polygons.into_values().collect())
    }

    /// A pair eligible to fuse: exactly two distinct owners, neither pinned to the tile frame.
    fn mergeable_pair(&self, owners: &[PolygonID]) -> Option<[PolygonID; 2]> {
        if owners.len() != 2 || owners[0] == owners[1] {
            return None;
        }
        let mut pair = [owners[0], owners[1]];
        pair.sort();
        if self.polygons[&pair[0]].touches_tile_edge || self.polygons[&pair[1]].touches_tile_edge {
            return None;
        }
        Some(pair)
    }

    fn fuse(&mut self, a: PolygonID, b: PolygonID) -> Result<PolygonID> {
        let first = self.polygons.remove(&a).unwrap();
        let second = self.polygons.remove(&b).unwrap();

        // Edges in both are the shared boundary and vanish. Usually one, more if the polygons
        // touch along several edges.
        let mut kept: Vec<EdgeID> = Vec::new();
        let mut cancelled: Vec<EdgeID> = Vec::new();
        for e in first.edges.iter().chain(second.edges.iter()) {
            if first.edges.contains(e) && second.edges.contains(e) {
                if !cancelled.contains(e) {
                    cancelled.push(*e);
                }
            } else {
                kept.push(*e);
            }
        }

        let ring = self.graph.outer_ring(&kept)?;
        let mut classes = first.classes;
        for (label, weight) in second.classes {
            *classes.entry(label).or_insert(0.0) += weight;
        }

        let merged = self.allocate(UrbanPolygon {
            id: PolygonID(0),
            edges: kept.clone(),
            area: first.area + second.area,
            ring,
            classes,
            touches_tile_edge: first.touches_tile_edge || second.touches_tile_edge,
        });

        for e in cancelled {
            self.owners.remove(&e);
        }
        for e in kept {
            let owners = self.owners.get_mut(&e).unwrap();
            for owner in owners.iter_mut() {
                if *owner == a || *owner == b {
                    *owner = merged;
                }
            }
            if owners.len() > 2 {
                bail!("{} is owned by {} polygons after fusing", e, owners.len());
            }
        }
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guid::{edge_guid, face_guid, vertex_guid};
    use crate::osm::{Tags, TILE_EDGE_KEY, TILE_EDGE_VALUE};
    use crate::polygon_graph::{PolyEdgeData, PolyFaceData};
    use geom::{LonLat, QuantizedPt};

    fn q(lon: f64, lat: f64) -> QuantizedPt {
        QuantizedPt::from_lonlat(LonLat::new(lon, lat), 14)
    }

    fn add_edge(pg: &mut PolygonGraph, a: QuantizedPt, b: QuantizedPt, tags: Tags) -> EdgeID {
        let v1 = pg.ensure_vertex(vertex_guid(a), a);
        let v2 = pg.ensure_vertex(vertex_guid(b), b);
        pg.ensure_edge(
            edge_guid(&[a, b]),
            v1,
            v2,
            PolyEdgeData {
                shape: Vec::new(),
                tags,
            },
        )
    }

    fn add_face(pg: &mut PolygonGraph, corners: &[QuantizedPt], boundary: Vec<(EdgeID, bool)>) {
        pg.add_face(PolyFaceData {
            guid: face_guid(corners),
            boundary,
            landuse: Vec::new(),
        });
    }

    fn road() -> Tags {
        let mut tags = Tags::new();
        tags.insert("highway".to_string(), "residential".to_string());
        tags
    }

    /// Two unit squares side by side, sharing one vertical edge.
    fn two_squares(left_tags: Tags, shared_tags: Tags) -> (PolygonGraph, EdgeID) {
        let mut pg = PolygonGraph::new();
        let p = [
            q(13.410, 52.510),
            q(13.412, 52.510),
            q(13.414, 52.510),
            q(13.414, 52.512),
            q(13.412, 52.512),
            q(13.410, 52.512),
        ];
        let shared = add_edge(&mut pg, p[1], p[4], shared_tags);

        let w1 = add_edge(&mut pg, p[0], p[1], left_tags);
        let w2 = add_edge(&mut pg, p[4], p[5], road());
        let w3 = add_edge(&mut pg, p[5], p[0], road());
        add_face(
            &mut pg,
            &[p[0], p[1], p[4], p[5]],
            vec![(w1, true), (shared, true), (w2, true), (w3, true)],
        );

        let e1 = add_edge(&mut pg, p[1], p[2], road());
        let e2 = add_edge(&mut pg, p[2], p[3], road());
        let e3 = add_edge(&mut pg, p[3], p[4], road());
        add_face(
            &mut pg,
            &[p[1], p[2], p[3], p[4]],
            vec![(e1, true), (e2, true), (e3, true), (shared, false)],
        );

        (pg, shared)
    }

    #[test]
    fn two_squares_fuse_into_rectangle() {
        let (pg, shared) = two_squares(road(), road());
        let classifier = BarrierClassifier::default_barriers();
        let session = MergeSession::new(&pg, &classifier).unwrap();
        assert_eq!(2, session.countable());

        let result = session.merge(1, &DefaultCost).unwrap();
        assert_eq!(1, result.len());
        let merged = &result[0];
        assert!(!merged.edges.contains(&shared));
        assert_eq!(6, merged.edges.len());
        // All 6 outline points survive, plus the closing repeat
        assert_eq!(7, merged.ring.points().len());
        // Areas were summed, and the class weights added up
        assert!(merged.area > 0.0);
        assert_eq!(Some("highway"), merged.dominant_class());
    }

    #[test]
    fn target_reached_stops_merging() {
        let (pg, _) = two_squares(road(), road());
        let classifier = BarrierClassifier::default_barriers();
        let session = MergeSession::new(&pg, &classifier).unwrap();
        let result = session.merge(2, &DefaultCost).unwrap();
        assert_eq!(2, result.len());
    }

    #[test]
    fn frame_polygons_never_fuse() {
        let mut frame = Tags::new();
        frame.insert(TILE_EDGE_KEY.to_string(), TILE_EDGE_VALUE.to_string());
        // The left square's far edge is part of the tile frame
        let (pg, _) = two_squares(frame, road());
        let classifier = BarrierClassifier::default_barriers();
        let session = MergeSession::new(&pg, &classifier).unwrap();
        // Only the right square counts
        assert_eq!(1, session.countable());

        let result = session.merge(0, &DefaultCost).unwrap();
        // Nothing could fuse: the only shared edge borders a frame polygon
        assert_eq!(2, result.len());
    }

    #[test]
    fn triple_ownership_is_fatal() {
        let (mut pg, shared) = two_squares(road(), road());
        // A third face also claiming the shared edge
        let p1 = q(13.412, 52.510);
        let p4 = q(13.412, 52.512);
        let t = q(13.413, 52.511);
        let x1 = add_edge(&mut pg, p4, t, road());
        let x2 = add_edge(&mut pg, t, p1, road());
        add_face(
            &mut pg,
            &[p1, p4, t],
            vec![(shared, true), (x1, true), (x2, true)],
        );
        let classifier = BarrierClassifier::default_barriers();
        assert!(MergeSession::new(&pg, &classifier).is_err());
    }
}
