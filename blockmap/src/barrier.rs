//! The write-side graph: barrier ways for one or more tiles, planarized and ready for face
//! assignment. Wraps the generic arena with world coordinates, tile bookkeeping, and the
//! multi-pass OSM ingestion.

use std::collections::{BTreeSet, HashMap, HashSet};

use anyhow::Result;

use geom::{LonLat, QuantizedPt, TileId};

use crate::classify::BarrierClassifier;
use crate::flatten::flatten;
use crate::graph::{EdgeID, Graph, VertexID};
use crate::osm::{NodeID, RawFeature, Tags, WayID};
use crate::prune::{prune_dead_ends, prune_shape_points};

/// A raw tile source. Must behave as a pure function of the tile id; the pipeline retries and
/// dedups on that assumption.
pub trait TileFetcher {
    fn fetch_tile(&self, tile: TileId) -> Result<Vec<RawFeature>>;
}

#[derive(Clone, Debug, PartialEq)]
pub struct EdgeData {
    /// Intermediate geometry between the two endpoint vertices, ordered relative to the stored
    /// v1 -> v2 orientation. Never contains the endpoint coordinates themselves.
    pub shape: Vec<LonLat>,
    pub tags: Tags,
}

#[derive(Clone, Debug, Default)]
pub struct FaceData {
    /// (land-use label, percent of the face's area)
    pub landuse: Vec<(String, f64)>,
}

pub struct BarrierGraph {
    pub graph: Graph<LonLat, EdgeData, FaceData>,
    zoom: u8,

    // Ingestion state, persistent across tile loads so overlapping data unifies.
    node_coords: HashMap<NodeID, LonLat>,
    node_way_uses: HashMap<NodeID, usize>,
    vertex_candidates: HashSet<NodeID>,
    node_to_vertex: HashMap<NodeID, VertexID>,
    ways_seen: HashSet<WayID>,
    loaded_tiles: BTreeSet<TileId>,
}

impl BarrierGraph {
    pub fn new(zoom: u8) -> BarrierGraph {
        BarrierGraph {
            graph: Graph::new(),
            zoom,
            node_coords: HashMap::new(),
            node_way_uses: HashMap::new(),
            vertex_candidates: HashSet::new(),
            node_to_vertex: HashMap::new(),
            ways_seen: HashSet::new(),
            loaded_tiles: BTreeSet::new(),
        }
    }

    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    pub fn set_tile_loaded(&mut self, tile: TileId) {
        self.loaded_tiles.insert(tile);
    }

    pub fn is_tile_loaded(&self, tile: TileId) -> bool {
        self.loaded_tiles.contains(&tile)
    }

    pub fn tile_for(&self, pt: LonLat) -> TileId {
        TileId::containing(pt, self.zoom)
    }

    /// Is the tile containing this point loaded?
    pub fn has_tile_for(&self, pt: LonLat) -> bool {
        self.is_tile_loaded(self.tile_for(pt))
    }

    pub fn quantize(&self, pt: LonLat) -> QuantizedPt {
        QuantizedPt::from_lonlat(pt, self.zoom)
    }

    /// The full geometry of an edge in stored orientation: v1's coordinate, the shape points,
    /// v2's coordinate.
    pub fn edge_polyline(&self, id: EdgeID) -> Vec<LonLat> {
        let edge = self.graph.edge(id);
        let mut pts = Vec::with_capacity(edge.data.shape.len() + 2);
        pts.push(*self.graph.vertex(edge.v1));
        pts.extend(edge.data.shape.iter().cloned());
        pts.push(*self.graph.vertex(edge.v2));
        pts
    }

    /// Does every point of this edge sit in a loaded tile? Pruning must leave partially-loaded
    /// edges alone; they might gain connections when the adjoining tile loads.
    pub fn edge_fully_loaded(&self, id: EdgeID) -> bool {
        self.edge_polyline(id)
            .into_iter()
            .all(|pt| self.has_tile_for(pt))
    }

    /// Ingests one batch of raw features. Idempotent per way. Returns the tiles, not yet loaded,
    /// where boundary-safety vertices had to be materialized -- candidates for loading next.
    ///
    /// Three passes. First, scan barrier ways to find which nodes must become graph vertices: way
    /// endpoints and any node shared between ways. Second, locate all referenced nodes and
    /// materialize vertices; a node in an unloaded tile becomes a vertex too, so future tile
    /// loads can attach to it. Third, split each way into vertex-to-vertex edges, with the
    /// interior nodes as shape points.
    pub fn add(
        &mut self,
        features: Vec<RawFeature>,
        classifier: &BarrierClassifier,
    ) -> Result<Vec<TileId>> {
        // Pass 1: vertex candidates
        for f in &features {
            if let RawFeature::Line { id, nodes, tags } = f {
                if self.ways_seen.contains(id) || !classifier.is_barrier(tags) {
                    continue;
                }
                self.vertex_candidates.insert(nodes[0]);
                self.vertex_candidates.insert(*nodes.last().unwrap());
                let mut seen_here: HashSet<NodeID> = HashSet::new();
                for n in nodes {
                    // A way revisiting its own node (a loop) also forces a vertex there.
                    if !seen_here.insert(*n) {
                        self.vertex_candidates.insert(*n);
                        continue;
                    }
                    let uses = self.node_way_uses.entry(*n).or_insert(0);
                    *uses += 1;
                    if *uses > 1 {
                        self.vertex_candidates.insert(*n);
                    }
                }
            }
        }

        // Pass 2: locate nodes, materialize vertices
        let mut uncovered: BTreeSet<TileId> = BTreeSet::new();
        for f in &features {
            if let RawFeature::Point { id, pt } = f {
                if !self.node_way_uses.contains_key(id) {
                    continue;
                }
                self.node_coords.insert(*id, *pt);
                let tile = self.tile_for(*pt);
                let boundary_safety = !self.is_tile_loaded(tile);
                if self.vertex_candidates.contains(id) || boundary_safety {
                    if !self.node_to_vertex.contains_key(id) {
                        let v = self.graph.add_vertex(*pt);
                        self.node_to_vertex.insert(*id, v);
                        if boundary_safety {
                            uncovered.insert(tile);
                        }
                    }
                }
            }
        }

        // Pass 3: ways into edges
        for f in &features {
            if let RawFeature::Line { id, nodes, tags } = f {
                if self.ways_seen.contains(id) || !classifier.is_barrier(tags) {
                    continue;
                }
                self.add_way(*id, nodes, tags)?;
                self.ways_seen.insert(*id);
            }
        }

        Ok(uncovered.into_iter().collect())
    }

    fn add_way(&mut self, id: WayID, nodes: &[NodeID], tags: &Tags) -> Result<()> {
        let mut run_start: Option<VertexID> = None;
        let mut shape: Vec<LonLat> = Vec::new();
        for n in nodes {
            let pt = match self.node_coords.get(n) {
                Some(pt) => *pt,
                None => bail!("{} references {}, never located in any loaded tile", id, n),
            };
            match self.node_to_vertex.get(n) {
                Some(v) => {
                    let v = *v;
                    if let Some(start) = run_start {
                        self.graph.add_edge(
                            start,
                            v,
                            EdgeData {
                                shape: std::mem::take(&mut shape),
                                tags: tags.clone(),
                            },
                        );
                    }
                    run_start = Some(v);
                    shape.clear();
                }
                None => {
                    shape.push(pt);
                }
            }
        }
        Ok(())
    }

    /// Loads each tile's data, then re-establishes the planar invariants over the whole
    /// accumulated graph: a new tile's edges may cross or fuse with previously loaded geometry
    /// anywhere. Any committed faces are invalidated wholesale rather than patched. Returns the
    /// boundary-safety tiles reported by ingestion.
    pub fn add_tiles(
        &mut self,
        tiles: Vec<TileId>,
        fetcher: &dyn TileFetcher,
        classifier: &BarrierClassifier,
    ) -> Result<Vec<TileId>> {
        let mut uncovered = BTreeSet::new();
        for tile in tiles {
            if self.is_tile_loaded(tile) {
                continue;
            }
            let features = match fetcher.fetch_tile(tile) {
                Ok(features) => features,
                Err(err) => {
                    // Keep going with partial data; an unavailable source tile is just empty.
                    warn!("Fetching {} failed, treating as empty: {}", tile, err);
                    Vec::new()
                }
            };
            uncovered.extend(self.add(features, classifier)?);
            self.set_tile_loaded(tile);
        }

        if self.graph.num_faces() > 0 {
            self.graph.reset_faces();
        }
        flatten(self);
        prune_dead_ends(self);
        prune_shape_points(self);
        self.standardize_edges();

        Ok(uncovered
            .into_iter()
            .filter(|t| !self.is_tile_loaded(*t))
            .collect())
    }

    /// Canonicalizes every edge's stored orientation so that an edge discovered from either
    /// endpoint hashes identically: the forward quantized coordinate sequence must not sort
    /// after the backward one.
    pub fn standardize_edges(&mut self) {
        let ids: Vec<EdgeID> = self.graph.edge_ids().collect();
        for id in ids {
            let forward: Vec<QuantizedPt> = self
                .edge_polyline(id)
                .into_iter()
                .map(|pt| self.quantize(pt))
                .collect();
            let mut backward = forward.clone();
            backward.reverse();
            if backward < forward {
                self.graph.reverse_edge(id, |data| data.shape.reverse());
            }
        }
    }

    /// The canonical quantized coordinate sequence of an edge, the input to its content
    /// identifier. Call after `standardize_edges`.
    pub fn edge_quantized(&self, id: EdgeID) -> Vec<QuantizedPt> {
        self.edge_polyline(id)
            .into_iter()
            .map(|pt| self.quantize(pt))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::osm::tests_support::{line, point, road_tags};

    #[test]
    fn way_splits_at_shared_nodes() {
        let mut g = BarrierGraph::new(14);
        let classifier = BarrierClassifier::default_barriers();
        // Two ways sharing node 3; nodes 2 and 4 stay shape points.
        let features = vec![
            point(1, 13.401, 52.521),
            point(2, 13.402, 52.521),
            point(3, 13.403, 52.521),
            point(4, 13.403, 52.522),
            point(5, 13.403, 52.523),
            line(100, &[1, 2, 3], road_tags()),
            line(101, &[3, 4, 5], road_tags()),
        ];
        // Pretend the tile is loaded, so no boundary-safety promotion muddies the test.
        for n in [1, 2, 3, 4, 5] {
            g.set_tile_loaded(TileId::containing(
                LonLat::new(13.401 + 0.001 * f64::from(n - 1), 52.521),
                14,
            ));
        }
        g.set_tile_loaded(TileId::containing(LonLat::new(13.403, 52.522), 14));
        g.set_tile_loaded(TileId::containing(LonLat::new(13.403, 52.523), 14));
        g.add(features, &classifier).unwrap();

        assert_eq!(2, g.graph.edge_ids().count());
        // 1, 3, 5 became vertices; 2 and 4 are shape points
        assert_eq!(3, g.graph.vertex_ids().count());
        for id in g.graph.edge_ids() {
            assert_eq!(1, g.graph.edge(id).data.shape.len());
        }
    }

    #[test]
    fn readding_a_way_is_idempotent() {
        let mut g = BarrierGraph::new(14);
        let classifier = BarrierClassifier::default_barriers();
        let features = vec![
            point(1, 13.401, 52.521),
            point(2, 13.402, 52.521),
            line(100, &[1, 2], road_tags()),
        ];
        g.add(features.clone(), &classifier).unwrap();
        g.add(features, &classifier).unwrap();
        assert_eq!(1, g.graph.edge_ids().count());
    }

    #[test]
    fn missing_node_is_fatal() {
        let mut g = BarrierGraph::new(14);
        let classifier = BarrierClassifier::default_barriers();
        let features = vec![
            point(1, 13.401, 52.521),
            line(100, &[1, 2], road_tags()),
        ];
        assert!(g.add(features, &classifier).is_err());
    }

    #[test]
    fn boundary_safety_reports_uncovered_tiles() {
        let mut g = BarrierGraph::new(14);
        let classifier = BarrierClassifier::default_barriers();
        let features = vec![
            point(1, 13.401, 52.521),
            point(2, 13.402, 52.521),
            line(100, &[1, 2], road_tags()),
        ];
        let uncovered = g.add(features, &classifier).unwrap();
        // Nothing is loaded, so both nodes landed in unloaded territory.
        assert!(!uncovered.is_empty());
    }
}
