//! Cleanup passes between flattening and face assignment. Both are restricted to edges lying
//! entirely inside loaded tiles; geometry reaching into unloaded territory might still gain
//! connections and must not be touched.

use geom::LonLat;

use crate::barrier::{BarrierGraph, EdgeData};
use crate::graph::{EdgeID, VertexID};

/// Iteratively removes degree-1 vertices along with their sole edge. Removal cascades: deleting
/// an edge can drop its other endpoint to degree 1. Self-loops stay; a closed island is a real
/// boundary even when nothing else touches it.
pub fn prune_dead_ends(g: &mut BarrierGraph) {
    let mut queue: Vec<VertexID> = g
        .graph
        .vertex_ids()
        .filter(|v| g.graph.degree(*v) == 1)
        .collect();
    while let Some(v) = queue.pop() {
        if g.graph.degree(v) != 1 {
            continue;
        }
        let (edge, _) = g.graph.edges_at(v).next().unwrap();
        if g.graph.edge(edge).v1 == g.graph.edge(edge).v2 {
            continue;
        }
        if !g.edge_fully_loaded(edge) {
            continue;
        }
        let other = g.graph.other_endpoint(edge, v);
        g.graph.delete_edge(edge);
        if g.graph.degree(other) == 1 {
            queue.push(other);
        }
    }
}

/// Collapses degree-2 vertices whose two incident edges carry identical tags, fusing them into
/// one edge whose shape runs through the collapsed coordinate. Edges with differing tags are
/// never fused, even when the split was our own flattening's doing.
pub fn prune_shape_points(g: &mut BarrierGraph) {
    for v in g.graph.vertex_ids().collect::<Vec<_>>() {
        let incident: Vec<(EdgeID, bool)> = g.graph.edges_at(v).collect();
        if incident.len() != 2 {
            continue;
        }
        let (e1, _) = incident[0];
        let (e2, _) = incident[1];
        if e1 == e2 {
            // Both chain entries are the same self-loop
            continue;
        }
        if g.graph.edge(e1).v1 == g.graph.edge(e1).v2 || g.graph.edge(e2).v1 == g.graph.edge(e2).v2
        {
            continue;
        }
        if g.graph.edge(e1).data.tags != g.graph.edge(e2).data.tags {
            continue;
        }
        if !g.edge_fully_loaded(e1) || !g.edge_fully_loaded(e2) {
            continue;
        }
        fuse(g, v, e1, e2);
    }
}

/// Replaces (a -- v) and (v -- b) with one edge (a -- b), with v's coordinate demoted to a shape
/// point. Geometry order is fixed up by checking which endpoints coincide at v.
fn fuse(g: &mut BarrierGraph, v: VertexID, e1: EdgeID, e2: EdgeID) {
    let a = g.graph.other_endpoint(e1, v);
    let b = g.graph.other_endpoint(e2, v);
    let tags = g.graph.edge(e1).data.tags.clone();

    // Orient e1 as a -> v and e2 as v -> b
    let mut shape: Vec<LonLat> = Vec::new();
    let mut first = g.graph.edge(e1).data.shape.clone();
    if g.graph.edge(e1).v1 != a {
        first.reverse();
    }
    shape.extend(first);
    shape.push(*g.graph.vertex(v));
    let mut second = g.graph.edge(e2).data.shape.clone();
    if g.graph.edge(e2).v1 != v {
        second.reverse();
    }
    shape.extend(second);

    g.graph.delete_edge(e1);
    g.graph.delete_edge(e2);
    g.graph.add_edge(a, b, EdgeData { shape, tags });
}

#[cfg(test)]
mod tests {
    use super::*;
    use geom::{LonLat, TileId};
    use std::collections::BTreeMap;

    fn loaded_graph() -> BarrierGraph {
        let mut g = BarrierGraph::new(14);
        // Cover a small neighborhood around the test coordinates
        for dx in -2..=2 {
            for dy in -2..=2 {
                let t = TileId::containing(LonLat::new(13.41, 52.51), 14);
                g.set_tile_loaded(TileId::new(
                    (t.x as i64 + dx) as u32,
                    (t.y as i64 + dy) as u32,
                    14,
                ));
            }
        }
        g
    }

    fn add_edge(g: &mut BarrierGraph, v1: VertexID, v2: VertexID, tag: &str) -> EdgeID {
        let mut tags = BTreeMap::new();
        tags.insert("highway".to_string(), tag.to_string());
        g.graph.add_edge(
            v1,
            v2,
            EdgeData {
                shape: Vec::new(),
                tags,
            },
        )
    }

    #[test]
    fn isolated_edge_fully_pruned() {
        let mut g = loaded_graph();
        let a = g.graph.add_vertex(LonLat::new(13.410, 52.510));
        let b = g.graph.add_vertex(LonLat::new(13.411, 52.510));
        add_edge(&mut g, a, b, "residential");
        prune_dead_ends(&mut g);
        assert_eq!(0, g.graph.edge_ids().count());
        assert_eq!(0, g.graph.degree(a));
        assert_eq!(0, g.graph.degree(b));
    }

    #[test]
    fn self_loop_survives() {
        let mut g = loaded_graph();
        let a = g.graph.add_vertex(LonLat::new(13.410, 52.510));
        add_edge(&mut g, a, a, "residential");
        prune_dead_ends(&mut g);
        assert_eq!(1, g.graph.edge_ids().count());
    }

    #[test]
    fn dead_end_chain_cascades() {
        let mut g = loaded_graph();
        // A triangle with a two-edge tail hanging off one corner
        let v: Vec<VertexID> = [
            (13.410, 52.510),
            (13.411, 52.510),
            (13.4105, 52.511),
            (13.412, 52.512),
            (13.413, 52.513),
        ]
        .iter()
        .map(|(x, y)| g.graph.add_vertex(LonLat::new(*x, *y)))
        .collect();
        add_edge(&mut g, v[0], v[1], "residential");
        add_edge(&mut g, v[1], v[2], "residential");
        add_edge(&mut g, v[2], v[0], "residential");
        add_edge(&mut g, v[2], v[3], "residential");
        add_edge(&mut g, v[3], v[4], "residential");

        prune_dead_ends(&mut g);
        assert_eq!(3, g.graph.edge_ids().count());
        assert_eq!(0, g.graph.degree(v[3]));
        assert_eq!(0, g.graph.degree(v[4]));
    }

    #[test]
    fn unloaded_edge_not_pruned() {
        let mut g = BarrierGraph::new(14);
        // Nothing loaded at all
        let a = g.graph.add_vertex(LonLat::new(13.410, 52.510));
        let b = g.graph.add_vertex(LonLat::new(13.411, 52.510));
        add_edge(&mut g, a, b, "residential");
        prune_dead_ends(&mut g);
        assert_eq!(1, g.graph.edge_ids().count());
    }

    #[test]
    fn matching_tags_fuse_through_degree_two() {
        let mut g = loaded_graph();
        let a = g.graph.add_vertex(LonLat::new(13.410, 52.510));
        let v = g.graph.add_vertex(LonLat::new(13.411, 52.510));
        let b = g.graph.add_vertex(LonLat::new(13.412, 52.510));
        add_edge(&mut g, a, v, "residential");
        add_edge(&mut g, v, b, "residential");

        prune_shape_points(&mut g);
        assert_eq!(1, g.graph.edge_ids().count());
        assert_eq!(0, g.graph.degree(v));
        let fused = g.graph.edge_ids().next().unwrap();
        // v's coordinate lives on as a shape point
        assert_eq!(1, g.graph.edge(fused).data.shape.len());
        assert!(g.graph.edge(fused).data.shape[0].approx_eq(LonLat::new(13.411, 52.510)));
    }

    #[test]
    fn differing_tags_never_fuse() {
        let mut g = loaded_graph();
        let a = g.graph.add_vertex(LonLat::new(13.410, 52.510));
        let v = g.graph.add_vertex(LonLat::new(13.411, 52.510));
        let b = g.graph.add_vertex(LonLat::new(13.412, 52.510));
        add_edge(&mut g, a, v, "residential");
        add_edge(&mut g, v, b, "primary");

        prune_shape_points(&mut g);
        assert_eq!(2, g.graph.edge_ids().count());
    }
}
