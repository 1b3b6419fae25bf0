//! Face assignment: every directed edge side in a fully loaded region gets a face, found by
//! walking the planar graph and always turning onto the most-clockwise next edge. Missing tile
//! data is reported back as a value; the outer driver loads it and calls again, and everything
//! already committed stays valid.

use std::collections::HashSet;

use anyhow::Result;

use geom::{Angle, LonLat, Ring, TileId};

use crate::barrier::{BarrierGraph, FaceData};
use crate::graph::{EdgeID, FaceID, Side, VertexID};

#[derive(Debug, PartialEq)]
pub enum AssignOutcome {
    Complete,
    /// The walk spilled into unloaded territory. Load these, then retry.
    NeedsTiles(Vec<TileId>),
}

#[derive(Clone, Copy, Debug)]
struct Hop {
    edge: EdgeID,
    forward: bool,
}

impl Hop {
    fn departure(self, g: &BarrierGraph) -> VertexID {
        let e = g.graph.edge(self.edge);
        if self.forward {
            e.v1
        } else {
            e.v2
        }
    }

    fn arrival(self, g: &BarrierGraph) -> VertexID {
        let e = g.graph.edge(self.edge);
        if self.forward {
            e.v2
        } else {
            e.v1
        }
    }

    /// The side of the stored edge that the face being traced lies on.
    fn face_side(self) -> Side {
        if self.forward {
            Side::Right
        } else {
            Side::Left
        }
    }
}

/// Assigns a face to every unassigned directed edge side seeded from vertices inside `tile`.
/// Re-entrant: on `NeedsTiles`, the caller loads the tiles and calls again; sides committed so
/// far are skipped.
pub fn assign_faces(g: &mut BarrierGraph, tile: TileId) -> Result<AssignOutcome> {
    let mut missing: Vec<TileId> = Vec::new();
    for v in g.graph.vertex_ids().collect::<Vec<_>>() {
        if TileId::containing(*g.graph.vertex(v), g.zoom()) != tile {
            continue;
        }
        for (edge, _) in g.graph.edges_at(v).collect::<Vec<_>>() {
            // Both orientations: a self-loop shows up in the chain once, but both its sides
            // still need a face.
            for forward in [true, false] {
                let seed = Hop { edge, forward };
                if g.graph.face_of(edge, seed.face_side()).is_some() {
                    continue;
                }
                match walk(g, seed)? {
                    WalkOutcome::Face(hops) => {
                        commit(g, hops);
                    }
                    WalkOutcome::UTurn => {
                        // An unpruned dead-end; the boundary doesn't enclose anything. Not an
                        // error.
                    }
                    WalkOutcome::MissingTile(t) => {
                        if !missing.contains(&t) {
                            missing.push(t);
                        }
                    }
                }
            }
        }
    }
    if missing.is_empty() {
        Ok(AssignOutcome::Complete)
    } else {
        Ok(AssignOutcome::NeedsTiles(missing))
    }
}

enum WalkOutcome {
    Face(Vec<Hop>),
    UTurn,
    MissingTile(TileId),
}

fn walk(g: &BarrierGraph, seed: Hop) -> Result<WalkOutcome> {
    let mut path = vec![seed];
    // Planarity bounds a face by the number of directed edge sides; anything longer means the
    // graph is corrupt.
    let limit = 2 * g.graph.num_edge_slots() + 1;
    loop {
        if path.len() > limit {
            bail!(
                "Face walk from {} never closed; topology is corrupt",
                seed.departure(g)
            );
        }
        let current = *path.last().unwrap();
        let at = current.arrival(g);

        let at_pt = *g.graph.vertex(at);
        if !g.has_tile_for(at_pt) {
            return Ok(WalkOutcome::MissingTile(g.tile_for(at_pt)));
        }

        let next = next_clockwise(g, current, at);
        // A boundary can pass through a vertex twice (a cut vertex, or a self-loop beside other
        // edges), so the face only closes when the walk comes back around to the exact directed
        // side it started on.
        if next.edge == seed.edge && next.forward == seed.forward {
            return Ok(WalkOutcome::Face(path));
        }
        if next.edge == current.edge && next.arrival(g) == current.departure(g) {
            return Ok(WalkOutcome::UTurn);
        }
        path.push(next);
    }
}

/// From the arrival vertex of `incoming`, picks the next hop: sort every directed departure at
/// the vertex by its departure angle, ascending clockwise from the direction pointing back along
/// the incoming edge, and take the first. The exact reversal of the incoming hop is never a
/// candidate, only the dead-end fallback.
fn next_clockwise(g: &BarrierGraph, incoming: Hop, at: VertexID) -> Hop {
    let back = Hop {
        edge: incoming.edge,
        forward: !incoming.forward,
    };
    let back_angle = departure_angle(g, at, back);

    let mut best: Option<(f64, Hop)> = None;
    for (edge, forward) in g.graph.edges_at(at) {
        let e = g.graph.edge(edge);
        for fwd in [true, false] {
            // A self-loop sits in the chain once but departs this vertex in both directions; an
            // ordinary edge only departs the way the chain yields it.
            if e.v1 != e.v2 && fwd != forward {
                continue;
            }
            if edge == back.edge && fwd == back.forward {
                continue;
            }
            let candidate = Hop { edge, forward: fwd };
            let angle = departure_angle(g, at, candidate);
            let dist = back_angle.clockwise_distance_to(angle);
            if best.map(|(d, _)| dist < d).unwrap_or(true) {
                best = Some((dist, candidate));
            }
        }
    }
    match best {
        Some((_, hop)) => hop,
        // Dead-end: the only way onward is back the way we came.
        None => back,
    }
}

/// The local direction an edge leaves `from` in: toward its first shape point, or toward the
/// opposite vertex if it has no shape. The first shape point matters; a long curving edge's far
/// endpoint says nothing about how it departs here.
fn departure_angle(g: &BarrierGraph, from: VertexID, hop: Hop) -> Angle {
    let e = g.graph.edge(hop.edge);
    let from_pt = *g.graph.vertex(from);
    let target: LonLat = if hop.forward {
        e.data
            .shape
            .first()
            .cloned()
            .unwrap_or_else(|| *g.graph.vertex(e.v2))
    } else {
        e.data
            .shape
            .last()
            .cloned()
            .unwrap_or_else(|| *g.graph.vertex(e.v1))
    };
    from_pt.angle_to(target)
}

fn commit(g: &mut BarrierGraph, hops: Vec<Hop>) {
    // A malformed walk can revisit a side before closing. Discard those instead of corrupting
    // the boundary cycles.
    let mut seen: HashSet<(EdgeID, Side)> = HashSet::new();
    for hop in &hops {
        if g.graph.face_of(hop.edge, hop.face_side()).is_some()
            || !seen.insert((hop.edge, hop.face_side()))
        {
            return;
        }
    }
    let face = g.graph.new_face(FaceData::default());
    for hop in hops {
        g.graph.set_face(hop.edge, hop.face_side(), face);
    }
}

/// Glues the boundary cycle back into world-space geometry. `None` for degenerate loops with
/// too few distinct points to enclose anything.
pub fn face_ring(g: &BarrierGraph, face: FaceID) -> Option<Ring> {
    let boundary = g.graph.face_boundary(face);
    if boundary.is_empty() {
        return None;
    }
    let mut pts: Vec<LonLat> = Vec::new();
    for (edge, side) in boundary {
        let mut piece = g.edge_polyline(edge);
        if side == Side::Left {
            piece.reverse();
        }
        piece.pop();
        pts.extend(piece);
    }
    pts.push(pts[0]);
    pts.dedup_by(|a, b| a.approx_eq(*b));
    Ring::new(pts).ok()
}

/// Interior faces enclose area; the traversal rule makes them come out counter-clockwise in
/// (lon, lat) space. The single outer face (and the region around any island) traces the other
/// way and encloses nothing.
pub fn is_interior(g: &BarrierGraph, face: FaceID) -> bool {
    match face_ring(g, face) {
        Some(ring) => !ring.is_clockwise(),
        None => false,
    }
}
