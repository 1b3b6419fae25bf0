//! The generic half-edge arena underneath the barrier graph and the read-side polygon graph.
//! Vertices, edges, and faces live in append-only arenas addressed by typed indices. Every edge
//! is stored once, undirected, and hangs off both endpoints via an intrusive "next edge at this
//! vertex" chain. Face membership per edge side and the face boundary cycles are intrusive too.
//!
//! Deleting an edge just unlinks it; the record stays behind as an unreachable tombstone. The
//! arenas are tile-scoped and short-lived, so nothing bothers compacting them.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VertexID(pub usize);
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeID(pub usize);
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FaceID(pub usize);

impl fmt::Display for VertexID {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Vertex #{}", self.0)
    }
}
impl fmt::Display for EdgeID {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Edge #{}", self.0)
    }
}
impl fmt::Display for FaceID {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Face #{}", self.0)
    }
}

/// Which side of an edge, relative to its stored v1 -> v2 orientation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }

    fn idx(self) -> usize {
        match self {
            Side::Left => 0,
            Side::Right => 1,
        }
    }
}

pub struct Vertex<V> {
    pub data: V,
    first_edge: Option<EdgeID>,
}

pub struct Edge<E> {
    pub v1: VertexID,
    pub v2: VertexID,
    pub data: E,
    next_at_v1: Option<EdgeID>,
    next_at_v2: Option<EdgeID>,
    // Indexed by Side
    face: [Option<FaceID>; 2],
    next_boundary: [Option<(EdgeID, Side)>; 2],
    deleted: bool,
}

pub struct Face<F> {
    pub data: F,
    repr: Option<(EdgeID, Side)>,
}

pub struct Graph<V, E, F> {
    vertices: Vec<Vertex<V>>,
    edges: Vec<Edge<E>>,
    faces: Vec<Face<F>>,
}

impl<V, E, F> Graph<V, E, F> {
    pub fn new() -> Graph<V, E, F> {
        Graph {
            vertices: Vec::new(),
            edges: Vec::new(),
            faces: Vec::new(),
        }
    }

    pub fn add_vertex(&mut self, data: V) -> VertexID {
        let id = VertexID(self.vertices.len());
        self.vertices.push(Vertex {
            data,
            first_edge: None,
        });
        id
    }

    pub fn add_edge(&mut self, v1: VertexID, v2: VertexID, data: E) -> EdgeID {
        let id = EdgeID(self.edges.len());
        self.edges.push(Edge {
            v1,
            v2,
            data,
            next_at_v1: None,
            next_at_v2: None,
            face: [None, None],
            next_boundary: [None, None],
            deleted: false,
        });
        // Prepend to both chains. A self-loop only occupies its vertex's chain once.
        self.edges[id.0].next_at_v1 = self.vertices[v1.0].first_edge;
        self.vertices[v1.0].first_edge = Some(id);
        if v1 != v2 {
            self.edges[id.0].next_at_v2 = self.vertices[v2.0].first_edge;
            self.vertices[v2.0].first_edge = Some(id);
        }
        id
    }

    /// Unlinks the edge from both endpoint chains. The edge must not belong to any face; callers
    /// reset faces before restructuring the graph.
    pub fn delete_edge(&mut self, id: EdgeID) {
        assert!(!self.edges[id.0].deleted, "{} deleted twice", id);
        assert!(
            self.edges[id.0].face == [None, None],
            "{} still belongs to a face",
            id
        );
        let (v1, v2) = (self.edges[id.0].v1, self.edges[id.0].v2);
        self.unlink_from_chain(v1, id);
        if v1 != v2 {
            self.unlink_from_chain(v2, id);
        }
        self.edges[id.0].deleted = true;
    }

    fn unlink_from_chain(&mut self, v: VertexID, id: EdgeID) {
        let next_of = |edge: &Edge<E>| {
            if edge.v1 == v {
                edge.next_at_v1
            } else {
                edge.next_at_v2
            }
        };
        let target_next = next_of(&self.edges[id.0]);

        let mut prev: Option<EdgeID> = None;
        let mut current = self.vertices[v.0].first_edge;
        while let Some(e) = current {
            if e == id {
                match prev {
                    None => {
                        self.vertices[v.0].first_edge = target_next;
                    }
                    Some(p) => {
                        if self.edges[p.0].v1 == v {
                            self.edges[p.0].next_at_v1 = target_next;
                        } else {
                            self.edges[p.0].next_at_v2 = target_next;
                        }
                    }
                }
                return;
            }
            prev = current;
            current = next_of(&self.edges[e.0]);
        }
        panic!("{} isn't on {}'s chain", id, v);
    }

    /// Swaps the stored orientation of an edge, including its face slots and boundary links, and
    /// lets the caller fix up direction-relative data (shape points).
    pub fn reverse_edge<T: FnOnce(&mut E)>(&mut self, id: EdgeID, transform: T) {
        let edge = &mut self.edges[id.0];
        assert!(!edge.deleted);
        std::mem::swap(&mut edge.v1, &mut edge.v2);
        // A self-loop only occupies its vertex's chain via the v1 slot; swapping would orphan it.
        if edge.v1 != edge.v2 {
            std::mem::swap(&mut edge.next_at_v1, &mut edge.next_at_v2);
        }
        edge.face.swap(0, 1);
        edge.next_boundary.swap(0, 1);
        transform(&mut edge.data);
        // Anything pointing at a side of this edge in a boundary cycle is now stale.
        let mut affected: Vec<FaceID> = edge.face.iter().flatten().cloned().collect();
        affected.dedup();
        for f in affected {
            self.repair_boundary_links(id, f);
        }
    }

    fn repair_boundary_links(&mut self, reversed: EdgeID, face: FaceID) {
        let start = self.faces[face.0].repr.unwrap();
        let mut fixed = start;
        if fixed.0 == reversed {
            fixed = (fixed.0, fixed.1.opposite());
            self.faces[face.0].repr = Some(fixed);
        }
        let mut current = fixed;
        loop {
            let next = self.edges[current.0 .0].next_boundary[current.1.idx()].unwrap();
            let repaired = if next.0 == reversed {
                (next.0, next.1.opposite())
            } else {
                next
            };
            self.edges[current.0 .0].next_boundary[current.1.idx()] = Some(repaired);
            current = repaired;
            if current == fixed {
                break;
            }
        }
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// The arena length, including tombstones. Iterate with `is_deleted` checks.
    pub fn num_edge_slots(&self) -> usize {
        self.edges.len()
    }

    pub fn is_deleted(&self, id: EdgeID) -> bool {
        self.edges[id.0].deleted
    }

    pub fn edge_ids(&self) -> impl Iterator<Item = EdgeID> + '_ {
        (0..self.edges.len())
            .map(EdgeID)
            .filter(move |id| !self.edges[id.0].deleted)
    }

    pub fn vertex_ids(&self) -> impl Iterator<Item = VertexID> {
        (0..self.vertices.len()).map(VertexID)
    }

    pub fn face_ids(&self) -> impl Iterator<Item = FaceID> {
        (0..self.faces.len()).map(FaceID)
    }

    pub fn vertex(&self, id: VertexID) -> &V {
        &self.vertices[id.0].data
    }

    pub fn edge(&self, id: EdgeID) -> &Edge<E> {
        &self.edges[id.0]
    }

    pub fn edge_data_mut(&mut self, id: EdgeID) -> &mut E {
        &mut self.edges[id.0].data
    }

    pub fn face(&self, id: FaceID) -> &Face<F> {
        &self.faces[id.0]
    }

    pub fn face_data_mut(&mut self, id: FaceID) -> &mut F {
        &mut self.faces[id.0].data
    }

    pub fn face_of(&self, id: EdgeID, side: Side) -> Option<FaceID> {
        self.edges[id.0].face[side.idx()]
    }

    /// All edges incident to a vertex, in chain order. Yields `(edge, forward)` where forward
    /// means the edge's stored v1 is this vertex, so callers know how to read direction-relative
    /// data. A self-loop shows up once.
    pub fn edges_at(&self, v: VertexID) -> EdgesAt<'_, V, E, F> {
        EdgesAt {
            graph: self,
            vertex: v,
            current: self.vertices[v.0].first_edge,
        }
    }

    pub fn degree(&self, v: VertexID) -> usize {
        self.edges_at(v).count()
    }

    /// The vertex on the other end. For a self-loop, the same vertex.
    pub fn other_endpoint(&self, id: EdgeID, v: VertexID) -> VertexID {
        let edge = &self.edges[id.0];
        if edge.v1 == v {
            edge.v2
        } else {
            assert_eq!(edge.v2, v, "{} doesn't touch {}", id, v);
            edge.v1
        }
    }

    pub fn new_face(&mut self, data: F) -> FaceID {
        let id = FaceID(self.faces.len());
        self.faces.push(Face { data, repr: None });
        id
    }

    /// Claims one side of an edge for a face and links it into the face's boundary cycle in O(1).
    /// The inserted side becomes the face's representative, so successive insertions preserve
    /// traversal order.
    pub fn set_face(&mut self, id: EdgeID, side: Side, face: FaceID) {
        assert!(
            self.edges[id.0].face[side.idx()].is_none(),
            "{} {:?} side already has a face",
            id,
            side
        );
        self.edges[id.0].face[side.idx()] = Some(face);
        match self.faces[face.0].repr {
            None => {
                self.edges[id.0].next_boundary[side.idx()] = Some((id, side));
            }
            Some((re, rs)) => {
                self.edges[id.0].next_boundary[side.idx()] = self.edges[re.0].next_boundary[rs.idx()];
                self.edges[re.0].next_boundary[rs.idx()] = Some((id, side));
            }
        }
        self.faces[face.0].repr = Some((id, side));
    }

    /// The boundary cycle of a face, in insertion (traversal) order.
    pub fn face_boundary(&self, face: FaceID) -> Vec<(EdgeID, Side)> {
        let mut result = Vec::new();
        let start = match self.faces[face.0].repr {
            Some(x) => x,
            None => {
                return result;
            }
        };
        // The representative is the most recently inserted hop; its next pointer leads back to
        // the first one, so starting from next yields the original traversal order.
        let first = self.edges[start.0 .0].next_boundary[start.1.idx()].unwrap();
        let mut current = first;
        loop {
            result.push(current);
            current = self.edges[current.0 .0].next_boundary[current.1.idx()].unwrap();
            if current == first {
                break;
            }
        }
        result
    }

    /// Clears every face association in O(edges), ahead of a full re-assignment pass.
    pub fn reset_faces(&mut self) {
        for edge in &mut self.edges {
            edge.face = [None, None];
            edge.next_boundary = [None, None];
        }
        self.faces.clear();
    }

    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }
}

pub struct EdgesAt<'a, V, E, F> {
    graph: &'a Graph<V, E, F>,
    vertex: VertexID,
    current: Option<EdgeID>,
}

impl<'a, V, E, F> Iterator for EdgesAt<'a, V, E, F> {
    type Item = (EdgeID, bool);

    fn next(&mut self) -> Option<(EdgeID, bool)> {
        let id = self.current?;
        let edge = &self.graph.edges[id.0];
        let forward = edge.v1 == self.vertex;
        self.current = if forward {
            edge.next_at_v1
        } else {
            edge.next_at_v2
        };
        Some((id, forward))
    }
}
