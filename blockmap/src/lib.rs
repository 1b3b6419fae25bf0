//! Derives urban block polygons from tagged barrier features (roads, rails, waterways), one
//! slippy-map tile at a time. Raw ways become a planar graph, the graph's faces become polygons,
//! and tiles serialize to content-addressed artifacts that stitch back together on read.

#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;

pub mod barrier;
pub mod build;
pub mod classify;
pub mod faces;
pub mod flatten;
pub mod graph;
pub mod guid;
pub mod io;
pub mod landuse;
pub mod merge;
pub mod osm;
pub mod polygon_graph;
pub mod prune;

pub use crate::barrier::{BarrierGraph, EdgeData, FaceData, TileFetcher};
pub use crate::build::{build_for_tile, polygons_for_tile};
pub use crate::classify::BarrierClassifier;
pub use crate::faces::{assign_faces, AssignOutcome};
pub use crate::guid::Guid;
pub use crate::landuse::LanduseSource;
pub use crate::merge::{DefaultCost, MergeCost, MergeSession, PolygonID, UrbanPolygon};
pub use crate::osm::{NodeID, RawFeature, Tags, WayID};
pub use crate::polygon_graph::PolygonGraph;
