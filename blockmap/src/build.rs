//! Orchestrates a tile's whole pipeline: fetch, planarize, assign faces (loading spillover tiles
//! as the walks demand), annotate, serialize. Also the read-side entry point that turns one or
//! many artifacts back into polygons.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Condvar, Mutex};

use anyhow::Result;

use blockutil::Timer;
use geom::{Ring, TileId};

use crate::barrier::{BarrierGraph, TileFetcher};
use crate::classify::BarrierClassifier;
use crate::faces::{assign_faces, AssignOutcome};
use crate::guid::Guid;
use crate::io::{read_tile, write_tile};
use crate::landuse::{attach_landuse, LanduseSource};
use crate::osm::{NodeID, RawFeature, Tags, WayID, TILE_EDGE_KEY, TILE_EDGE_VALUE};
use crate::polygon_graph::PolygonGraph;

lazy_static! {
    static ref IN_PROGRESS: Mutex<HashSet<u64>> = Mutex::new(HashSet::new());
    static ref BUILD_FINISHED: Condvar = Condvar::new();
}

/// Exclusive claim on building one tile. Concurrent callers for the same tile block until the
/// winner drops its slot, then observe the artifact the winner wrote and skip rebuilding.
struct BuildSlot(u64);

impl BuildSlot {
    /// None means somebody else already produced the artifact; there's nothing left to do.
    fn acquire(tile: TileId, artifact: &Path) -> Option<BuildSlot> {
        let key = tile.encode();
        let mut building = IN_PROGRESS.lock().unwrap();
        while building.contains(&key) {
            building = BUILD_FINISHED.wait(building).unwrap();
        }
        if artifact.exists() {
            return None;
        }
        building.insert(key);
        Some(BuildSlot(key))
    }
}

impl Drop for BuildSlot {
    fn drop(&mut self) {
        IN_PROGRESS.lock().unwrap().remove(&self.0);
        BUILD_FINISHED.notify_all();
    }
}

pub fn artifact_path(storage: &Path, tile: TileId) -> PathBuf {
    storage.join(format!("{}.tile.graph", tile.encode()))
}

/// Produces (or reuses) the serialized graph artifact for one tile. Safe to call concurrently
/// for any mix of tiles; each artifact is written exactly once, to a temp file first.
pub fn build_for_tile(
    tile: TileId,
    storage: &Path,
    fetcher: &dyn TileFetcher,
    classifier: &BarrierClassifier,
    landuse: Option<&dyn LanduseSource>,
    timer: &mut Timer,
) -> Result<PathBuf> {
    let path = artifact_path(storage, tile);
    if path.exists() {
        return Ok(path);
    }
    let _slot = match BuildSlot::acquire(tile, &path) {
        Some(slot) => slot,
        None => {
            return Ok(path);
        }
    };
    fs_err::create_dir_all(storage)?;

    timer.start(&format!("build {}", tile));
    let mut graph = BarrierGraph::new(tile.z);

    // The synthetic frame goes in first, so flattening splits barrier ways where they cross the
    // tile boundary and every interior face closes inside the tile.
    graph.add(frame_features(tile), classifier)?;

    timer.start("load and planarize");
    graph.add_tiles(vec![tile], fetcher, classifier)?;
    timer.stop("load and planarize");

    timer.start("assign faces");
    loop {
        match assign_faces(&mut graph, tile)? {
            AssignOutcome::Complete => {
                break;
            }
            AssignOutcome::NeedsTiles(needed) => {
                info!("{} walks spill into {} more tiles", tile, needed.len());
                graph.add_tiles(needed, fetcher, classifier)?;
            }
        }
    }
    timer.stop("assign faces");

    if let Some(source) = landuse {
        timer.start("attach landuse");
        attach_landuse(&mut graph, source)?;
        timer.stop("attach landuse");
    }

    let tmp = storage.join(format!("{}.tile.graph.tmp", tile.encode()));
    write_tile(&graph, tile, &tmp)?;
    fs_err::rename(&tmp, &path)?;
    timer.stop(&format!("build {}", tile));

    Ok(path)
}

/// All polygons for a tile, as (ring, content identifier). At `build_zoom` this reads one
/// artifact; at an ancestor zoom it builds and reads every descendant, with shared boundary
/// geometry and duplicate faces unified by identifier.
pub fn polygons_for_tile(
    tile: TileId,
    storage: &Path,
    fetcher: &dyn TileFetcher,
    classifier: &BarrierClassifier,
    landuse: Option<&dyn LanduseSource>,
    build_zoom: u8,
    timer: &mut Timer,
) -> Result<Vec<(Ring, Guid)>> {
    if tile.z > build_zoom {
        bail!(
            "{} is deeper than the build zoom {}; query an ancestor instead",
            tile,
            build_zoom
        );
    }
    let tiles = tile.descendants(build_zoom);
    let mut pg = PolygonGraph::new();
    timer.start_iter("build and read tiles", tiles.len());
    for t in tiles {
        timer.next();
        let path = build_for_tile(t, storage, fetcher, classifier, landuse, timer)?;
        read_tile(&mut pg, &path)?;
    }
    timer.end_iter();
    Ok(pg.polygons())
}

/// A closed rectangular way just inside the tile's bounds, tagged as the tile frame. Synthetic
/// ids are negative, derived from the tile id, so they never collide with real OSM ids or with
/// another tile's frame.
fn frame_features(tile: TileId) -> Vec<RawFeature> {
    let bounds = tile.bounds();
    // Inset slightly: a point exactly on the max boundary would quantize into the next tile.
    let dx = (bounds.max_lon - bounds.min_lon) * 1e-6;
    let dy = (bounds.max_lat - bounds.min_lat) * 1e-6;
    let corners = [
        (bounds.min_lon + dx, bounds.min_lat + dy),
        (bounds.min_lon + dx, bounds.max_lat - dy),
        (bounds.max_lon - dx, bounds.max_lat - dy),
        (bounds.max_lon - dx, bounds.min_lat + dy),
    ];

    let base = tile.encode() as i64;
    let node_ids: Vec<NodeID> = (0..4).map(|i| NodeID(-(base * 4 + i + 1))).collect();
    let mut features: Vec<RawFeature> = corners
        .iter()
        .zip(node_ids.iter())
        .map(|((lon, lat), id)| RawFeature::Point {
            id: *id,
            pt: geom::LonLat::new(*lon, *lat),
        })
        .collect();

    let mut tags = Tags::new();
    tags.insert(TILE_EDGE_KEY.to_string(), TILE_EDGE_VALUE.to_string());
    let mut nodes = node_ids.clone();
    nodes.push(node_ids[0]);
    features.push(RawFeature::Line {
        id: WayID(-(base + 1)),
        nodes,
        tags,
    });
    features
}
