//! End-to-end: raw features in, artifact on disk, polygons back out, merged.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::Result;

use blockutil::Timer;
use geom::{LonLat, TileId};

use blockmap::{
    build_for_tile, polygons_for_tile, BarrierClassifier, MergeSession, NodeID, PolygonGraph,
    RawFeature, Tags, TileFetcher, WayID,
};

struct InMemoryFetcher {
    tiles: HashMap<TileId, Vec<RawFeature>>,
}

impl TileFetcher for InMemoryFetcher {
    fn fetch_tile(&self, tile: TileId) -> Result<Vec<RawFeature>> {
        Ok(self.tiles.get(&tile).cloned().unwrap_or_default())
    }
}

fn point(id: i64, lon: f64, lat: f64) -> RawFeature {
    RawFeature::Point {
        id: NodeID(id),
        pt: LonLat::new(lon, lat),
    }
}

fn line(id: i64, nodes: &[i64]) -> RawFeature {
    let mut tags = Tags::new();
    tags.insert("highway".to_string(), "residential".to_string());
    RawFeature::Line {
        id: WayID(id),
        nodes: nodes.iter().map(|n| NodeID(*n)).collect(),
        tags,
    }
}

/// A road cross spanning the whole tile (ends poking into the neighbor tiles), plus a small
/// closed island square in the northwest quadrant. With the injected frame this yields 4 quadrant
/// faces and the island's interior.
fn test_tile() -> (TileId, InMemoryFetcher) {
    let tile = TileId::containing(LonLat::new(13.41, 52.51), 14);
    let b = tile.bounds();
    let w = b.max_lon - b.min_lon;
    let h = b.max_lat - b.min_lat;
    let mid_lon = b.min_lon + 0.5 * w;
    let mid_lat = b.min_lat + 0.5 * h;

    let mut features = vec![
        point(1, b.min_lon - 0.2 * w, mid_lat),
        point(2, b.max_lon + 0.2 * w, mid_lat),
        point(3, mid_lon, b.min_lat - 0.2 * h),
        point(4, mid_lon, b.max_lat + 0.2 * h),
        line(100, &[1, 2]),
        line(101, &[3, 4]),
    ];
    // Island corners, counter-clockwise
    let (ilon, ilat) = (b.min_lon + 0.25 * w, b.min_lat + 0.75 * h);
    features.push(point(5, ilon, ilat));
    features.push(point(6, ilon + 0.04 * w, ilat));
    features.push(point(7, ilon + 0.04 * w, ilat + 0.04 * h));
    features.push(point(8, ilon, ilat + 0.04 * h));
    features.push(line(102, &[5, 6, 7]));
    features.push(line(103, &[7, 8, 5]));

    let mut tiles = HashMap::new();
    tiles.insert(tile, features);
    (tile, InMemoryFetcher { tiles })
}

fn storage(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("blockmap-pipeline-{}-{}", std::process::id(), name));
    if dir.exists() {
        fs_err::remove_dir_all(&dir).unwrap();
    }
    dir
}

#[test]
fn build_read_merge() {
    let (tile, fetcher) = test_tile();
    let classifier = BarrierClassifier::default_barriers();
    let storage = storage("main");
    let mut timer = Timer::throwaway();

    let path = build_for_tile(tile, &storage, &fetcher, &classifier, None, &mut timer).unwrap();
    assert!(path.exists());

    let mut pg = PolygonGraph::new();
    blockmap::io::read_tile(&mut pg, &path).unwrap();
    let polygons = pg.polygons();
    // 4 quadrants plus the island interior
    assert_eq!(5, polygons.len());
    for (ring, _) in &polygons {
        assert!(!ring.is_clockwise());
        assert!(ring.area() > 0.0);
    }

    // Quadrants all touch the frame, so only the island counts toward a merge target, and the
    // frame polygons never fuse away.
    let session = MergeSession::new(&pg, &classifier).unwrap();
    assert_eq!(1, session.countable());
    let merged = session.merge(0, &blockmap::DefaultCost).unwrap();
    assert_eq!(5, merged.len());
}

#[test]
fn independent_builds_are_identical() {
    let (tile, fetcher) = test_tile();
    let classifier = BarrierClassifier::default_barriers();
    let mut timer = Timer::throwaway();

    let p1 = build_for_tile(
        tile,
        &storage("repeat-a"),
        &fetcher,
        &classifier,
        None,
        &mut timer,
    )
    .unwrap();
    let (_, fetcher2) = test_tile();
    let p2 = build_for_tile(
        tile,
        &storage("repeat-b"),
        &fetcher2,
        &classifier,
        None,
        &mut timer,
    )
    .unwrap();

    // Identifier determinism all the way down to the artifact bytes
    assert_eq!(fs_err::read(&p1).unwrap(), fs_err::read(&p2).unwrap());
}

#[test]
fn ancestor_query_aggregates_descendants() {
    let (tile, fetcher) = test_tile();
    let classifier = BarrierClassifier::default_barriers();
    let storage = storage("ancestor");
    let mut timer = Timer::throwaway();

    let parent = tile.parent().unwrap();
    let polygons = polygons_for_tile(
        parent,
        &storage,
        &fetcher,
        &classifier,
        None,
        14,
        &mut timer,
    )
    .unwrap();
    // The barrier-laden tile contributes its 5 polygons. The three empty siblings each
    // contribute one tile-sized frame polygon.
    assert_eq!(8, polygons.len());
}

#[test]
fn missing_artifact_reads_as_empty() {
    let mut pg = PolygonGraph::new();
    blockmap::io::read_tile(&mut pg, &storage("missing").join("nope.tile.graph")).unwrap();
    assert!(pg.polygons().is_empty());
}
