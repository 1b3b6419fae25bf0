//! Runs the block pipeline against a local OSM XML extract: build tile artifacts, dump the
//! resulting polygons as GeoJSON, optionally merged down to a target count.

#[macro_use]
extern crate log;

mod osm_source;

use std::path::PathBuf;

use anyhow::Result;
use structopt::StructOpt;

use blockmap::{BarrierClassifier, DefaultCost, MergeSession, PolygonGraph};
use blockutil::Timer;
use geom::{LonLat, Ring, TileId};

use crate::osm_source::OsmFileSource;

#[derive(StructOpt)]
#[structopt(name = "blockmap", about = "Urban block polygons from barrier data")]
enum Command {
    /// Build the tile artifact containing a point, plus whatever neighbors the build spills into
    Build {
        /// The path to an OSM XML extract
        #[structopt(long)]
        osm: String,
        /// The folder holding .tile.graph artifacts
        #[structopt(long)]
        storage: PathBuf,
        #[structopt(long)]
        lon: f64,
        #[structopt(long)]
        lat: f64,
        /// The slippy-map zoom tiles are built at
        #[structopt(long, default_value = "14")]
        zoom: u8,
    },
    /// Write the polygons for the tile containing a point as GeoJSON, building as needed
    Polygons {
        #[structopt(long)]
        osm: String,
        #[structopt(long)]
        storage: PathBuf,
        #[structopt(long)]
        lon: f64,
        #[structopt(long)]
        lat: f64,
        /// Query zoom; anything shallower than --build-zoom aggregates descendant tiles
        #[structopt(long, default_value = "14")]
        zoom: u8,
        #[structopt(long, default_value = "14")]
        build_zoom: u8,
        /// Where to write the GeoJSON
        #[structopt(long)]
        out: PathBuf,
    },
    /// Like polygons, but fuse adjacent blocks down to a target count first
    Merge {
        #[structopt(long)]
        osm: String,
        #[structopt(long)]
        storage: PathBuf,
        #[structopt(long)]
        lon: f64,
        #[structopt(long)]
        lat: f64,
        #[structopt(long, default_value = "14")]
        zoom: u8,
        /// Stop fusing when this many non-boundary polygons remain
        #[structopt(long)]
        target_count: usize,
        #[structopt(long)]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    blockutil::setup();
    let classifier = BarrierClassifier::default_barriers();

    match Command::from_args() {
        Command::Build {
            osm,
            storage,
            lon,
            lat,
            zoom,
        } => {
            let mut timer = Timer::new("build tile");
            let source = OsmFileSource::load(&osm, &mut timer)?;
            let tile = TileId::containing(LonLat::new(lon, lat), zoom);
            let path =
                blockmap::build_for_tile(tile, &storage, &source, &classifier, None, &mut timer)?;
            info!("Wrote {}", path.display());
            timer.done();
        }
        Command::Polygons {
            osm,
            storage,
            lon,
            lat,
            zoom,
            build_zoom,
            out,
        } => {
            let mut timer = Timer::new("query polygons");
            let source = OsmFileSource::load(&osm, &mut timer)?;
            let tile = TileId::containing(LonLat::new(lon, lat), zoom);
            let polygons = blockmap::polygons_for_tile(
                tile,
                &storage,
                &source,
                &classifier,
                None,
                build_zoom,
                &mut timer,
            )?;
            info!("{} polygons in {}", polygons.len(), tile);
            let features: Vec<serde_json::Value> = polygons
                .iter()
                .map(|(ring, guid)| feature(ring, serde_json::json!({ "id": guid.to_string() })))
                .collect();
            write_geojson(&out, features)?;
            timer.done();
        }
        Command::Merge {
            osm,
            storage,
            lon,
            lat,
            zoom,
            target_count,
            out,
        } => {
            let mut timer = Timer::new("merge polygons");
            let source = OsmFileSource::load(&osm, &mut timer)?;
            let tile = TileId::containing(LonLat::new(lon, lat), zoom);
            let path =
                blockmap::build_for_tile(tile, &storage, &source, &classifier, None, &mut timer)?;
            let mut pg = PolygonGraph::new();
            blockmap::io::read_tile(&mut pg, &path)?;

            timer.start("merge");
            let session = MergeSession::new(&pg, &classifier)?;
            let merged = session.merge(target_count, &DefaultCost)?;
            timer.stop("merge");

            let features: Vec<serde_json::Value> = merged
                .iter()
                .map(|p| {
                    feature(
                        &p.ring,
                        serde_json::json!({
                            "id": p.id.0,
                            "class": p.dominant_class(),
                            "tile_edge": p.touches_tile_edge,
                        }),
                    )
                })
                .collect();
            write_geojson(&out, features)?;
            timer.done();
        }
    }
    Ok(())
}

fn feature(ring: &Ring, properties: serde_json::Value) -> serde_json::Value {
    let coords: Vec<Vec<f64>> = ring
        .points()
        .iter()
        .map(|pt| vec![pt.longitude, pt.latitude])
        .collect();
    serde_json::json!({
        "type": "Feature",
        "properties": properties,
        "geometry": {
            "type": "Polygon",
            "coordinates": [coords],
        }
    })
}

fn write_geojson(path: &std::path::Path, features: Vec<serde_json::Value>) -> Result<()> {
    let doc = serde_json::json!({
        "type": "FeatureCollection",
        "features": features,
    });
    fs_err::write(path, serde_json::to_string_pretty(&doc)?)?;
    info!("Wrote {}", path.display());
    Ok(())
}
