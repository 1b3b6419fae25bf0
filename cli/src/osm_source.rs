//! A tile source backed by one local OSM XML extract, parsed once up front. Fetching a tile
//! returns every way with at least one node there, along with all of the way's nodes, which is
//! the same shape of answer a real tile server gives.

use std::collections::{HashMap, HashSet};
use std::io::BufReader;

use anyhow::Result;

use blockmap::{NodeID, RawFeature, Tags, TileFetcher, WayID};
use blockutil::{prettyprint_usize, Timer};
use geom::{LonLat, TileId};

pub struct OsmFileSource {
    nodes: HashMap<NodeID, LonLat>,
    ways: Vec<(WayID, Vec<NodeID>, Tags)>,
}

impl OsmFileSource {
    pub fn load(path: &str, timer: &mut Timer) -> Result<OsmFileSource> {
        timer.start(&format!("parse {}", path));
        let reader = BufReader::new(fs_err::File::open(path)?);
        let doc = osm_xml::OSM::parse(reader)
            .map_err(|err| anyhow::anyhow!("parsing {} failed: {:?}", path, err))?;
        info!(
            "{} has {} nodes and {} ways",
            path,
            prettyprint_usize(doc.nodes.len()),
            prettyprint_usize(doc.ways.len())
        );

        let mut nodes = HashMap::new();
        for node in doc.nodes.values() {
            nodes.insert(NodeID(node.id), LonLat::new(node.lon, node.lat));
        }

        let mut ways = Vec::new();
        for way in doc.ways.values() {
            let mut ids = Vec::with_capacity(way.nodes.len());
            let mut valid = true;
            for node_ref in &way.nodes {
                match doc.resolve_reference(node_ref) {
                    osm_xml::Reference::Node(node) => {
                        ids.push(NodeID(node.id));
                    }
                    // Nested ways and relations don't describe barriers
                    _ => {
                        valid = false;
                    }
                }
            }
            if !valid || ids.len() < 2 {
                continue;
            }
            let mut tags = Tags::new();
            for tag in &way.tags {
                tags.insert(tag.key.clone(), tag.val.clone());
            }
            ways.push((WayID(way.id), ids, tags));
        }
        // The source order of an XML extract isn't stable; the pipeline's output shouldn't
        // depend on it.
        ways.sort_by_key(|(id, _, _)| id.0);
        timer.stop(&format!("parse {}", path));

        Ok(OsmFileSource { nodes, ways })
    }
}

impl TileFetcher for OsmFileSource {
    fn fetch_tile(&self, tile: TileId) -> Result<Vec<RawFeature>> {
        let mut features = Vec::new();
        let mut sent: HashSet<NodeID> = HashSet::new();
        for (id, node_ids, tags) in &self.ways {
            let touches = node_ids.iter().any(|n| {
                self.nodes
                    .get(n)
                    .map(|pt| TileId::containing(*pt, tile.z) == tile)
                    .unwrap_or(false)
            });
            if !touches {
                continue;
            }
            for n in node_ids {
                if let Some(pt) = self.nodes.get(n) {
                    if sent.insert(*n) {
                        features.push(RawFeature::Point { id: *n, pt: *pt });
                    }
                }
            }
            features.push(RawFeature::Line {
                id: *id,
                nodes: node_ids.clone(),
                tags: tags.clone(),
            });
        }
        Ok(features)
    }
}
