//! Annotates interior faces with the land-use classes overlapping them, as a percentage of each
//! face's area. The classes come from an external source (usually OSM landuse/leisure polygons);
//! this module only does the overlay arithmetic.

use anyhow::Result;
use geo::{Area, BooleanOps};

use geom::GPSBounds;

use crate::barrier::BarrierGraph;
use crate::faces::{face_ring, is_interior};

/// Supplies land-use polygons covering a bounding box. Labels are free-form; whatever the source
/// calls a class is what the faces get annotated with.
pub trait LanduseSource {
    fn get_landuse(&self, bounds: &GPSBounds) -> Result<Vec<(geo::Polygon<f64>, String)>>;
}

/// Intersects every interior face against the source's polygons and stores, per face, the list of
/// (label, percent of face area covered). Faces a source polygon misses entirely get no entry for
/// that label; a face nothing covers ends up with an empty list.
pub fn attach_landuse(g: &mut BarrierGraph, source: &dyn LanduseSource) -> Result<()> {
    let mut bounds = GPSBounds::new();
    for v in g.graph.vertex_ids() {
        bounds.update(*g.graph.vertex(v));
    }
    if bounds.is_empty() {
        return Ok(());
    }
    let areas = source.get_landuse(&bounds)?;
    info!("Overlaying {} land-use polygons", areas.len());

    for f in g.graph.face_ids().collect::<Vec<_>>() {
        if !is_interior(g, f) {
            continue;
        }
        let ring = match face_ring(g, f) {
            Some(ring) => ring,
            None => {
                continue;
            }
        };
        let face_poly = ring.to_geo();
        let face_area = face_poly.unsigned_area();
        if face_area == 0.0 {
            continue;
        }
        let mut result: Vec<(String, f64)> = Vec::new();
        for (poly, label) in &areas {
            let overlap = face_poly.intersection(poly).unsigned_area();
            if overlap > 0.0 {
                result.push((label.clone(), 100.0 * overlap / face_area));
            }
        }
        // Dominant class first, then alphabetical so equal percentages stay deterministic
        result.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        g.graph.face_data_mut(f).landuse = result;
    }
    Ok(())
}
