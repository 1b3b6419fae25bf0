//! The binary tile artifact: vertices, edges, faces, keyed entirely by content identifiers.
//! This layout is the contract between the build and read paths; incremental rebuilds only make
//! sense while it stays stable.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use geom::{QuantizedPt, TileId};

use crate::barrier::BarrierGraph;
use crate::faces::{face_ring, is_interior};
use crate::graph::{EdgeID, FaceID, Side};
use crate::guid::{edge_guid, face_guid, vertex_guid, Guid};
use crate::osm::Tags;
use crate::polygon_graph::{PolyEdgeData, PolyFaceData, PolygonGraph};

const MAGIC: &[u8; 4] = b"BGRF";
const FORMAT_VERSION: u8 = 1;

/// Serializes one tile's slice of the graph: every edge touching the tile, every face with a
/// boundary there, and all vertices those need. Output ordering is by identifier, so the same
/// geometry always produces byte-identical artifacts.
pub fn write_tile(g: &BarrierGraph, tile: TileId, path: &Path) -> Result<()> {
    // Edges touching the tile, plus whatever the selected faces' boundaries need so nothing in
    // the artifact dangles.
    let mut edges: BTreeSet<EdgeID> = g
        .graph
        .edge_ids()
        .filter(|id| {
            let e = g.graph.edge(*id);
            g.quantize(*g.graph.vertex(e.v1)).tile == tile
                || g.quantize(*g.graph.vertex(e.v2)).tile == tile
        })
        .collect();
    let faces: Vec<FaceID> = g
        .graph
        .face_ids()
        .filter(|f| is_interior(g, *f))
        .filter(|f| {
            g.graph
                .face_boundary(*f)
                .iter()
                .any(|(e, _)| edges.contains(e))
        })
        .collect();
    for f in &faces {
        for (e, _) in g.graph.face_boundary(*f) {
            edges.insert(e);
        }
    }

    let mut vertices: BTreeMap<Guid, QuantizedPt> = BTreeMap::new();
    for id in &edges {
        let e = g.graph.edge(*id);
        for v in [e.v1, e.v2] {
            let q = g.quantize(*g.graph.vertex(v));
            vertices.insert(vertex_guid(q), q);
        }
    }

    let mut file = BufWriter::new(fs_err::File::create(path)?);
    file.write_all(MAGIC)?;
    file.write_u8(FORMAT_VERSION)?;

    // Vertices
    for (guid, q) in &vertices {
        write_guid(&mut file, *guid)?;
        write_quantized(&mut file, *q)?;
    }
    write_guid(&mut file, Guid::EMPTY)?;

    // Edges, grouped by origin vertex, forward direction only
    let mut by_origin: BTreeMap<Guid, BTreeMap<Guid, EdgeID>> = BTreeMap::new();
    for id in &edges {
        let e = g.graph.edge(*id);
        let origin = vertex_guid(g.quantize(*g.graph.vertex(e.v1)));
        let guid = edge_guid(&g.edge_quantized(*id));
        by_origin.entry(origin).or_default().insert(guid, *id);
    }
    for (origin, group) in &by_origin {
        write_guid(&mut file, *origin)?;
        for (guid, id) in group {
            let e = g.graph.edge(*id);
            write_guid(&mut file, *guid)?;
            write_guid(&mut file, vertex_guid(g.quantize(*g.graph.vertex(e.v2))))?;
            let shape: Vec<QuantizedPt> =
                e.data.shape.iter().map(|pt| g.quantize(*pt)).collect();
            write_count(&mut file, shape.len(), "shape points")?;
            for q in shape {
                write_quantized(&mut file, q)?;
            }
            write_count(&mut file, e.data.tags.len(), "tags")?;
            for (k, v) in &e.data.tags {
                write_string(&mut file, k)?;
                write_string(&mut file, v)?;
            }
        }
        write_guid(&mut file, Guid::EMPTY)?;
    }
    write_guid(&mut file, Guid::EMPTY)?;

    // Faces
    let mut face_records: BTreeMap<Guid, FaceID> = BTreeMap::new();
    for f in faces {
        if let Some(ring) = face_ring(g, f) {
            let pts = ring.points();
            let quantized: Vec<QuantizedPt> = pts[..pts.len() - 1]
                .iter()
                .map(|pt| g.quantize(*pt))
                .collect();
            face_records.insert(face_guid(&quantized), f);
        }
    }
    for (guid, f) in &face_records {
        write_guid(&mut file, *guid)?;
        let boundary = g.graph.face_boundary(*f);
        write_count(&mut file, boundary.len(), "boundary edges")?;
        for (e, side) in boundary {
            write_guid(&mut file, edge_guid(&g.edge_quantized(e)))?;
            file.write_u8(if side == Side::Right { 1 } else { 0 })?;
        }
        let landuse = &g.graph.face(*f).data.landuse;
        write_count(&mut file, landuse.len(), "landuse entries")?;
        for (label, percent) in landuse {
            write_string(&mut file, label)?;
            file.write_f64::<LittleEndian>(*percent)?;
        }
    }
    write_guid(&mut file, Guid::EMPTY)?;

    file.flush()?;
    Ok(())
}

/// Merges one artifact into the graph. Vertices, edges, and faces already present by identifier
/// are skipped; that's the whole trick to stitching adjacent tiles together. A missing file
/// reads as an empty tile.
pub fn read_tile(pg: &mut PolygonGraph, path: &Path) -> Result<()> {
    if !path.exists() {
        warn!("No artifact at {}, reading it as empty", path.display());
        return Ok(());
    }
    let mut file = BufReader::new(fs_err::File::open(path)?);
    let mut magic = [0u8; 4];
    file.read_exact(&mut magic)?;
    if &magic != MAGIC {
        bail!("{} isn't a tile graph artifact", path.display());
    }
    let version = file.read_u8()?;
    if version != FORMAT_VERSION {
        bail!(
            "{} has format version {}, expected {}",
            path.display(),
            version,
            FORMAT_VERSION
        );
    }

    // Vertices
    loop {
        let guid = read_guid(&mut file)?;
        if guid.is_empty() {
            break;
        }
        let q = read_quantized(&mut file)?;
        pg.ensure_vertex(guid, q);
    }

    // Edges
    loop {
        let origin = read_guid(&mut file)?;
        if origin.is_empty() {
            break;
        }
        let v1 = pg
            .vertex_for(origin)
            .with_context(|| format!("Edge group references unknown vertex {}", origin))?;
        loop {
            let guid = read_guid(&mut file)?;
            if guid.is_empty() {
                break;
            }
            let dest = read_guid(&mut file)?;
            let v2 = pg
                .vertex_for(dest)
                .with_context(|| format!("Edge {} references unknown vertex {}", guid, dest))?;
            let num_shape = file.read_u16::<LittleEndian>()?;
            let mut shape = Vec::with_capacity(num_shape as usize);
            for _ in 0..num_shape {
                shape.push(read_quantized(&mut file)?);
            }
            let num_tags = file.read_u16::<LittleEndian>()?;
            let mut tags = Tags::new();
            for _ in 0..num_tags {
                let k = read_string(&mut file)?;
                let v = read_string(&mut file)?;
                tags.insert(k, v);
            }
            pg.ensure_edge(guid, v1, v2, PolyEdgeData { shape, tags });
        }
    }

    // Faces
    loop {
        let guid = read_guid(&mut file)?;
        if guid.is_empty() {
            break;
        }
        let num_boundary = file.read_u16::<LittleEndian>()?;
        let mut boundary = Vec::with_capacity(num_boundary as usize);
        for _ in 0..num_boundary {
            let edge = read_guid(&mut file)?;
            let forward = file.read_u8()? == 1;
            let e = pg
                .edge_for(edge)
                .with_context(|| format!("Face {} references unknown edge {}", guid, edge))?;
            boundary.push((e, forward));
        }
        let num_landuse = file.read_u16::<LittleEndian>()?;
        let mut landuse = Vec::with_capacity(num_landuse as usize);
        for _ in 0..num_landuse {
            let label = read_string(&mut file)?;
            let percent = file.read_f64::<LittleEndian>()?;
            landuse.push((label, percent));
        }
        if !pg.has_face(guid) {
            pg.add_face(PolyFaceData {
                guid,
                boundary,
                landuse,
            });
        }
    }

    Ok(())
}

fn write_guid<W: Write>(w: &mut W, guid: Guid) -> Result<()> {
    w.write_all(&guid.0)?;
    Ok(())
}

fn read_guid<R: Read>(r: &mut R) -> Result<Guid> {
    let mut buf = [0u8; 16];
    r.read_exact(&mut buf)?;
    Ok(Guid(buf))
}

fn write_quantized<W: Write>(w: &mut W, q: QuantizedPt) -> Result<()> {
    w.write_u64::<LittleEndian>(q.tile.encode())?;
    w.write_u16::<LittleEndian>(q.x)?;
    w.write_u16::<LittleEndian>(q.y)?;
    Ok(())
}

fn read_quantized<R: Read>(r: &mut R) -> Result<QuantizedPt> {
    let tile = TileId::decode(r.read_u64::<LittleEndian>()?);
    let x = r.read_u16::<LittleEndian>()?;
    let y = r.read_u16::<LittleEndian>()?;
    Ok(QuantizedPt { tile, x, y })
}

/// All counts in the format are u16; anything bigger is a corrupt input, not something to
/// silently truncate.
fn write_count<W: Write>(w: &mut W, len: usize, what: &str) -> Result<()> {
    match u16::try_from(len) {
        Ok(n) => {
            w.write_u16::<LittleEndian>(n)?;
            Ok(())
        }
        Err(_) => bail!("{} {} don't fit the artifact's u16 counts", len, what),
    }
}

fn write_string<W: Write>(w: &mut W, s: &str) -> Result<()> {
    let bytes = s.as_bytes();
    write_count(w, bytes.len(), "string bytes")?;
    w.write_all(bytes)?;
    Ok(())
}

fn read_string<R: Read>(r: &mut R) -> Result<String> {
    let len = r.read_u16::<LittleEndian>()?;
    let mut buf = vec![0u8; len as usize];
    r.read_exact(&mut buf)?;
    Ok(String::from_utf8(buf)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::barrier::EdgeData;
    use geom::LonLat;

    #[test]
    fn oversized_tag_value_fails_instead_of_truncating() {
        let mut g = BarrierGraph::new(14);
        let v1 = g.graph.add_vertex(LonLat::new(13.410, 52.510));
        let v2 = g.graph.add_vertex(LonLat::new(13.412, 52.510));
        let mut tags = Tags::new();
        tags.insert("note".to_string(), "x".repeat(70_000));
        g.graph.add_edge(v1, v2, EdgeData { shape: Vec::new(), tags });

        let tile = TileId::containing(LonLat::new(13.410, 52.510), 14);
        let path = std::env::temp_dir().join(format!(
            "blockmap-io-overflow-{}.tile.graph",
            std::process::id()
        ));
        assert!(write_tile(&g, tile, &path).is_err());
        let _ = fs_err::remove_file(&path);
    }
}
