use crate::error::{ChunkerError, ChunkerResult};
use crate::format::{ChunkAddress, ChunkFileHeader, VertexRecord, QUANTIZED_HALF_RANGE};
use crate::heightfield::{Heightfield, Level};
use crate::mesh::ChunkMeshBuilder;
use crate::morph::height_at_lod;

use chunklod_core::geometry::Aabb;
use chunklod_core::glam::{IVec2, Vec2};
use chunklod_core::quadtree::EdgeDir;

use std::io::{Seek, SeekFrom, Write};

/// Limit for anything counted with a `u16`.
const MAX_U16_COUNT: usize = 1 << 16;

/// # Chunk Writer
///
/// Streams a CHU file: the header, then one record per chunk in the order they are given.
///
/// Each record's body size is not known until the body is written, so a placeholder is written first and patched with a
/// backward seek afterwards.
pub struct ChunkWriter<W> {
    out: W,
    tree_depth: u32,
    bytes_written: u64,
}

impl<W: Write + Seek> ChunkWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            tree_depth: 0,
            bytes_written: 0,
        }
    }

    pub fn write_header(&mut self, header: &ChunkFileHeader) -> ChunkerResult<()> {
        header.write_to(&mut self.out)?;
        self.tree_depth = u32::from(header.tree_depth);
        self.bytes_written += ChunkFileHeader::SIZE;
        Ok(())
    }

    /// Writes the record for the chunk currently held by `mesh`, returning its size in bytes.
    pub fn write_chunk(
        &mut self,
        hf: &Heightfield,
        address: &ChunkAddress,
        mesh: &ChunkMeshBuilder,
    ) -> ChunkerResult<u64> {
        let level = address.level;
        self.check_counts(level, mesh)?;

        let quantizer = Quantizer::new(mesh.aabb(), hf.sample_spacing());
        let out = &mut self.out;

        let record_start = out.stream_position()?;
        address.write_to(out)?;
        let [min_y, max_y] = mesh.y_range();
        out.write_all(&min_y.to_le_bytes())?;
        out.write_all(&max_y.to_le_bytes())?;

        let size_position = out.stream_position()?;
        out.write_all(&0u32.to_le_bytes())?;

        out.write_all(&(mesh.vertices().len() as u16).to_le_bytes())?;
        for &p in mesh.vertices() {
            quantizer.vertex(hf, level, p)?.write_to(out)?;
        }

        out.write_all(&(mesh.strip().len() as u32).to_le_bytes())?;
        for &i in mesh.strip() {
            out.write_all(&(i as u16).to_le_bytes())?;
        }
        out.write_all(&(mesh.real_triangle_count() as u32).to_le_bytes())?;

        // Hi vertices belong to the finer neighbors, so they morph toward this chunk's level.
        let hi_level = level.saturating_sub(1);
        for dir in EdgeDir::ALL {
            let edge = mesh.edge(dir);
            out.write_all(&(edge.ribbon.len() as u16).to_le_bytes())?;
            for &i in edge.ribbon.iter() {
                out.write_all(&(i as u16).to_le_bytes())?;
            }
            for count in [edge.lo.len(), edge.hi[0].len(), edge.hi[1].len()] {
                out.write_all(&(count as u16).to_le_bytes())?;
            }
            for &p in edge.lo.iter() {
                quantizer.vertex(hf, level, p)?.write_to(out)?;
            }
            for &p in edge.hi.iter().flatten() {
                quantizer.vertex(hf, hi_level, p)?.write_to(out)?;
            }
        }

        let record_end = out.stream_position()?;
        let body_size = record_end - size_position - 4;
        out.seek(SeekFrom::Start(size_position))?;
        out.write_all(&(body_size as u32).to_le_bytes())?;
        out.seek(SeekFrom::Start(record_end))?;

        let record_size = record_end - record_start;
        self.bytes_written += record_size;
        Ok(record_size)
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn finish(mut self) -> ChunkerResult<W> {
        self.out.flush()?;
        Ok(self.out)
    }

    fn check_counts(&self, level: Level, mesh: &ChunkMeshBuilder) -> ChunkerResult<()> {
        let suggested_depth = self.tree_depth + 1;

        let count = mesh.vertices().len();
        if count >= MAX_U16_COUNT {
            return Err(ChunkerError::TooManyVertices {
                level,
                count,
                suggested_depth,
            });
        }

        for dir in EdgeDir::ALL {
            let edge = mesh.edge(dir);
            for (what, count) in [
                ("ribbon indices", edge.ribbon.len()),
                ("vertices", edge.lo.len() + edge.hi_vertex_count()),
            ] {
                if count >= MAX_U16_COUNT {
                    return Err(ChunkerError::EdgeTooLarge {
                        what,
                        level,
                        count,
                        suggested_depth,
                    });
                }
            }
        }

        Ok(())
    }
}

/// Maps grid positions into the chunk's local fixed-point frame. Heights are written as is.
struct Quantizer {
    center: Vec2,
    factor: Vec2,
    sample_spacing: f32,
}

impl Quantizer {
    fn new(aabb: &Aabb, sample_spacing: f32) -> Self {
        let (center, extent) = if aabb.is_empty() {
            (Vec2::ZERO, Vec2::ONE)
        } else {
            let (c, e) = (aabb.center(), aabb.extent());
            (Vec2::new(c.x, c.z), Vec2::new(e.x, e.z))
        };

        Self {
            center,
            factor: Vec2::splat(QUANTIZED_HALF_RANGE) / extent.max(Vec2::ONE),
            sample_spacing,
        }
    }

    fn quantize(&self, p: IVec2) -> [i16; 2] {
        let world = p.as_vec2() * self.sample_spacing;
        let q = ((world - self.center) * self.factor + 0.5).floor();
        [q.x as i16, q.y as i16]
    }

    /// The record for `p` in a mesh of LOD `level`, morphing toward `level + 1`.
    fn vertex(&self, hf: &Heightfield, level: Level, p: IVec2) -> ChunkerResult<VertexRecord> {
        let [x, z] = self.quantize(p);
        let y = hf.height(p);
        let delta = i32::from(height_at_lod(hf, level + 1, p)) - i32::from(y);
        let morph_delta = i16::try_from(delta).map_err(|_| ChunkerError::MorphDeltaOverflow {
            x: p.x,
            z: p.y,
            delta,
        })?;

        Ok(VertexRecord {
            x,
            y,
            z,
            morph_delta,
        })
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝

#[cfg(test)]
mod test {
    use super::*;
    use crate::reader::ChunkFileReader;
    use crate::storage::StorageBackend;

    use std::io::Cursor;

    fn address(level: Level) -> ChunkAddress {
        ChunkAddress {
            label: 0,
            neighbors: [-1; 4],
            level,
            x: 0,
            z: 0,
        }
    }

    fn activate_corners(hf: &mut Heightfield, level: Level) {
        let s = hf.size() - 1;
        for corner in [IVec2::new(s, 0), IVec2::ZERO, IVec2::new(0, s), IVec2::new(s, s)] {
            hf.activate(corner, level);
        }
    }

    #[test]
    fn size_field_matches_body() {
        let mut hf = Heightfield::new(2, 4.0, 1.0, &StorageBackend::Memory).unwrap();
        activate_corners(&mut hf, 0);

        let mut mesh = ChunkMeshBuilder::new();
        mesh.build_chunk(&hf, IVec2::ZERO, 2, 0);

        let mut writer = ChunkWriter::new(Cursor::new(Vec::new()));
        let record_size = writer.write_chunk(&hf, &address(0), &mesh).unwrap();
        let bytes = writer.finish().unwrap().into_inner();
        assert_eq!(bytes.len() as u64, record_size);

        let body_size = u32::from_le_bytes([bytes[29], bytes[30], bytes[31], bytes[32]]) as u64;
        assert_eq!(body_size, record_size - ChunkAddress::PREFIX_SIZE);
        // 4 vertices, a 4-index strip, and the 4 corner-to-corner edges with 2 lo vertices each.
        let expected_body = (2 + 4 * 8) + (4 + 4 * 2) + 4 + 4 * (2 + 6 + 2 * 8);
        assert_eq!(body_size, expected_body);
    }

    #[test]
    fn corners_quantize_to_range_limits() {
        let mut hf = Heightfield::new(2, 4.0, 1.0, &StorageBackend::Memory).unwrap();
        activate_corners(&mut hf, 0);
        let mut mesh = ChunkMeshBuilder::new();
        mesh.build_chunk(&hf, IVec2::ZERO, 2, 0);

        let quantizer = Quantizer::new(mesh.aabb(), hf.sample_spacing());
        assert_eq!(quantizer.quantize(IVec2::ZERO), [-(1 << 14), -(1 << 14)]);
        assert_eq!(quantizer.quantize(IVec2::new(4, 4)), [1 << 14, 1 << 14]);
        assert_eq!(quantizer.quantize(IVec2::new(2, 2)), [0, 0]);
    }

    #[test]
    fn tall_chunks_quantize_like_flat_ones() {
        let mut hf = Heightfield::new(2, 4.0, 1.0, &StorageBackend::Memory).unwrap();
        hf.set_height(IVec2::new(4, 4), 20_000);
        activate_corners(&mut hf, 0);
        let mut mesh = ChunkMeshBuilder::new();
        mesh.build_chunk(&hf, IVec2::ZERO, 2, 0);
        assert_eq!(mesh.y_range(), [0, 20_000]);

        let mut writer = ChunkWriter::new(Cursor::new(Vec::new()));
        writer
            .write_header(&ChunkFileHeader::new(1, 1.0, 1.0, 2, 4.0))
            .unwrap();
        writer.write_chunk(&hf, &address(0), &mesh).unwrap();
        let bytes = writer.finish().unwrap().into_inner();
        let mut reader = ChunkFileReader::new(Cursor::new(bytes)).unwrap();
        let chunk = reader.read_chunk().unwrap().unwrap();
        let tall = chunk.vertices.iter().find(|v| v.y == 20_000).unwrap();
        assert_eq!((tall.x, tall.z), (1 << 14, 1 << 14));
    }

    #[test]
    fn morph_overflow_is_fatal() {
        let mut hf = Heightfield::new(1, 1.0, 1.0, &StorageBackend::Memory).unwrap();
        for z in 0..3 {
            for x in 0..3 {
                hf.set_height(IVec2::new(x, z), 30_000);
            }
        }
        hf.set_height(IVec2::new(1, 1), -30_000);
        activate_corners(&mut hf, 0);
        hf.activate(IVec2::new(1, 1), 0);

        let mut mesh = ChunkMeshBuilder::new();
        mesh.build_chunk(&hf, IVec2::ZERO, 1, 0);

        let mut writer = ChunkWriter::new(Cursor::new(Vec::new()));
        let result = writer.write_chunk(&hf, &address(0), &mesh);
        assert!(matches!(
            result,
            Err(ChunkerError::MorphDeltaOverflow {
                x: 1,
                z: 1,
                delta: 60_000
            })
        ));
    }

    #[test]
    fn oversized_chunk_suggests_deeper_tree() {
        let mut hf = Heightfield::new(8, 1.0, 1.0, &StorageBackend::Memory).unwrap();
        for z in 0..hf.size() {
            for x in 0..hf.size() {
                hf.activate(IVec2::new(x, z), 0);
            }
        }
        let mut mesh = ChunkMeshBuilder::new();
        mesh.build_chunk(&hf, IVec2::ZERO, 8, 0);
        assert_eq!(mesh.vertices().len(), 257 * 257);

        let mut writer = ChunkWriter::new(Cursor::new(Vec::new()));
        writer
            .write_header(&ChunkFileHeader::new(1, 1.0, 1.0, 8, 1.0))
            .unwrap();
        let result = writer.write_chunk(&hf, &address(0), &mesh);
        assert!(matches!(
            result,
            Err(ChunkerError::TooManyVertices {
                count: 66049,
                suggested_depth: 2,
                ..
            })
        ));
    }
}
