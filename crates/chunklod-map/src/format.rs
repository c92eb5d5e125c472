//! Building blocks of the CHU chunk file. Everything is little-endian.
//!
//! ```text
//! header:  "CHU\0" u16:version u16:tree_depth f32:max_error f32:vertical_scale f32:leaf_chunk_size u32:chunk_count
//! chunk:   i32:label i32[4]:neighbors(E,N,W,S) u8:level u16:x u16:z i16:min_y i16:max_y u32:body_size body
//! body:    u16:vertex_count vertex[] u32:index_count u16[] u32:real_triangles edge[4]
//! edge:    u16:ribbon_count u16[] u16:lo_count u16:hi0_count u16:hi1_count vertex[lo] vertex[hi0] vertex[hi1]
//! vertex:  i16:x i16:y i16:z i16:morph_delta
//! ```

use crate::error::{ChunkerError, ChunkerResult};

use chunklod_core::quadtree::chunk_count;

use std::io::{self, Read, Write};

pub const CHUNK_FILE_MAGIC: [u8; 4] = *b"CHU\0";
pub const CHUNK_FILE_VERSION: u16 = 6;

/// Quantized local coordinates span `[-2^14, 2^14]` on each horizontal axis.
pub const QUANTIZED_HALF_RANGE: f32 = (1 << 14) as f32;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChunkFileHeader {
    pub tree_depth: u16,
    pub base_max_error: f32,
    /// Meters per quantized height unit.
    pub vertical_scale: f32,
    /// Edge length of the highest-detail chunks, in meters.
    pub leaf_chunk_size: f32,
    pub chunk_count: u32,
}

impl ChunkFileHeader {
    pub const SIZE: u64 = 24;

    pub fn new(
        tree_depth: u32,
        base_max_error: f32,
        vertical_scale: f32,
        log_size: u32,
        sample_spacing: f32,
    ) -> Self {
        debug_assert!(tree_depth >= 1 && tree_depth <= log_size);
        Self {
            tree_depth: tree_depth as u16,
            base_max_error,
            vertical_scale,
            leaf_chunk_size: (1u32 << (log_size - (tree_depth - 1))) as f32 * sample_spacing,
            chunk_count: chunk_count(tree_depth),
        }
    }

    pub fn write_to(&self, out: &mut impl Write) -> io::Result<()> {
        out.write_all(&CHUNK_FILE_MAGIC)?;
        out.write_all(&CHUNK_FILE_VERSION.to_le_bytes())?;
        out.write_all(&self.tree_depth.to_le_bytes())?;
        out.write_all(&self.base_max_error.to_le_bytes())?;
        out.write_all(&self.vertical_scale.to_le_bytes())?;
        out.write_all(&self.leaf_chunk_size.to_le_bytes())?;
        out.write_all(&self.chunk_count.to_le_bytes())?;
        Ok(())
    }

    pub fn read_from(input: &mut impl Read) -> ChunkerResult<Self> {
        let magic: [u8; 4] = read_bytes(input)?;
        if magic != CHUNK_FILE_MAGIC {
            return Err(ChunkerError::MalformedChunkFile(format!(
                "bad magic {:?}",
                magic
            )));
        }
        let version = read_u16(input)?;
        if version != CHUNK_FILE_VERSION {
            return Err(ChunkerError::MalformedChunkFile(format!(
                "unsupported version {}",
                version
            )));
        }

        Ok(Self {
            tree_depth: read_u16(input)?,
            base_max_error: read_f32(input)?,
            vertical_scale: read_f32(input)?,
            leaf_chunk_size: read_f32(input)?,
            chunk_count: read_u32(input)?,
        })
    }
}

/// Where a chunk sits in the quadtree and who its neighbors are.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ChunkAddress {
    /// Breadth-first node index of the chunk, or -1.
    pub label: i32,
    /// Labels of the same-level chunks to the east, north, west and south, or -1 off the grid.
    pub neighbors: [i32; 4],
    pub level: u8,
    /// Chunk coordinates in units of the chunk's edge length.
    pub x: u16,
    pub z: u16,
}

impl ChunkAddress {
    /// Bytes occupied by the address and the `min_y`, `max_y` and `body_size` fields that follow it.
    pub const PREFIX_SIZE: u64 = 4 + 16 + 1 + 2 + 2 + 2 + 2 + 4;

    pub fn write_to(&self, out: &mut impl Write) -> io::Result<()> {
        out.write_all(&self.label.to_le_bytes())?;
        for n in self.neighbors {
            out.write_all(&n.to_le_bytes())?;
        }
        out.write_all(&[self.level])?;
        out.write_all(&self.x.to_le_bytes())?;
        out.write_all(&self.z.to_le_bytes())
    }

    pub fn read_from(input: &mut impl Read) -> io::Result<Self> {
        let label = read_i32(input)?;
        let mut neighbors = [0; 4];
        for n in neighbors.iter_mut() {
            *n = read_i32(input)?;
        }
        let [level] = read_bytes::<1>(input)?;

        Ok(Self {
            label,
            neighbors,
            level,
            x: read_u16(input)?,
            z: read_u16(input)?,
        })
    }
}

/// One quantized vertex. `y` is the raw quantized height.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct VertexRecord {
    pub x: i16,
    pub y: i16,
    pub z: i16,
    /// Height of the next coarser LOD at this point minus `y`.
    pub morph_delta: i16,
}

impl VertexRecord {
    pub const SIZE: u64 = 8;

    pub fn write_to(&self, out: &mut impl Write) -> io::Result<()> {
        for v in [self.x, self.y, self.z, self.morph_delta] {
            out.write_all(&v.to_le_bytes())?;
        }
        Ok(())
    }

    pub fn read_from(input: &mut impl Read) -> io::Result<Self> {
        Ok(Self {
            x: read_i16(input)?,
            y: read_i16(input)?,
            z: read_i16(input)?,
            morph_delta: read_i16(input)?,
        })
    }
}

pub(crate) fn read_bytes<const N: usize>(input: &mut impl Read) -> io::Result<[u8; N]> {
    let mut buf = [0; N];
    input.read_exact(&mut buf)?;
    Ok(buf)
}

pub(crate) fn read_u16(input: &mut impl Read) -> io::Result<u16> {
    read_bytes(input).map(u16::from_le_bytes)
}

pub(crate) fn read_i16(input: &mut impl Read) -> io::Result<i16> {
    read_bytes(input).map(i16::from_le_bytes)
}

pub(crate) fn read_u32(input: &mut impl Read) -> io::Result<u32> {
    read_bytes(input).map(u32::from_le_bytes)
}

pub(crate) fn read_i32(input: &mut impl Read) -> io::Result<i32> {
    read_bytes(input).map(i32::from_le_bytes)
}

pub(crate) fn read_f32(input: &mut impl Read) -> io::Result<f32> {
    read_bytes(input).map(f32::from_le_bytes)
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
