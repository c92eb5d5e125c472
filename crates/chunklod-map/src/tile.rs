use chunklod_core::static_assertions::const_assert_eq;

use bytemuck::{cast_slice, cast_slice_mut, Pod};
use lz4_flex::frame::{FrameDecoder, FrameEncoder};
use ndshape::{ConstPow2Shape2u32, ConstShape};
use std::io::{self, Read};

/// The 2D array shape of a tile, the unit of paging and compression.
pub type TileShape = ConstPow2Shape2u32<6, 6>;
const_assert_eq!(TileShape::SIZE, 64 * 64);
pub const TILE_SIZE: usize = TileShape::SIZE as usize;
pub const TILE_EDGE_LOG2: u32 = 6;
pub const TILE_EDGE_MASK: u32 = (1 << TILE_EDGE_LOG2) - 1;

/// A square block of samples.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Tile<T> {
    values: Box<[T]>,
}

impl<T: Pod> Tile<T> {
    /// A tile where every sample has the "ambient value."
    pub fn filled(ambient: T) -> Self {
        Self {
            values: vec![ambient; TILE_SIZE].into_boxed_slice(),
        }
    }

    #[inline]
    pub fn get(&self, local: [u32; 2]) -> T {
        self.values[TileShape::linearize(local) as usize]
    }

    #[inline]
    pub fn set(&mut self, local: [u32; 2], value: T) {
        self.values[TileShape::linearize(local) as usize] = value;
    }

    pub fn compress(&self) -> io::Result<CompressedTile> {
        let mut encoder = FrameEncoder::new(Vec::new());
        let mut reader: &[u8] = cast_slice(&self.values[..]);
        io::copy(&mut reader, &mut encoder)?;
        let bytes = encoder.finish().map_err(io::Error::from)?;
        Ok(CompressedTile {
            bytes: bytes.into_boxed_slice(),
        })
    }

    pub fn from_compressed_bytes(bytes: &[u8]) -> io::Result<Self> {
        let mut tile = Self::filled(T::zeroed());
        let mut decoder = FrameDecoder::new(bytes);
        decoder.read_exact(cast_slice_mut(&mut tile.values[..]))?;
        Ok(tile)
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CompressedTile {
    pub bytes: Box<[u8]>,
}

impl CompressedTile {
    pub fn decompress<T: Pod>(&self) -> io::Result<Tile<T>> {
        Tile::from_compressed_bytes(&self.bytes)
    }
}

/// Splits a sample coordinate into the coordinates of its tile and its offset within that tile.
#[inline]
pub fn split_tile_coords(x: u32, z: u32) -> ([u32; 2], [u32; 2]) {
    (
        [x >> TILE_EDGE_LOG2, z >> TILE_EDGE_LOG2],
        [x & TILE_EDGE_MASK, z & TILE_EDGE_MASK],
    )
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

    use std::mem;

    #[test]
    fn compress_ambient_tile() {
        let tile = Tile::filled(0xFFu8);
        let compressed = tile.compress().unwrap();
        let compression_ratio = compressed.bytes.len() as f32 / (TILE_SIZE as f32);
        assert!(compression_ratio < 0.05, "{}", compression_ratio);
        assert_eq!(compressed.decompress::<u8>().unwrap(), tile);
    }

    #[test]
    fn compress_tile_with_slope() {
        let mut tile = Tile::filled(0i16);
        for z in 0..64 {
            for x in 0..64 {
                tile.set([x, z], (x * 3 + z * 5) as i16);
            }
        }

        let compressed = tile.compress().unwrap();
        let compression_ratio =
            compressed.bytes.len() as f32 / ((TILE_SIZE * mem::size_of::<i16>()) as f32);
        assert!(compression_ratio < 1.01, "{}", compression_ratio);

        let decompressed = compressed.decompress::<i16>().unwrap();
        assert_eq!(decompressed.get([10, 20]), 130);
        assert_eq!(decompressed, tile);
    }

    #[test]
    fn truncated_bytes_fail_to_decompress() {
        let compressed = Tile::filled(7i16).compress().unwrap();
        let truncated = &compressed.bytes[..compressed.bytes.len() / 2];
        assert!(Tile::<i16>::from_compressed_bytes(truncated).is_err());
    }

    #[test]
    fn split_coords() {
        assert_eq!(split_tile_coords(65, 3), ([1, 0], [1, 3]));
        assert_eq!(split_tile_coords(63, 128), ([0, 2], [63, 0]));
    }
}
