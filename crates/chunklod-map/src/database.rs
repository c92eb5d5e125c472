use crate::error::{ChunkerError, ChunkerResult};
use crate::tile::{Tile, TILE_EDGE_LOG2};

use bytemuck::{bytes_of, pod_read_unaligned, Pod, Zeroable};
use sled::{Batch, Tree};
use std::mem;

const META_KEY: &str = "META";

/// Identifies one tile of a paged grid.
///
/// Ordered row-major so that [`sled`] iterates tiles the same way the grid is laid out.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct TileKey {
    pub z: u32,
    pub x: u32,
}

impl TileKey {
    pub fn new([x, z]: [u32; 2]) -> Self {
        Self { z, x }
    }

    /// Big-endian so the byte order matches the [`Ord`] impl.
    pub fn into_sled_key(self) -> [u8; 8] {
        let mut bytes = [0; 8];
        bytes[..4].copy_from_slice(&self.z.to_be_bytes());
        bytes[4..].copy_from_slice(&self.x.to_be_bytes());
        bytes
    }

    pub fn from_sled_key(bytes: &[u8]) -> Self {
        let mut z = [0; 4];
        let mut x = [0; 4];
        z.copy_from_slice(&bytes[..4]);
        x.copy_from_slice(&bytes[4..8]);
        Self {
            z: u32::from_be_bytes(z),
            x: u32::from_be_bytes(x),
        }
    }
}

/// Describes the grid stored in a [`TileDb`]; written once on creation and checked on reopen.
#[repr(C)]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Pod, Zeroable)]
pub struct GridMeta {
    pub width: u32,
    pub height: u32,
    pub sample_bytes: u32,
    pub tile_edge_log2: u32,
}

impl GridMeta {
    pub fn new<T>(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            sample_bytes: mem::size_of::<T>() as u32,
            tile_edge_log2: TILE_EDGE_LOG2,
        }
    }
}

/// The on-disk half of a paged grid: one [`sled::Tree`] of LZ4-compressed tiles and one small metadata tree.
///
/// Tiles that were never written are absent from the tree; readers substitute an "ambient value" for them.
pub struct TileDb {
    tiles: Tree,
    meta_tree: Tree,
    meta: GridMeta,
}

impl TileDb {
    /// Creates (or truncates) the trees for grid `name`.
    pub fn create(db: &sled::Db, name: &str, meta: GridMeta) -> ChunkerResult<Self> {
        let tiles = db.open_tree(format!("{}-tiles", name))?;
        let meta_tree = db.open_tree(format!("{}-meta", name))?;
        tiles.clear()?;
        meta_tree.insert(META_KEY, bytes_of(&meta))?;
        log::debug!("Created tile tree {} for {:?}", name, meta);

        Ok(Self {
            tiles,
            meta_tree,
            meta,
        })
    }

    /// Opens the trees for a grid previously made with [`TileDb::create`].
    pub fn open(db: &sled::Db, name: &str) -> ChunkerResult<Self> {
        let tiles = db.open_tree(format!("{}-tiles", name))?;
        let meta_tree = db.open_tree(format!("{}-meta", name))?;
        let meta = match meta_tree.get(META_KEY)? {
            Some(bytes) if bytes.len() == mem::size_of::<GridMeta>() => {
                pod_read_unaligned::<GridMeta>(&bytes)
            }
            _ => {
                return Err(ChunkerError::InvalidConfig(format!(
                    "paged grid {} has no valid metadata",
                    name
                )))
            }
        };

        Ok(Self {
            tiles,
            meta_tree,
            meta,
        })
    }

    pub fn meta(&self) -> &GridMeta {
        &self.meta
    }

    pub fn read_tile<T: Pod>(&self, key: TileKey) -> ChunkerResult<Option<Tile<T>>> {
        match self.tiles.get(key.into_sled_key())? {
            Some(bytes) => Ok(Some(Tile::from_compressed_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Compresses and writes all `tiles` in a single batch.
    pub fn write_tiles<'a, T: Pod>(
        &self,
        tiles: impl IntoIterator<Item = (TileKey, &'a Tile<T>)>,
    ) -> ChunkerResult<usize> {
        let mut batch = Batch::default();
        let mut num_written = 0;
        for (key, tile) in tiles {
            let compressed = tile.compress()?;
            batch.insert(&key.into_sled_key()[..], &*compressed.bytes);
            num_written += 1;
        }
        if num_written > 0 {
            self.tiles.apply_batch(batch)?;
        }
        Ok(num_written)
    }

    pub fn stored_tile_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn flush(&self) -> ChunkerResult<()> {
        self.tiles.flush()?;
        self.meta_tree.flush()?;
        Ok(())
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
