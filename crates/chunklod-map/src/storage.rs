use crate::database::{GridMeta, TileDb, TileKey};
use crate::error::{ChunkerError, ChunkerResult};
use crate::tile::{split_tile_coords, Tile};

use chunklod_core::SmallKeyHashMap;

use bytemuck::Pod;
use itertools::Itertools;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where sample grids live while the chunker runs.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub enum StorageConfig {
    /// Flat arrays in RAM.
    Memory,
    /// Tiles paged between a bounded cache and a [`sled`] database at `path`.
    Paged {
        path: PathBuf,
        max_cached_tiles: usize,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Memory
    }
}

/// An opened [`StorageConfig`], able to create grids.
#[derive(Clone)]
pub enum StorageBackend {
    Memory,
    Paged { db: sled::Db, max_cached_tiles: usize },
}

impl StorageBackend {
    pub fn open(config: &StorageConfig) -> ChunkerResult<Self> {
        match config {
            StorageConfig::Memory => Ok(Self::Memory),
            StorageConfig::Paged {
                path,
                max_cached_tiles,
            } => {
                log::info!("Paging sample grids to {}", path.display());
                Ok(Self::Paged {
                    db: sled::open(path)?,
                    max_cached_tiles: *max_cached_tiles,
                })
            }
        }
    }

    /// A paged backend whose database is deleted on drop.
    pub fn temporary_paged(max_cached_tiles: usize) -> ChunkerResult<Self> {
        Ok(Self::Paged {
            db: sled::Config::default().temporary(true).open()?,
            max_cached_tiles,
        })
    }

    pub fn create_grid<T: Pod>(
        &self,
        name: &str,
        width: u32,
        height: u32,
        ambient: T,
    ) -> ChunkerResult<SampleStorage<T>> {
        match self {
            Self::Memory => Ok(SampleStorage::Memory(MemoryGrid::new(width, height, ambient))),
            Self::Paged {
                db,
                max_cached_tiles,
            } => Ok(SampleStorage::Paged(PagedGrid::create(
                db,
                name,
                width,
                height,
                ambient,
                *max_cached_tiles,
            )?)),
        }
    }
}

/// A 2D grid of samples addressed by `(x, z)`, with O(1) amortized random access.
///
/// Accessors are infallible. Failures in the paged backend are deferred until [`SampleStorage::check`].
pub enum SampleStorage<T> {
    Memory(MemoryGrid<T>),
    Paged(PagedGrid<T>),
}

impl<T: Pod> SampleStorage<T> {
    pub fn width(&self) -> u32 {
        match self {
            Self::Memory(g) => g.width,
            Self::Paged(g) => g.width,
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            Self::Memory(g) => g.height,
            Self::Paged(g) => g.height,
        }
    }

    #[inline]
    pub fn get(&self, x: u32, z: u32) -> T {
        debug_assert!(x < self.width() && z < self.height());
        match self {
            Self::Memory(g) => g.get(x, z),
            Self::Paged(g) => g.get(x, z),
        }
    }

    #[inline]
    pub fn set(&mut self, x: u32, z: u32, value: T) {
        debug_assert!(x < self.width() && z < self.height());
        match self {
            Self::Memory(g) => g.set(x, z, value),
            Self::Paged(g) => g.set(x, z, value),
        }
    }

    /// Returns the first storage error encountered since the last check.
    pub fn check(&self) -> ChunkerResult<()> {
        match self {
            Self::Memory(_) => Ok(()),
            Self::Paged(g) => g.check(),
        }
    }

    pub fn flush(&mut self) -> ChunkerResult<()> {
        match self {
            Self::Memory(_) => Ok(()),
            Self::Paged(g) => g.flush(),
        }
    }
}

pub struct MemoryGrid<T> {
    width: u32,
    height: u32,
    values: Vec<T>,
}

impl<T: Pod> MemoryGrid<T> {
    pub fn new(width: u32, height: u32, ambient: T) -> Self {
        Self {
            width,
            height,
            values: vec![ambient; width as usize * height as usize],
        }
    }

    #[inline]
    fn linearize(&self, x: u32, z: u32) -> usize {
        z as usize * self.width as usize + x as usize
    }

    #[inline]
    pub fn get(&self, x: u32, z: u32) -> T {
        self.values[self.linearize(x, z)]
    }

    #[inline]
    pub fn set(&mut self, x: u32, z: u32, value: T) {
        let i = self.linearize(x, z);
        self.values[i] = value;
    }
}

/// A grid split into tiles stored in a [`TileDb`], with a bounded LRU cache of decompressed tiles.
///
/// Reads take `&self`, so the cache sits behind a [`Mutex`].
pub struct PagedGrid<T> {
    db: TileDb,
    width: u32,
    height: u32,
    ambient: T,
    cache: Mutex<TileCache<T>>,
}

impl<T: Pod> PagedGrid<T> {
    pub fn create(
        db: &sled::Db,
        name: &str,
        width: u32,
        height: u32,
        ambient: T,
        max_cached_tiles: usize,
    ) -> ChunkerResult<Self> {
        let db = TileDb::create(db, name, GridMeta::new::<T>(width, height))?;
        Ok(Self::with_tile_db(db, ambient, max_cached_tiles))
    }

    pub fn open(
        db: &sled::Db,
        name: &str,
        ambient: T,
        max_cached_tiles: usize,
    ) -> ChunkerResult<Self> {
        let db = TileDb::open(db, name)?;
        if *db.meta() != GridMeta::new::<T>(db.meta().width, db.meta().height) {
            return Err(ChunkerError::InvalidConfig(format!(
                "paged grid {} was created with a different sample type or tile shape",
                name
            )));
        }
        Ok(Self::with_tile_db(db, ambient, max_cached_tiles))
    }

    fn with_tile_db(db: TileDb, ambient: T, max_cached_tiles: usize) -> Self {
        let GridMeta { width, height, .. } = *db.meta();
        Self {
            db,
            width,
            height,
            ambient,
            cache: Mutex::new(TileCache::new(max_cached_tiles.max(1))),
        }
    }

    pub fn get(&self, x: u32, z: u32) -> T {
        let (tile, local) = split_tile_coords(x, z);
        let mut cache = self.cache.lock();
        cache
            .touch(&self.db, TileKey::new(tile), self.ambient)
            .tile
            .get(local)
    }

    pub fn set(&mut self, x: u32, z: u32, value: T) {
        let (tile, local) = split_tile_coords(x, z);
        let cached = self
            .cache
            .get_mut()
            .touch(&self.db, TileKey::new(tile), self.ambient);
        cached.tile.set(local, value);
        cached.dirty = true;
    }

    pub fn check(&self) -> ChunkerResult<()> {
        self.cache.lock().deferred_error.take().map_or(Ok(()), Err)
    }

    /// Writes every dirty cached tile back to the database.
    pub fn flush(&mut self) -> ChunkerResult<()> {
        let cache = self.cache.get_mut();
        self.db.write_tiles(
            cache
                .tiles
                .iter()
                .filter(|(_, c)| c.dirty)
                .map(|(k, c)| (*k, &c.tile)),
        )?;
        for cached in cache.tiles.values_mut() {
            cached.dirty = false;
        }
        self.db.flush()?;
        cache.deferred_error.take().map_or(Ok(()), Err)
    }

    pub fn cached_tile_count(&self) -> usize {
        self.cache.lock().tiles.len()
    }

    pub fn eviction_count(&self) -> u64 {
        self.cache.lock().evictions
    }
}

struct TileCache<T> {
    tiles: SmallKeyHashMap<TileKey, CachedTile<T>>,
    clock: u64,
    max_tiles: usize,
    evictions: u64,
    deferred_error: Option<ChunkerError>,
}

struct CachedTile<T> {
    tile: Tile<T>,
    dirty: bool,
    last_used: u64,
}

impl<T: Pod> TileCache<T> {
    fn new(max_tiles: usize) -> Self {
        Self {
            tiles: SmallKeyHashMap::default(),
            clock: 0,
            max_tiles,
            evictions: 0,
            deferred_error: None,
        }
    }

    fn touch(&mut self, db: &TileDb, key: TileKey, ambient: T) -> &mut CachedTile<T> {
        self.clock += 1;
        let clock = self.clock;

        if self.tiles.len() >= self.max_tiles && !self.tiles.contains_key(&key) {
            self.evict_oldest(db);
        }

        let deferred_error = &mut self.deferred_error;
        let cached = self.tiles.entry(key).or_insert_with(|| {
            let tile = match db.read_tile(key) {
                Ok(Some(tile)) => tile,
                Ok(None) => Tile::filled(ambient),
                Err(e) => {
                    record_error(deferred_error, e);
                    Tile::filled(ambient)
                }
            };
            CachedTile {
                tile,
                dirty: false,
                last_used: clock,
            }
        });
        cached.last_used = clock;
        cached
    }

    /// Evicts the least recently used quarter of the cache, writing back the dirty tiles in one batch.
    fn evict_oldest(&mut self, db: &TileDb) {
        let num_evict = (self.max_tiles / 4).max(1);
        let oldest: Vec<TileKey> = self
            .tiles
            .iter()
            .sorted_by_key(|(_, c)| c.last_used)
            .take(num_evict)
            .map(|(k, _)| *k)
            .collect();
        let evicted: Vec<(TileKey, CachedTile<T>)> = oldest
            .into_iter()
            .filter_map(|k| self.tiles.remove(&k).map(|c| (k, c)))
            .collect();
        self.evictions += evicted.len() as u64;

        let result = db.write_tiles(
            evicted
                .iter()
                .filter(|(_, c)| c.dirty)
                .map(|(k, c)| (*k, &c.tile)),
        );
        match result {
            Ok(num_written) => log::trace!(
                "Evicted {} tiles, wrote back {}",
                evicted.len(),
                num_written
            ),
            Err(e) => record_error(&mut self.deferred_error, e),
        }
    }
}

/// Keeps the first failure for [`PagedGrid::check`].
fn record_error(slot: &mut Option<ChunkerError>, e: ChunkerError) {
    log::error!("Sample storage failure: {}", e);
    if slot.is_none() {
        *slot = Some(e);
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝

#[cfg(test)]
mod tests {
    use super::*;

    fn fill_pattern(grid: &mut SampleStorage<i16>) {
        for z in 0..grid.height() {
            for x in 0..grid.width() {
                grid.set(x, z, (x as i16) - 2 * (z as i16));
            }
        }
    }

    fn assert_pattern(grid: &SampleStorage<i16>) {
        for z in 0..grid.height() {
            for x in 0..grid.width() {
                assert_eq!(grid.get(x, z), (x as i16) - 2 * (z as i16), "({}, {})", x, z);
            }
        }
    }

    #[test]
    fn memory_grid_reads_writes_and_ambient() {
        let backend = StorageBackend::Memory;
        let mut grid = backend.create_grid("heights", 10, 7, 9i16).unwrap();
        assert_eq!(grid.get(9, 6), 9);
        fill_pattern(&mut grid);
        assert_pattern(&grid);
        grid.check().unwrap();
    }

    #[test]
    fn paged_grid_survives_eviction() {
        let backend = StorageBackend::temporary_paged(2).unwrap();
        let mut grid = backend.create_grid("heights", 200, 150, 0i16).unwrap();
        fill_pattern(&mut grid);
        assert_pattern(&grid);
        grid.check().unwrap();

        if let SampleStorage::Paged(paged) = &grid {
            assert!(paged.cached_tile_count() <= 2);
            assert!(paged.eviction_count() > 0);
        } else {
            panic!("expected a paged grid");
        }
    }

    #[test]
    fn cached_tile_is_reused_without_eviction() {
        let backend = StorageBackend::temporary_paged(1).unwrap();
        let mut grid = backend.create_grid("heights", 64, 64, 0i16).unwrap();
        for i in 0..64 {
            grid.set(i, i, i as i16);
            assert_eq!(grid.get(i, 63 - i), 0);
        }
        assert_eq!(grid.get(10, 10), 10);

        if let SampleStorage::Paged(paged) = &grid {
            assert_eq!(paged.cached_tile_count(), 1);
            assert_eq!(paged.eviction_count(), 0);
        } else {
            panic!("expected a paged grid");
        }
    }

    #[test]
    fn paged_grid_reads_ambient_for_unwritten_tiles() {
        let backend = StorageBackend::temporary_paged(4).unwrap();
        let mut grid = backend.create_grid("levels", 300, 300, 0xFFu8).unwrap();
        grid.set(0, 0, 3);
        assert_eq!(grid.get(0, 0), 3);
        assert_eq!(grid.get(299, 299), 0xFF);
        assert_eq!(grid.get(1, 0), 0xFF);
    }

    #[test]
    fn paged_grid_persists_after_flush_and_reopen() {
        let db = sled::Config::default().temporary(true).open().unwrap();
        {
            let mut grid = SampleStorage::Paged(
                PagedGrid::create(&db, "heights", 130, 70, 0i16, 3).unwrap(),
            );
            fill_pattern(&mut grid);
            grid.flush().unwrap();
        }

        let grid = SampleStorage::Paged(PagedGrid::<i16>::open(&db, "heights", 0, 3).unwrap());
        assert_eq!(grid.width(), 130);
        assert_eq!(grid.height(), 70);
        assert_pattern(&grid);

        // Sample type must match.
        assert!(PagedGrid::<u8>::open(&db, "heights", 0, 3).is_err());
    }
}
