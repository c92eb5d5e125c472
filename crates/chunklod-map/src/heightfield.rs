use crate::error::{ChunkerError, ChunkerResult};
use crate::storage::{SampleStorage, StorageBackend};

use chunklod_core::glam::IVec2;
use chunklod_core::quadtree;

/// An activation level. A vertex with level `l` is included in every mesh of LOD `<= l`.
pub type Level = u8;

/// Levels are stored in 4 bits and `0xF` means "unset".
pub const MAX_LEVEL: Level = 14;
const UNSET_NIBBLE: u8 = 0xF;

/// The largest supported grid edge, `2^20 + 1` samples.
pub const MAX_LOG_SIZE: u32 = 20;

/// Scales applied to raw input samples.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HeightfieldParams {
    /// Horizontal distance between adjacent samples, in meters.
    pub sample_spacing: f32,
    /// Meters per quantized height unit.
    pub vertical_scale: f32,
    /// Meters per raw input unit.
    pub input_vertical_scale: f32,
}

/// # Heightfield Store
///
/// A square grid of `2^N + 1` quantized heights with a parallel grid of 4-bit activation levels.
///
/// Levels are packed two samples per byte: even `x` in the low nibble and odd `x` in the high nibble. Both grids sit in a
/// [`SampleStorage`], so they may be paged to disk.
pub struct Heightfield {
    log_size: u32,
    size: i32,
    sample_spacing: f32,
    vertical_scale: f32,
    heights: SampleStorage<i16>,
    levels: SampleStorage<u8>,
    live_vertices: u64,
}

impl Heightfield {
    /// A flat heightfield of `2^log_size + 1` samples per side with no active vertices.
    pub fn new(
        log_size: u32,
        sample_spacing: f32,
        vertical_scale: f32,
        backend: &StorageBackend,
    ) -> ChunkerResult<Self> {
        if log_size == 0 || log_size > MAX_LOG_SIZE {
            let size = (1u32 << log_size.min(31)) + 1;
            return Err(ChunkerError::InvalidDimensions {
                width: size,
                height: size,
                reason: "grid must have between 3 and 2^20 + 1 samples per side",
            });
        }
        let size = (1u32 << log_size) + 1;
        let heights = backend.create_grid("heights", size, size, 0i16)?;
        let levels = backend.create_grid("levels", (size + 1) / 2, size, 0xFFu8)?;

        Ok(Self {
            log_size,
            size: size as i32,
            sample_spacing,
            vertical_scale,
            heights,
            levels,
            live_vertices: 0,
        })
    }

    /// Builds a heightfield from `width x height` raw samples, where `sample(x, z)` returns the raw input height.
    ///
    /// The grid is extended to the smallest `2^N + 1` square that contains the input, replicating the last column and row.
    pub fn from_samples(
        width: u32,
        height: u32,
        params: HeightfieldParams,
        backend: &StorageBackend,
        mut sample: impl FnMut(u32, u32) -> f32,
    ) -> ChunkerResult<Self> {
        let mut input = Self::for_input(width, height, params, backend)?;
        for z in 0..height {
            for x in 0..width {
                input.set_raw_sample(x, z, sample(x, z));
            }
        }
        input.finish()
    }

    /// Allocates the smallest `2^N + 1` heightfield that holds `width x height` input samples. Fill it with
    /// [`HeightfieldInput::set_raw_sample`] in any order, then call [`HeightfieldInput::finish`].
    pub fn for_input(
        width: u32,
        height: u32,
        params: HeightfieldParams,
        backend: &StorageBackend,
    ) -> ChunkerResult<HeightfieldInput> {
        let log_size = log_size_for_samples(width, height)?;
        let hf = Self::new(log_size, params.sample_spacing, params.vertical_scale, backend)?;
        let size = hf.size as u32;
        if size != width || size != height {
            log::warn!(
                "Input is {}x{}; extending to {}x{} by replicating the last row and column",
                width,
                height,
                size,
                size
            );
        }

        Ok(HeightfieldInput {
            hf,
            width,
            height,
            scale: params.input_vertical_scale / params.vertical_scale,
        })
    }

    pub fn log_size(&self) -> u32 {
        self.log_size
    }

    /// Samples per side, `2^log_size + 1`.
    pub fn size(&self) -> i32 {
        self.size
    }

    pub fn sample_spacing(&self) -> f32 {
        self.sample_spacing
    }

    pub fn vertical_scale(&self) -> f32 {
        self.vertical_scale
    }

    /// Number of vertices that have been activated at any level.
    pub fn live_vertices(&self) -> u64 {
        self.live_vertices
    }

    pub fn contains(&self, p: IVec2) -> bool {
        p.x >= 0 && p.y >= 0 && p.x < self.size && p.y < self.size
    }

    #[inline]
    pub fn height(&self, p: IVec2) -> i16 {
        debug_assert!(self.contains(p), "{:?} is outside the heightfield", p);
        self.heights.get(p.x as u32, p.y as u32)
    }

    #[inline]
    pub fn set_height(&mut self, p: IVec2, height: i16) {
        debug_assert!(self.contains(p), "{:?} is outside the heightfield", p);
        self.heights.set(p.x as u32, p.y as u32, height);
    }

    /// The activation level at `p`, or `None` if it was never activated.
    #[inline]
    pub fn get_level(&self, p: IVec2) -> Option<Level> {
        debug_assert!(self.contains(p), "{:?} is outside the heightfield", p);
        let byte = self.levels.get((p.x >> 1) as u32, p.y as u32);
        let nibble = if p.x & 1 == 1 { byte >> 4 } else { byte & 0xF };
        (nibble != UNSET_NIBBLE).then(|| nibble)
    }

    /// True if the vertex at `p` belongs in meshes of LOD `level`.
    #[inline]
    pub fn is_active(&self, p: IVec2, level: Level) -> bool {
        self.get_level(p) >= Some(level)
    }

    fn set_level(&mut self, p: IVec2, level: Level) {
        debug_assert!(level <= MAX_LEVEL);
        let (bx, bz) = ((p.x >> 1) as u32, p.y as u32);
        let byte = self.levels.get(bx, bz);
        let new_byte = if p.x & 1 == 1 {
            (byte & 0x0F) | (level << 4)
        } else {
            (byte & 0xF0) | level
        };
        self.levels.set(bx, bz, new_byte);
    }

    /// Raises the level at `p` to `level` if that is strictly greater than the current level. Levels above
    /// [`MAX_LEVEL`] saturate.
    pub fn activate(&mut self, p: IVec2, level: Level) {
        let level = level.min(MAX_LEVEL);
        let current = self.get_level(p);
        if current < Some(level) {
            if current.is_none() {
                self.live_vertices += 1;
            }
            self.set_level(p, level);
        }
    }

    /// Breadth-first rank of the quadtree node centered at `p`. See [`quadtree::node_index`].
    pub fn node_index(&self, p: IVec2) -> Option<u64> {
        quadtree::node_index(self.log_size, p)
    }

    /// Surfaces any storage failure deferred by the infallible accessors.
    pub fn check_storage(&self) -> ChunkerResult<()> {
        self.heights.check()?;
        self.levels.check()
    }
}

/// A [`Heightfield`] being filled from raw input samples.
pub struct HeightfieldInput {
    hf: Heightfield,
    width: u32,
    height: u32,
    scale: f32,
}

impl HeightfieldInput {
    pub fn size(&self) -> i32 {
        self.hf.size
    }

    /// Stores the quantized `raw * input_vertical_scale / vertical_scale` at `(x, z)`, which must be within the input
    /// dimensions.
    #[inline]
    pub fn set_raw_sample(&mut self, x: u32, z: u32, raw: f32) {
        debug_assert!(x < self.width && z < self.height);
        self.hf.heights.set(x, z, quantize_height(raw * self.scale));
    }

    /// Fills the columns east of the input and the rows south of it by replicating the last input column and row.
    pub fn finish(mut self) -> ChunkerResult<Heightfield> {
        let size = self.hf.size as u32;
        let (width, height) = (self.width, self.height);
        let heights = &mut self.hf.heights;
        for z in 0..height {
            let edge = heights.get(width - 1, z);
            for x in width..size {
                heights.set(x, z, edge);
            }
        }
        for z in height..size {
            for x in 0..size {
                let edge = heights.get(x, height - 1);
                heights.set(x, z, edge);
            }
        }
        self.hf.check_storage()?;

        Ok(self.hf)
    }
}

/// Smallest `N` such that a `2^N + 1` grid holds `width x height` samples.
pub fn log_size_for_samples(width: u32, height: u32) -> ChunkerResult<u32> {
    let edge = width.max(height);
    if width < 2 || height < 2 {
        return Err(ChunkerError::InvalidDimensions {
            width,
            height,
            reason: "need at least 2 samples per side",
        });
    }
    if edge > (1 << MAX_LOG_SIZE) + 1 {
        return Err(ChunkerError::InvalidDimensions {
            width,
            height,
            reason: "grid is larger than 2^20 + 1 samples per side",
        });
    }
    let intervals = edge - 1;
    let log_size = u32::BITS - (intervals - 1).leading_zeros();
    Ok(log_size.max(1))
}

/// Rounds a height in quantized units to the nearest representable sample.
pub fn quantize_height(h: f32) -> i16 {
    h.round().clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
