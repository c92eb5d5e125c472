use chunklod_map::{
    ChunkTreeParams, ChunkerError, ChunkerResult, HeightfieldParams, StorageConfig,
};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Largest height that fits the default vertical scale, in meters.
const DEFAULT_MAX_HEIGHT: f32 = 10_000.0;

/// Decompressed tiles kept per grid when paging is turned on from the command line.
pub const DEFAULT_MAX_CACHED_TILES: usize = 4096;

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct ChunkerConfig {
    /// Levels in the chunk quadtree.
    pub tree_depth: u32,
    /// Maximum geometric error of the finest chunks, in meters.
    pub max_error: f32,
    /// Meters between samples, for inputs that don't say.
    pub sample_spacing: f32,
    /// Meters per quantized height unit.
    pub vertical_scale: f32,
    /// Meters per unit of the input samples.
    pub input_vertical_scale: f32,
    pub storage: StorageConfig,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            tree_depth: 6,
            max_error: 1.0,
            sample_spacing: 4.0,
            vertical_scale: DEFAULT_MAX_HEIGHT / i16::MAX as f32,
            input_vertical_scale: 1.0,
            storage: StorageConfig::Memory,
        }
    }
}

/// Settings given on the command line, which take precedence over the config file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConfigOverrides {
    pub tree_depth: Option<u32>,
    pub max_error: Option<f32>,
    pub sample_spacing: Option<f32>,
    pub input_vertical_scale: Option<f32>,
    pub paged_storage: Option<PathBuf>,
}

impl ChunkerConfig {
    pub fn read_file(path: impl AsRef<Path>) -> Result<Self, ron::Error> {
        let reader = std::fs::File::open(path)?;

        ron::de::from_reader(reader)
    }

    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(d) = overrides.tree_depth {
            self.tree_depth = d;
        }
        if let Some(e) = overrides.max_error {
            self.max_error = e;
        }
        if let Some(s) = overrides.sample_spacing {
            self.sample_spacing = s;
        }
        if let Some(v) = overrides.input_vertical_scale {
            self.input_vertical_scale = v;
        }
        if let Some(path) = overrides.paged_storage {
            let max_cached_tiles = match self.storage {
                StorageConfig::Paged {
                    max_cached_tiles, ..
                } => max_cached_tiles,
                StorageConfig::Memory => DEFAULT_MAX_CACHED_TILES,
            };
            self.storage = StorageConfig::Paged {
                path,
                max_cached_tiles,
            };
        }
        self
    }

    /// Checks the settings that don't depend on the input. The tree depth is checked against the input size later.
    pub fn validate(&self) -> ChunkerResult<()> {
        for (name, value) in [
            ("sample spacing", self.sample_spacing),
            ("vertical scale", self.vertical_scale),
            ("input vertical scale", self.input_vertical_scale),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ChunkerError::InvalidConfig(format!(
                    "{} must be a positive number, got {}",
                    name, value
                )));
            }
        }
        if let StorageConfig::Paged {
            max_cached_tiles: 0,
            ..
        } = self.storage
        {
            return Err(ChunkerError::InvalidConfig(
                "paged storage needs room for at least one cached tile".into(),
            ));
        }
        Ok(())
    }

    pub fn heightfield_params(&self) -> HeightfieldParams {
        HeightfieldParams {
            sample_spacing: self.sample_spacing,
            vertical_scale: self.vertical_scale,
            input_vertical_scale: self.input_vertical_scale,
        }
    }

    pub fn tree_params(&self) -> ChunkTreeParams {
        ChunkTreeParams {
            tree_depth: self.tree_depth,
            max_error: self.max_error,
        }
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
