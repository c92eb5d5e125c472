//! Converts terrain heightfields (`.BT` files or bitmaps) into CHU chunked-LOD mesh files.
//!
//! [`run`] is the whole pipeline behind the `chunklod` binary; the algorithms live in [`chunklod_map`].

mod config;

pub use config::*;

pub use chunklod_map;

use chunklod_map::source::load_heightfield;
use chunklod_map::{generate_chunk_tree, ChunkFileReader, ChunkStats, ChunkerResult, StorageBackend};

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Loads `input`, then writes its chunk tree to `output`.
pub fn run(config: &ChunkerConfig, input: &Path, output: &Path) -> ChunkerResult<ChunkStats> {
    config.validate()?;
    log::info!(
        "depth = {}, max error = {}, vertical scale = {}",
        config.tree_depth,
        config.max_error,
        config.vertical_scale
    );

    let backend = StorageBackend::open(&config.storage)?;
    let mut hf = load_heightfield(input, config.heightfield_params(), &backend)?;
    log::info!(
        "heightfield is {}x{} with {} m spacing",
        hf.size(),
        hf.size(),
        hf.sample_spacing()
    );

    let out = BufWriter::new(File::create(output)?);
    let (stats, _) = generate_chunk_tree(&mut hf, config.tree_params(), out)?;

    Ok(stats)
}

/// Reads back every chunk of a CHU file, returning the number of chunks.
pub fn verify(path: &Path) -> ChunkerResult<u32> {
    let mut reader = ChunkFileReader::new(BufReader::new(File::open(path)?))?;
    let mut chunks = 0;
    while reader.read_chunk()?.is_some() {
        chunks += 1;
    }
    if !reader.at_end()? {
        return Err(chunklod_map::ChunkerError::MalformedChunkFile(
            "trailing bytes after the last chunk".into(),
        ));
    }
    Ok(chunks)
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
