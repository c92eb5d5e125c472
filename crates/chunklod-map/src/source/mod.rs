//! Decoders that turn terrain files into a [`Heightfield`].
//!
//! `.BT` 1.1 files are recognized by their magic bytes; anything else is handed to the bitmap decoder.

pub mod bitmap;
pub mod bt;

pub use bitmap::read_bitmap;
pub use bt::{read_bt, BtHeader};

use crate::error::ChunkerResult;
use crate::heightfield::{Heightfield, HeightfieldParams};
use crate::storage::StorageBackend;

use std::fs::File;
use std::io::{BufRead, BufReader, Seek};
use std::path::Path;

pub fn load_heightfield(
    path: impl AsRef<Path>,
    params: HeightfieldParams,
    backend: &StorageBackend,
) -> ChunkerResult<Heightfield> {
    let path = path.as_ref();
    log::info!("loading {}", path.display());
    let file = BufReader::new(File::open(path)?);
    read_heightfield(file, params, backend)
}

/// Decodes `.BT` data, or a bitmap if the input doesn't start with the `.BT` magic.
pub fn read_heightfield<R: BufRead + Seek>(
    mut input: R,
    params: HeightfieldParams,
    backend: &StorageBackend,
) -> ChunkerResult<Heightfield> {
    if let Some(hf) = read_bt(&mut input, params, backend)? {
        return Ok(hf);
    }
    log::warn!("input is not a .BT 1.1 file; decoding it as a bitmap");
    read_bitmap(input, params, backend)
}
