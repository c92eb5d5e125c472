//! Turns a heightfield into a quadtree of simplified, stitchable terrain chunks for chunked LOD rendering.
//!
//! # Pipeline
//!
//! 1. A [`Heightfield`] of `2^N + 1` quantized samples is loaded by one of the [`source`] decoders. Samples live in a
//!    [`SampleStorage`], either in memory or paged to disk through `sled`.
//! 2. Every vertex gets an activation level from the geometric error of removing it from a binary triangle tree
//!    ([`activate_by_error`]). Levels are then propagated up the quadtree so each chunk's mesh is closed under the
//!    dependencies of its vertices ([`propagate_activation_levels`]).
//! 3. [`generate_chunk_tree`] walks the quadtree in pre-order. For every node it builds one triangle strip
//!    ([`ChunkMeshBuilder`]), stitching data for the four edges ([`stitch_edge`]), and writes a quantized record with
//!    morph deltas ([`ChunkWriter`]).
//!
//! # Chunk Files
//!
//! The output is a little-endian "CHU" file (version 6): a [`ChunkFileHeader`] followed by one record per chunk. Each
//! record carries its body size so readers can skip chunks; [`ChunkFileReader`] does exactly that.
//!
//! # Levels
//!
//! Level 0 is the finest LOD. A vertex with activation level `l` appears in every mesh of level `<= l`. Levels are stored
//! in 4 bits, so at most [`MAX_LEVEL`]` + 1` LODs exist.

mod database;
mod driver;
mod edge;
mod error;
mod error_metric;
mod format;
mod heightfield;
mod mesh;
mod morph;
mod propagate;
mod reader;
mod stats;
mod storage;
mod tile;
mod writer;

pub mod source;

pub use database::*;
pub use driver::*;
pub use edge::*;
pub use error::*;
pub use error_metric::*;
pub use format::*;
pub use heightfield::*;
pub use mesh::*;
pub use morph::*;
pub use propagate::*;
pub use reader::*;
pub use stats::*;
pub use storage::*;
pub use tile::*;
pub use writer::*;
