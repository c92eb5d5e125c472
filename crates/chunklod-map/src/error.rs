use std::io;
use thiserror::Error;

pub type ChunkerResult<T> = Result<T, ChunkerError>;

/// Everything that can stop a chunking run. None of these are transient, so none are retried.
#[derive(Debug, Error)]
pub enum ChunkerError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("sample storage error: {0}")]
    Storage(#[from] sled::Error),
    #[error("bitmap decoding error: {0}")]
    Image(#[from] image::ImageError),
    #[error("invalid heightfield dimensions {width}x{height}: {reason}")]
    InvalidDimensions {
        width: u32,
        height: u32,
        reason: &'static str,
    },
    #[error("unsupported .BT sample size of {0} bytes; expected 2 or 4")]
    UnsupportedSampleSize(i16),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error(
        "chunk at level {level} has {count} vertices, which exceeds the limit of 65535; \
        try increasing the tree depth (e.g. '-d {suggested_depth}') to make chunks smaller"
    )]
    TooManyVertices {
        level: u8,
        count: usize,
        suggested_depth: u32,
    },
    #[error(
        "edge {what} of a level {level} chunk has {count} entries, which exceeds the limit of 65535; \
        try increasing the tree depth (e.g. '-d {suggested_depth}')"
    )]
    EdgeTooLarge {
        what: &'static str,
        level: u8,
        count: usize,
        suggested_depth: u32,
    },
    #[error(
        "morph delta {delta} at ({x}, {z}) does not fit in 16 bits; the vertical scale or max error is miscalibrated"
    )]
    MorphDeltaOverflow { x: i32, z: i32, delta: i32 },
    #[error("malformed chunk file: {0}")]
    MalformedChunkFile(String),
}
