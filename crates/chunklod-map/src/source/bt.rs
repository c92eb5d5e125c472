use crate::error::{ChunkerError, ChunkerResult};
use crate::format::{read_bytes, read_f32, read_i16, read_u32};
use crate::heightfield::{Heightfield, HeightfieldParams};
use crate::storage::StorageBackend;

use std::io::{self, Read, Seek, SeekFrom};

pub const BT_MAGIC: [u8; 10] = *b"binterr1.1";
/// Sample data starts at this offset, after the header and its padding.
pub const BT_DATA_OFFSET: u64 = 256;

/// Header of a `.BT` ("binary terrain") 1.1 file.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BtHeader {
    pub columns: u32,
    pub rows: u32,
    /// Bytes per sample, 2 or 4.
    pub sample_size: i16,
    pub float_samples: bool,
    pub utm: bool,
    pub utm_zone: i16,
    pub datum: i16,
    pub left: f64,
    pub right: f64,
    pub bottom: f64,
    pub top: f64,
}

impl BtHeader {
    /// Reads the header at the current position. If the magic doesn't match, rewinds to that position and returns `None`.
    pub fn read_from<R: Read + Seek>(input: &mut R) -> ChunkerResult<Option<Self>> {
        let start = input.stream_position()?;

        let mut magic = Vec::with_capacity(BT_MAGIC.len());
        input
            .by_ref()
            .take(BT_MAGIC.len() as u64)
            .read_to_end(&mut magic)?;
        if magic != BT_MAGIC {
            input.seek(SeekFrom::Start(start))?;
            return Ok(None);
        }

        let columns = read_dimension(input)?;
        let rows = read_dimension(input)?;
        let sample_size = read_i16(input)?;
        let float_samples = read_i16(input)? == 1;
        let utm = read_i16(input)? != 0;
        let utm_zone = read_i16(input)?;
        let datum = read_i16(input)?;
        let header = Self {
            columns,
            rows,
            sample_size,
            float_samples,
            utm,
            utm_zone,
            datum,
            left: read_f64(input)?,
            right: read_f64(input)?,
            bottom: read_f64(input)?,
            top: read_f64(input)?,
        };

        if (header.float_samples && sample_size != 4) || (sample_size != 2 && sample_size != 4) {
            return Err(ChunkerError::UnsupportedSampleSize(sample_size));
        }

        input.seek(SeekFrom::Start(start + BT_DATA_OFFSET))?;

        Ok(Some(header))
    }

    /// Horizontal distance between samples implied by the extents, if the extents are usable.
    pub fn sample_spacing(&self) -> Option<f32> {
        let spacing = ((self.right - self.left).abs() / f64::from(self.columns.saturating_sub(1))) as f32;
        (spacing.is_finite() && spacing > 0.0).then(|| spacing)
    }

    fn read_sample(&self, input: &mut impl Read) -> io::Result<f32> {
        if self.float_samples {
            read_f32(input)
        } else if self.sample_size == 2 {
            read_i16(input).map(f32::from)
        } else {
            read_bytes(input).map(|b| i32::from_le_bytes(b) as f32)
        }
    }
}

/// Decodes a `.BT` file, or returns `None` (with `input` rewound) if it isn't one.
///
/// Samples are stored in columns from west to east, each running south to north. The north edge becomes `z = 0`, and a
/// non-square or non-`2^N + 1` grid is extended to the east and south.
pub fn read_bt<R: Read + Seek>(
    input: &mut R,
    mut params: HeightfieldParams,
    backend: &StorageBackend,
) -> ChunkerResult<Option<Heightfield>> {
    let header = match BtHeader::read_from(input)? {
        Some(h) => h,
        None => return Ok(None),
    };
    log::info!(
        "reading .BT data: {}x{} samples of {} bytes{}, extents [{}, {}] x [{}, {}]",
        header.columns,
        header.rows,
        header.sample_size,
        if header.float_samples { " (float)" } else { "" },
        header.left,
        header.right,
        header.bottom,
        header.top
    );

    match header.sample_spacing() {
        Some(spacing) => params.sample_spacing = spacing,
        None => log::warn!(
            "unusable .BT extents; using a sample spacing of {}",
            params.sample_spacing
        ),
    }

    let mut hf_input = Heightfield::for_input(header.columns, header.rows, params, backend)?;
    for x in 0..header.columns {
        for row in 0..header.rows {
            let raw = header.read_sample(input)?;
            hf_input.set_raw_sample(x, header.rows - 1 - row, raw);
        }
    }

    hf_input.finish().map(Some)
}

fn read_dimension(input: &mut impl Read) -> ChunkerResult<u32> {
    let n = read_u32(input)? as i32;
    u32::try_from(n).map_err(|_| ChunkerError::InvalidDimensions {
        width: n as u32,
        height: n as u32,
        reason: ".BT dimensions must be positive",
    })
}

fn read_f64(input: &mut impl Read) -> io::Result<f64> {
    read_bytes(input).map(f64::from_le_bytes)
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝

#[cfg(test)]
pub(crate) mod test {
    use super::*;

    use chunklod_core::approx::assert_relative_eq;
    use chunklod_core::glam::IVec2;
    use std::io::Cursor;

    pub enum Samples {
        Short(Vec<i16>),
        Int(Vec<i32>),
        Float(Vec<f32>),
    }

    /// Encodes a `.BT` file whose samples are given column by column, south to north.
    pub fn encode_bt(columns: u32, rows: u32, extent: f64, samples: Samples) -> Vec<u8> {
        let (sample_size, float_flag) = match samples {
            Samples::Short(_) => (2i16, 0i16),
            Samples::Int(_) => (4, 0),
            Samples::Float(_) => (4, 1),
        };
        let mut bytes = BT_MAGIC.to_vec();
        bytes.extend_from_slice(&(columns as i32).to_le_bytes());
        bytes.extend_from_slice(&(rows as i32).to_le_bytes());
        for v in [sample_size, float_flag, 1, 10, 4] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        for v in [0.0, extent, 0.0, extent] {
            bytes.extend_from_slice(&f64::to_le_bytes(v));
        }
        bytes.resize(BT_DATA_OFFSET as usize, 0);
        match samples {
            Samples::Short(s) => s.iter().for_each(|v| bytes.extend_from_slice(&v.to_le_bytes())),
            Samples::Int(s) => s.iter().for_each(|v| bytes.extend_from_slice(&v.to_le_bytes())),
            Samples::Float(s) => s.iter().for_each(|v| bytes.extend_from_slice(&v.to_le_bytes())),
        }
        bytes
    }

    fn params() -> HeightfieldParams {
        HeightfieldParams {
            sample_spacing: 4.0,
            vertical_scale: 0.5,
            input_vertical_scale: 1.0,
        }
    }

    fn decode(bytes: Vec<u8>) -> Heightfield {
        read_bt(&mut Cursor::new(bytes), params(), &StorageBackend::Memory)
            .unwrap()
            .unwrap()
    }

    #[test]
    fn short_samples_are_column_major_from_the_south() {
        // Column x holds 10 * x + row.
        let samples = (0..3)
            .flat_map(|x| (0..3).map(move |row| (10 * x + row) as i16))
            .collect();
        let hf = decode(encode_bt(3, 3, 20.0, Samples::Short(samples)));

        assert_eq!(hf.size(), 3);
        assert_relative_eq!(hf.sample_spacing(), 10.0);
        // Southernmost row is z = 2.
        assert_eq!(hf.height(IVec2::new(0, 2)), 0);
        assert_eq!(hf.height(IVec2::new(0, 0)), 4);
        assert_eq!(hf.height(IVec2::new(2, 1)), 42);
    }

    #[test]
    fn int_and_float_samples() {
        let hf = decode(encode_bt(2, 2, 1.0, Samples::Int(vec![1, 2, 3, 40_000])));
        assert_eq!(hf.height(IVec2::new(0, 1)), 2);
        assert_eq!(hf.height(IVec2::new(1, 0)), i16::MAX);

        let hf = decode(encode_bt(2, 2, 1.0, Samples::Float(vec![0.25, 1.0, -1.0, 2.0])));
        assert_eq!(hf.height(IVec2::new(0, 1)), 1);
        assert_eq!(hf.height(IVec2::new(0, 0)), 2);
        assert_eq!(hf.height(IVec2::new(1, 1)), -2);
    }

    #[test]
    fn non_square_input_is_extended() {
        // 4 columns, 2 rows: extends to 5x5.
        let samples = (0..4)
            .flat_map(|x| [x as i16, 100 + x as i16])
            .collect();
        let hf = decode(encode_bt(4, 2, 3.0, Samples::Short(samples)));

        assert_eq!(hf.size(), 5);
        // Spacing comes from the input's own columns, not the extended grid.
        assert_relative_eq!(hf.sample_spacing(), 1.0);
        assert_eq!(hf.height(IVec2::new(3, 0)), 206);
        assert_eq!(hf.height(IVec2::new(3, 1)), 6);
        // Last column and row replicated.
        assert_eq!(hf.height(IVec2::new(4, 0)), 206);
        assert_eq!(hf.height(IVec2::new(1, 4)), 2);
        assert_eq!(hf.height(IVec2::new(4, 4)), 6);
    }

    #[test]
    fn other_formats_rewind() {
        let mut input = Cursor::new(b"\x89PNG\r\n\x1a\n".to_vec());
        let result = read_bt(&mut input, params(), &StorageBackend::Memory).unwrap();
        assert!(result.is_none());
        assert_eq!(input.position(), 0);

        let mut short = Cursor::new(b"bin".to_vec());
        assert!(BtHeader::read_from(&mut short).unwrap().is_none());
    }

    #[test]
    fn rejects_odd_sample_sizes() {
        let mut bytes = encode_bt(2, 2, 1.0, Samples::Short(vec![0; 4]));
        bytes[18..20].copy_from_slice(&3i16.to_le_bytes());
        let result = read_bt(&mut Cursor::new(bytes), params(), &StorageBackend::Memory);
        assert!(matches!(result, Err(ChunkerError::UnsupportedSampleSize(3))));
    }
}
