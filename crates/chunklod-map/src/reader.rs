use crate::error::{ChunkerError, ChunkerResult};
use crate::format::{
    read_i16, read_u16, read_u32, ChunkAddress, ChunkFileHeader, VertexRecord,
};

use std::io::{self, Read, Seek, SeekFrom};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct EdgeRecord {
    pub ribbon: Vec<u16>,
    pub lo: Vec<VertexRecord>,
    pub hi: [Vec<VertexRecord>; 2],
}

/// A fully decoded chunk record.
#[derive(Clone, Debug, PartialEq)]
pub struct ChunkRecord {
    pub address: ChunkAddress,
    pub min_y: i16,
    pub max_y: i16,
    pub body_size: u32,
    pub vertices: Vec<VertexRecord>,
    pub strip: Vec<u16>,
    pub real_triangles: u32,
    pub edges: [EdgeRecord; 4],
}

/// What [`ChunkFileReader::skip_chunk`] learns without decoding the body.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ChunkRecordSummary {
    pub address: ChunkAddress,
    pub min_y: i16,
    pub max_y: i16,
    pub body_size: u32,
}

/// Reads back a CHU file, one chunk record at a time.
pub struct ChunkFileReader<R> {
    input: R,
    header: ChunkFileHeader,
    chunks_read: u32,
}

impl<R: Read + Seek> ChunkFileReader<R> {
    pub fn new(mut input: R) -> ChunkerResult<Self> {
        let header = ChunkFileHeader::read_from(&mut input)?;
        Ok(Self {
            input,
            header,
            chunks_read: 0,
        })
    }

    pub fn header(&self) -> &ChunkFileHeader {
        &self.header
    }

    /// Decodes the next chunk, checking the body against its size field. Returns `None` after the last chunk the header
    /// announced.
    pub fn read_chunk(&mut self) -> ChunkerResult<Option<ChunkRecord>> {
        let summary = match self.read_prefix()? {
            Some(s) => s,
            None => return Ok(None),
        };
        let input = &mut self.input;
        let body_start = input.stream_position()?;

        let vertex_count = read_u16(input)?;
        let vertices = read_vertices(input, vertex_count)?;
        let strip_len = read_u32(input)?;
        let strip = (0..strip_len)
            .map(|_| read_u16(input))
            .collect::<io::Result<Vec<_>>>()?;
        let real_triangles = read_u32(input)?;

        let mut edges: [EdgeRecord; 4] = Default::default();
        for edge in edges.iter_mut() {
            let ribbon_len = read_u16(input)?;
            edge.ribbon = (0..ribbon_len)
                .map(|_| read_u16(input))
                .collect::<io::Result<Vec<_>>>()?;
            let lo_count = read_u16(input)?;
            let hi_counts = [read_u16(input)?, read_u16(input)?];
            edge.lo = read_vertices(input, lo_count)?;
            for (hi, count) in edge.hi.iter_mut().zip(hi_counts) {
                *hi = read_vertices(input, count)?;
            }
        }

        let consumed = input.stream_position()? - body_start;
        if consumed != u64::from(summary.body_size) {
            return Err(ChunkerError::MalformedChunkFile(format!(
                "chunk {} declares {} body bytes but contains {}",
                summary.address.label, summary.body_size, consumed
            )));
        }

        Ok(Some(ChunkRecord {
            address: summary.address,
            min_y: summary.min_y,
            max_y: summary.max_y,
            body_size: summary.body_size,
            vertices,
            strip,
            real_triangles,
            edges,
        }))
    }

    /// Reads the next chunk's address and seeks past its body.
    pub fn skip_chunk(&mut self) -> ChunkerResult<Option<ChunkRecordSummary>> {
        let summary = match self.read_prefix()? {
            Some(s) => s,
            None => return Ok(None),
        };
        self.input
            .seek(SeekFrom::Current(i64::from(summary.body_size)))?;
        Ok(Some(summary))
    }

    /// True when the input ends exactly after the last chunk.
    pub fn at_end(&mut self) -> ChunkerResult<bool> {
        if self.chunks_read < self.header.chunk_count {
            return Ok(false);
        }
        let position = self.input.stream_position()?;
        let end = self.input.seek(SeekFrom::End(0))?;
        self.input.seek(SeekFrom::Start(position))?;
        Ok(position == end)
    }

    fn read_prefix(&mut self) -> ChunkerResult<Option<ChunkRecordSummary>> {
        if self.chunks_read == self.header.chunk_count {
            return Ok(None);
        }
        let input = &mut self.input;
        let address = ChunkAddress::read_from(input)?;
        let min_y = read_i16(input)?;
        let max_y = read_i16(input)?;
        let body_size = read_u32(input)?;
        self.chunks_read += 1;

        Ok(Some(ChunkRecordSummary {
            address,
            min_y,
            max_y,
            body_size,
        }))
    }
}

fn read_vertices(input: &mut impl Read, count: u16) -> io::Result<Vec<VertexRecord>> {
    (0..count).map(|_| VertexRecord::read_from(input)).collect()
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
