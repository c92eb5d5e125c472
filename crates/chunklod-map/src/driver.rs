use crate::error::{ChunkerError, ChunkerResult};
use crate::error_metric::activate_by_error;
use crate::format::{ChunkAddress, ChunkFileHeader};
use crate::heightfield::{Heightfield, Level, MAX_LEVEL};
use crate::mesh::ChunkMeshBuilder;
use crate::propagate::propagate_activation_levels;
use crate::stats::ChunkStats;
use crate::writer::ChunkWriter;

use chunklod_core::glam::IVec2;
use chunklod_core::quadtree::EdgeDir;
use chunklod_core::work_timer::WorkTimer;

use std::io::{Seek, Write};
use std::time::Instant;

/// Shape and accuracy of the chunk tree.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChunkTreeParams {
    /// Number of LOD levels, so the tree has `(4^depth - 1) / 3` chunks.
    pub tree_depth: u32,
    /// Largest geometric error allowed in the finest chunks, in meters. Each coarser level doubles it.
    pub max_error: f32,
}

impl ChunkTreeParams {
    pub fn validate(&self, log_size: u32) -> ChunkerResult<()> {
        let max_depth = (u32::from(MAX_LEVEL) + 1).min(log_size);
        if self.tree_depth < 1 || self.tree_depth > max_depth {
            return Err(ChunkerError::InvalidConfig(format!(
                "tree depth {} is out of range; a {}x{} heightfield supports 1 to {}",
                self.tree_depth,
                (1u32 << log_size) + 1,
                (1u32 << log_size) + 1,
                max_depth
            )));
        }
        if !self.max_error.is_finite() || self.max_error <= 0.0 {
            return Err(ChunkerError::InvalidConfig(format!(
                "max error must be a positive number, got {}",
                self.max_error
            )));
        }
        Ok(())
    }
}

/// Simplifies `hf` and writes its whole chunk tree to `out` as a CHU file.
///
/// Chunks are written in pre-order: each node, then its NW, NE, SW and SE subtrees. Returns the run statistics and the
/// output stream.
pub fn generate_chunk_tree<W: Write + Seek>(
    hf: &mut Heightfield,
    params: ChunkTreeParams,
    out: W,
) -> ChunkerResult<(ChunkStats, W)> {
    params.validate(hf.log_size())?;

    log::info!("updating activation levels (max error {})", params.max_error);
    activate_by_error(hf, params.max_error);
    log::info!("propagating activation levels");
    propagate_activation_levels(hf);
    hf.check_storage()?;

    let header = ChunkFileHeader::new(
        params.tree_depth,
        params.max_error,
        hf.vertical_scale(),
        hf.log_size(),
        hf.sample_spacing(),
    );
    let mut writer = ChunkWriter::new(out);
    writer.write_header(&header)?;

    log::info!("meshing {} chunks", header.chunk_count);
    let mut builder = ChunkTreeBuilder {
        hf,
        mesh: ChunkMeshBuilder::new(),
        writer,
        stats: ChunkStats::default(),
        timer: WorkTimer::start(),
    };
    builder.build_tree(params.tree_depth)?;

    let ChunkTreeBuilder {
        hf,
        writer,
        mut stats,
        timer,
        ..
    } = builder;

    log::info!(
        "meshed {} chunks in {:?} ({} us/chunk, slowest {:?})",
        timer.items_completed(),
        timer.total_cpu_time(),
        timer.average_cpu_time_us(),
        timer.slowest_item()
    );

    let input_size = hf.size() as u64;
    stats.input_vertices = input_size * input_size;
    stats.output_vertices = hf.live_vertices();
    stats.output_bytes = writer.bytes_written();

    Ok((stats, writer.finish()?))
}

#[derive(Clone, Copy, Debug)]
struct ChunkTask {
    min: IVec2,
    log_size: u32,
    level: Level,
}

struct ChunkTreeBuilder<'a, W> {
    hf: &'a mut Heightfield,
    mesh: ChunkMeshBuilder,
    writer: ChunkWriter<W>,
    stats: ChunkStats,
    timer: WorkTimer,
}

impl<'a, W: Write + Seek> ChunkTreeBuilder<'a, W> {
    fn build_tree(&mut self, tree_depth: u32) -> ChunkerResult<()> {
        let mut stack = vec![ChunkTask {
            min: IVec2::ZERO,
            log_size: self.hf.log_size(),
            level: (tree_depth - 1) as Level,
        }];

        while let Some(task) = stack.pop() {
            self.write_chunk(task)?;

            if task.level > 0 {
                let half = 1 << (task.log_size - 1);
                // Reversed so NW pops first.
                for offset in [[half, half], [0, half], [half, 0], [0, 0]] {
                    stack.push(ChunkTask {
                        min: task.min + IVec2::from(offset),
                        log_size: task.log_size - 1,
                        level: task.level - 1,
                    });
                }
            }
        }

        Ok(())
    }

    fn write_chunk(&mut self, task: ChunkTask) -> ChunkerResult<()> {
        let start = Instant::now();
        let ChunkTask {
            min,
            log_size,
            level,
        } = task;
        let size = 1 << log_size;
        let center = min + IVec2::splat(size >> 1);

        // Chunk corners must be in the chunk's own mesh even when the error metric didn't ask for them.
        for corner in [
            min + IVec2::new(size, 0),
            min,
            min + IVec2::new(0, size),
            min + IVec2::new(size, size),
        ] {
            self.hf.activate(corner, level);
        }

        self.mesh.build_chunk(self.hf, min, log_size, level);

        let hf = &*self.hf;
        let label = |p: IVec2| hf.node_index(p).map_or(-1, |i| i as i32);
        let address = ChunkAddress {
            label: label(center),
            neighbors: EdgeDir::ALL.map(|dir| label(center + dir.unit() * size)),
            level,
            x: (min.x >> log_size) as u16,
            z: (min.y >> log_size) as u16,
        };

        hf.check_storage()?;
        let record_size = self.writer.write_chunk(hf, &address, &self.mesh)?;

        let real = self.mesh.real_triangle_count() as u64;
        let degenerate = self.mesh.degenerate_triangle_count() as u64;
        self.stats.chunks += 1;
        self.stats.real_triangles += real;
        self.stats.degenerate_triangles += degenerate;
        self.timer.complete_item(start.elapsed());

        log::debug!(
            "chunk {} at level {} ({}, {}): {} vertices, {} triangles, {} degenerate, {} bytes",
            address.label,
            level,
            address.x,
            address.z,
            self.mesh.vertices().len(),
            real,
            degenerate,
            record_size
        );

        Ok(())
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
