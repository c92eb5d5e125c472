/// Below this many output vertices per chunk, chunks are too small to keep the GPU busy.
const LOW_VERTICES_PER_CHUNK: f32 = 1000.0;
/// Above this many, individual chunks get expensive to page in.
const HIGH_VERTICES_PER_CHUNK: f32 = 5000.0;

/// Totals gathered over one chunking run.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ChunkStats {
    /// Samples in the (extended) input grid.
    pub input_vertices: u64,
    /// Samples that ended up active at some level.
    pub output_vertices: u64,
    pub chunks: u32,
    pub real_triangles: u64,
    pub degenerate_triangles: u64,
    pub output_bytes: u64,
}

impl ChunkStats {
    pub fn vertices_per_chunk(&self) -> f32 {
        self.output_vertices as f32 / self.chunks.max(1) as f32
    }

    /// A tree depth that would give better sized chunks, if the current one is off.
    pub fn suggested_depth(&self, tree_depth: u32) -> Option<u32> {
        let per_chunk = self.vertices_per_chunk();
        if per_chunk < LOW_VERTICES_PER_CHUNK && tree_depth > 1 {
            Some(tree_depth - 1)
        } else if per_chunk > HIGH_VERTICES_PER_CHUNK {
            Some(tree_depth + 1)
        } else {
            None
        }
    }

    pub fn degenerate_overhead_percent(&self) -> f32 {
        if self.real_triangles == 0 {
            return 0.0;
        }
        self.degenerate_triangles as f32 / self.real_triangles as f32 * 100.0
    }

    /// Logs the report printed at the end of a run.
    pub fn log_report(&self, tree_depth: u32) {
        log::info!("                chunks: {:>10}", self.chunks);
        log::info!("           input verts: {:>10}", self.input_vertices);
        log::info!("          output verts: {:>10}", self.output_vertices);
        log::info!("       avg verts/chunk: {:>10.0}", self.vertices_per_chunk());
        if let Some(depth) = self.suggested_depth(tree_depth) {
            if depth < tree_depth {
                log::warn!(
                    "verts/chunk is low; for higher poly throughput consider '-d {}' and reprocessing",
                    depth
                );
            } else {
                log::warn!(
                    "verts/chunk is high; for a smoother framerate consider '-d {}' and reprocessing",
                    depth
                );
            }
        }
        log::info!("          output bytes: {:>10}", self.output_bytes);
        log::info!(
            "      bytes/input vert: {:>10.2}",
            self.output_bytes as f32 / self.input_vertices.max(1) as f32
        );
        log::info!(
            "     bytes/output vert: {:>10.2}",
            self.output_bytes as f32 / self.output_vertices.max(1) as f32
        );
        log::info!("        real triangles: {:>10}", self.real_triangles);
        log::info!("  degenerate triangles: {:>10}", self.degenerate_triangles);
        log::info!(
            "   degenerate overhead: {:>10.0}%",
            self.degenerate_overhead_percent()
        );
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
