use crate::edge::{stitch_edge, EdgeData};
use crate::heightfield::{Heightfield, Level};

use chunklod_core::geometry::Aabb;
use chunklod_core::glam::{IVec2, Vec3A};
use chunklod_core::quadtree::EdgeDir;
use chunklod_core::SmallKeyHashMap;

use itertools::Itertools;

/// # Chunk Mesh Builder
///
/// Holds everything generated for one chunk: a vertex table deduplicated by grid position, a single triangle strip indexing
/// into it, and the four edge records. The builder is reused from chunk to chunk and cleared in between.
///
/// The strip is built by walking the chunk's four triangular quadrants counterclockwise (Lindstrom et al., SIGGRAPH '96),
/// turning corners with degenerate triangles where the winding requires it.
#[derive(Default)]
pub struct ChunkMeshBuilder {
    vertices: Vec<IVec2>,
    index_table: SmallKeyHashMap<IVec2, u32>,
    strip: Vec<u32>,
    edges: [EdgeData; 4],
    aabb: Aabb,
    min_y: i16,
    max_y: i16,
}

impl ChunkMeshBuilder {
    pub fn new() -> Self {
        let mut builder = Self::default();
        builder.clear();
        builder
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
        self.index_table.clear();
        self.strip.clear();
        for edge in self.edges.iter_mut() {
            edge.clear();
        }
        self.aabb = Aabb::empty();
        self.min_y = i16::MAX;
        self.max_y = i16::MIN;
    }

    /// Grid positions of the chunk's vertices, in index order.
    pub fn vertices(&self) -> &[IVec2] {
        &self.vertices
    }

    pub fn strip(&self) -> &[u32] {
        &self.strip
    }

    pub fn edge(&self, dir: EdgeDir) -> &EdgeData {
        &self.edges[dir as usize]
    }

    /// World-space bounds of the strip's vertices.
    pub fn aabb(&self) -> &Aabb {
        &self.aabb
    }

    /// Range of quantized heights in the strip.
    pub fn y_range(&self) -> [i16; 2] {
        [self.min_y, self.max_y]
    }

    pub fn real_triangle_count(&self) -> usize {
        count_real_triangles(&self.strip)
    }

    pub fn degenerate_triangle_count(&self) -> usize {
        self.strip.len().saturating_sub(2) - self.real_triangle_count()
    }

    /// Clears the builder, then generates the strip and edges for the chunk with corner `min`, edge length `2^log_size`,
    /// using only vertices active at `level`.
    pub fn build_chunk(&mut self, hf: &Heightfield, min: IVec2, log_size: u32, level: Level) {
        self.clear();

        let half = 1 << (log_size - 1);
        let center = min + IVec2::splat(half);
        self.build_strip(hf, center, log_size, level);

        for dir in EdgeDir::ALL {
            let [from, to] = dir.endpoints(center, half);
            self.edges[dir as usize] = stitch_edge(hf, from, to, level, level > 0);
        }
    }

    fn build_strip(&mut self, hf: &Heightfield, center: IVec2, log_size: u32, level: Level) {
        let hs = 1 << (log_size - 1);
        let quadrant_corners = [
            center + IVec2::new(hs, hs),
            center + IVec2::new(hs, -hs),
            center + IVec2::new(-hs, -hs),
            center + IVec2::new(-hs, hs),
        ];

        let mut state = StripState {
            buffer: [None; 2],
            ptr: 0,
            previous_level: 0,
            activation_level: level,
        };

        let first = quadrant_corners[0];
        self.emit_vertex(hf, first);
        state.set_buffer(first);

        for i in 0..4 {
            if state.previous_level & 1 == 0 {
                // Turn a corner.
                state.ptr ^= 1;
            } else {
                // Jump with a degenerate triangle.
                self.emit_from_buffer(hf, &state);
            }

            let corner = quadrant_corners[i];
            self.emit_vertex(hf, corner);
            state.set_buffer(corner);
            state.previous_level = 2 * log_size + 1;

            let next_corner = quadrant_corners[(i + 1) & 3];
            self.build_quadrant(hf, &mut state, corner, center, next_corner, 2 * log_size);
        }

        if !state.in_buffer(first) {
            self.emit_vertex(hf, first);
        }

        self.collapse_bare_quad_fan();
    }

    /// Emits the vertices of the triangle `(left, top, right)` that are active, in strip order.
    fn build_quadrant(
        &mut self,
        hf: &Heightfield,
        state: &mut StripState,
        left: IVec2,
        top: IVec2,
        right: IVec2,
        recursion_level: u32,
    ) {
        if recursion_level == 0 || !hf.is_active(top, state.activation_level) {
            return;
        }

        let base = (left + right) >> 1;

        self.build_quadrant(hf, state, left, base, top, recursion_level - 1);

        if !state.in_buffer(top) {
            if (recursion_level + state.previous_level) & 1 == 1 {
                state.ptr ^= 1;
            } else {
                self.emit_from_buffer(hf, state);
            }
            self.emit_vertex(hf, top);
            state.set_buffer(top);
            state.previous_level = recursion_level;
        }

        self.build_quadrant(hf, state, top, base, right, recursion_level - 1);
    }

    fn emit_from_buffer(&mut self, hf: &Heightfield, state: &StripState) {
        if let Some(p) = state.buffer[1 - state.ptr] {
            self.emit_vertex(hf, p);
        }
    }

    /// Appends the vertex at `p` to the strip, adding it to the vertex table if it's new.
    fn emit_vertex(&mut self, hf: &Heightfield, p: IVec2) {
        let next_index = self.vertices.len() as u32;
        let vertices = &mut self.vertices;
        let index = *self.index_table.entry(p).or_insert_with(|| {
            vertices.push(p);
            next_index
        });
        self.strip.push(index);

        let y = hf.height(p);
        self.aabb.add_point(Vec3A::new(
            p.x as f32 * hf.sample_spacing(),
            f32::from(y) * hf.vertical_scale(),
            p.y as f32 * hf.sample_spacing(),
        ));
        self.min_y = self.min_y.min(y);
        self.max_y = self.max_y.max(y);

        // A strip that starts with the same vertex three times begins with two no-op triangles.
        if self.strip.len() == 3 && self.strip[0] == self.strip[1] && self.strip[0] == self.strip[2] {
            self.strip.truncate(1);
        }
    }

    /// A chunk with only its four corners active comes out as the fan `a b a c a d`. The strip `b c a d` has the same two
    /// triangles with the same winding and no degenerates.
    fn collapse_bare_quad_fan(&mut self) {
        if let &[a, b, a2, c, a3, d] = self.strip.as_slice() {
            if a == a2 && a == a3 && a != b && b != c && c != d && a != c && a != d {
                self.strip = vec![b, c, a, d];
            }
        }
    }
}

/// Counts the strip triangles whose first index differs from the other two. This is the count stored in chunk records.
pub fn count_real_triangles(strip: &[u32]) -> usize {
    strip
        .iter()
        .tuple_windows()
        .filter(|(a, b, c)| a != b && a != c)
        .count()
}

struct StripState {
    /// The last two vertices emitted at quadrant granularity.
    buffer: [Option<IVec2>; 2],
    ptr: usize,
    previous_level: u32,
    activation_level: Level,
}

impl StripState {
    fn in_buffer(&self, p: IVec2) -> bool {
        self.buffer.contains(&Some(p))
    }

    fn set_buffer(&mut self, p: IVec2) {
        self.buffer[self.ptr] = Some(p);
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
