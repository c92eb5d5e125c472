use crate::heightfield::{Heightfield, Level};

use chunklod_core::glam::IVec2;

/// # Edge Record
///
/// Stitching data for one side of a chunk.
///
/// `lo` holds the edge vertices active at the chunk's own level. When the chunk has finer neighbors, `hi` holds the vertices
/// active one level finer, split at the edge midpoint so each half can be matched against a different neighbor. `ribbon` is
/// an indexed triangle list over `lo` followed by `hi[0]` and `hi[1]` that fills the crack between the two resolutions.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EdgeData {
    pub ribbon: Vec<u32>,
    pub lo: Vec<IVec2>,
    pub hi: [Vec<IVec2>; 2],
}

impl EdgeData {
    pub fn clear(&mut self) {
        self.ribbon.clear();
        self.lo.clear();
        self.hi[0].clear();
        self.hi[1].clear();
    }

    pub fn hi_vertex_count(&self) -> usize {
        self.hi[0].len() + self.hi[1].len()
    }

    fn push_triangle(&mut self, a: u32, b: u32, c: u32) {
        self.ribbon.extend_from_slice(&[a, b, c]);
    }
}

/// Walks the edge from `from` to `to` (which must increase along one axis) and collects its vertices at `level`.
///
/// With `ribbon`, also collects the vertices at `level - 1` and triangulates between the two.
pub fn stitch_edge(
    hf: &Heightfield,
    from: IVec2,
    to: IVec2,
    level: Level,
    ribbon: bool,
) -> EdgeData {
    debug_assert!(from.x <= to.x && from.y <= to.y);
    let step = IVec2::new((from.x < to.x) as i32, (from.y < to.y) as i32);
    let num_steps = (to.x - from.x).max(to.y - from.y) + 1;
    let halfway = num_steps >> 1;
    let positions = (0..num_steps).map(|i| from + step * i);

    let mut edge = EdgeData::default();

    if !ribbon || level == 0 {
        edge.lo = positions.filter(|&p| hf.is_active(p, level)).collect();
        return edge;
    }

    // Number of lo vertices strictly before the halfway point.
    let mut lo_count = 0;
    let mut midpoint_index = 0;
    for (i, p) in positions.clone().enumerate() {
        if i as i32 == halfway {
            midpoint_index = lo_count;
        }
        if hf.is_active(p, level) {
            lo_count += 1;
        }
    }

    let hi_level = level - 1;
    let mut lo_index = 0;
    let mut hi_index = lo_count;
    let mut hi_part = 0;
    edge.lo.push(from);
    edge.hi[hi_part].push(from);

    for p in positions.skip(1) {
        if !hf.is_active(p, hi_level) {
            continue;
        }
        edge.push_triangle(lo_index, hi_index, hi_index + 1);
        hi_index += 1;
        edge.hi[hi_part].push(p);

        if hf.is_active(p, level) {
            edge.push_triangle(lo_index, hi_index, lo_index + 1);
            lo_index += 1;
            edge.lo.push(p);

            if lo_index == midpoint_index {
                // Filler between the two hi halves.
                edge.push_triangle(lo_index, hi_index, hi_index + 1);
                hi_index += 1;
                hi_part = 1;
                edge.hi[hi_part].push(p);
            }
        }
    }

    edge
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
