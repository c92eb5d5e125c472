//! Arithmetic on the implicit quadtree over a `2^N + 1` grid.
//!
//! A node is identified by the grid vertex at the center of its square. The root's center is `(2^(N-1), 2^(N-1))` and each
//! level down halves the square. Grid coordinates are stored in an [`IVec2`] as `(x, z)`, so `.y` is the Z axis.

use glam::IVec2;

/// Children of a node in tree order: NW, NE, SW, SE.
pub const CHILD_SIGNS: [IVec2; 4] = [
    IVec2::new(-1, -1),
    IVec2::new(1, -1),
    IVec2::new(-1, 1),
    IVec2::new(1, 1),
];

/// Total number of nodes in all levels shallower than `depth`, i.e. `1 + 4 + 16 + ...`.
pub fn nodes_above_depth(depth: u32) -> u64 {
    0x5555_5555_5555_5555 & ((1u64 << (depth * 2)) - 1)
}

/// Number of chunks in a tree with `tree_depth` levels.
pub fn chunk_count(tree_depth: u32) -> u32 {
    nodes_above_depth(tree_depth) as u32
}

/// Breadth-first rank of the node centered at `p` in a grid of `2^log_size + 1` samples per side.
///
/// `None` if `p` is outside the grid or is not the center of any node (like a grid corner).
pub fn node_index(log_size: u32, p: IVec2) -> Option<u64> {
    let size = (1 << log_size) + 1;
    if p.x < 0 || p.y < 0 || p.x >= size || p.y >= size {
        return None;
    }

    let lowest_one = (p.x | p.y).trailing_zeros();
    if lowest_one >= log_size {
        return None;
    }
    let depth = log_size - lowest_one - 1;
    let shift = lowest_one + 1;

    // Coordinates within this node's level.
    let col = (p.x >> shift) as u64;
    let row = (p.y >> shift) as u64;

    Some(nodes_above_depth(depth) + (row << depth) + col)
}

/// A side of a chunk, in the order edges are serialized.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum EdgeDir {
    East,
    North,
    West,
    South,
}

impl EdgeDir {
    pub const ALL: [Self; 4] = [Self::East, Self::North, Self::West, Self::South];

    /// Unit step toward this side. North is `-z`.
    pub fn unit(self) -> IVec2 {
        match self {
            Self::East => IVec2::new(1, 0),
            Self::North => IVec2::new(0, -1),
            Self::West => IVec2::new(-1, 0),
            Self::South => IVec2::new(0, 1),
        }
    }

    /// The endpoints of this side of the square centered at `center` with half edge length `half`, ordered so that the
    /// walk from the first to the second increases `x` or `z`.
    pub fn endpoints(self, center: IVec2, half: i32) -> [IVec2; 2] {
        let c = center;
        match self {
            Self::East => [c + IVec2::new(half, -half), c + IVec2::new(half, half)],
            Self::North => [c + IVec2::new(-half, -half), c + IVec2::new(half, -half)],
            Self::West => [c + IVec2::new(-half, -half), c + IVec2::new(-half, half)],
            Self::South => [c + IVec2::new(-half, half), c + IVec2::new(half, half)],
        }
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
