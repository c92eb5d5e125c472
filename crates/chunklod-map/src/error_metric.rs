use crate::heightfield::{Heightfield, Level};

use chunklod_core::glam::IVec2;
use smallvec::SmallVec;

/// A right triangle of the binary triangle tree, given by its apex, right and left vertices.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Triangle {
    pub apex: IVec2,
    pub right: IVec2,
    pub left: IVec2,
}

impl Triangle {
    pub fn new(apex: IVec2, right: IVec2, left: IVec2) -> Self {
        Self { apex, right, left }
    }

    /// The two triangles that tile a grid of `size` samples per side: southwest half, then northeast half.
    pub fn root_halves(size: i32) -> [Self; 2] {
        let max = size - 1;
        [
            Self::new(IVec2::new(0, max), IVec2::new(max, max), IVec2::new(0, 0)),
            Self::new(IVec2::new(max, 0), IVec2::new(0, 0), IVec2::new(max, max)),
        ]
    }

    /// Midpoint of the hypotenuse, or `None` once the triangle is a single grid cell.
    pub fn base_vertex(&self) -> Option<IVec2> {
        let d = self.left - self.right;
        if d.x.abs() <= 1 && d.y.abs() <= 1 {
            return None;
        }
        Some(self.right + (d >> 1))
    }

    /// The child on the right side of the apex, `(base, apex, right)`.
    pub fn right_child(&self, base: IVec2) -> Self {
        Self::new(base, self.apex, self.right)
    }

    /// The child on the left side of the apex, `(base, left, apex)`.
    pub fn left_child(&self, base: IVec2) -> Self {
        Self::new(base, self.left, self.apex)
    }
}

/// The LOD at which a vertex with geometric `error` must appear so the mesh stays within `max_error`.
///
/// `None` if the vertex can always be dropped.
pub fn activation_level_for_error(error: f32, max_error: f32) -> Option<Level> {
    if error < max_error {
        return None;
    }
    let level = ((error / max_error).log2() + 0.5).floor();
    Some(level.clamp(0.0, Level::MAX as f32) as Level)
}

/// Computes the vertical error of every base vertex in the binary triangle tree and activates it at the matching level.
///
/// The error of a base vertex is the distance between its height and the midpoint of its triangle's hypotenuse.
pub fn activate_by_error(hf: &mut Heightfield, max_error: f32) {
    let vertical_scale = hf.vertical_scale();

    // Depth-first, right child before left child.
    let mut stack: SmallVec<[Triangle; 64]> = SmallVec::new();
    for root in Triangle::root_halves(hf.size()) {
        stack.push(root);
        while let Some(tri) = stack.pop() {
            let base = match tri.base_vertex() {
                Some(b) => b,
                None => continue,
            };

            let expected =
                (f32::from(hf.height(tri.left)) + f32::from(hf.height(tri.right))) / 2.0;
            let error = (f32::from(hf.height(base)) - expected).abs() * vertical_scale;
            if let Some(level) = activation_level_for_error(error, max_error) {
                hf.activate(base, level);
            }

            stack.push(tri.left_child(base));
            stack.push(tri.right_child(base));
        }
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝

#[cfg(test)]
mod test {
    use super::*;
    use crate::storage::StorageBackend;

    #[test]
    fn levels_from_error() {
        assert_eq!(activation_level_for_error(0.0, 1.0), None);
        assert_eq!(activation_level_for_error(0.99, 1.0), None);
        assert_eq!(activation_level_for_error(1.0, 1.0), Some(0));
        assert_eq!(activation_level_for_error(1.4, 1.0), Some(0));
        assert_eq!(activation_level_for_error(1.5, 1.0), Some(1));
        assert_eq!(activation_level_for_error(4.0, 1.0), Some(2));
        assert_eq!(activation_level_for_error(6.0, 0.5), Some(4));
    }

    #[test]
    fn base_vertex_bisects_hypotenuse() {
        let [sw, ne] = Triangle::root_halves(5);
        assert_eq!(sw.base_vertex(), Some(IVec2::new(2, 2)));
        assert_eq!(ne.base_vertex(), Some(IVec2::new(2, 2)));

        let child = sw.right_child(IVec2::new(2, 2));
        assert_eq!(child.base_vertex(), Some(IVec2::new(2, 4)));

        let unit = Triangle::new(IVec2::new(0, 1), IVec2::new(1, 1), IVec2::new(0, 0));
        assert_eq!(unit.base_vertex(), None);
    }

    #[test]
    fn flat_heightfield_activates_nothing() {
        let mut hf = Heightfield::new(4, 1.0, 1.0, &StorageBackend::Memory).unwrap();
        for z in 0..hf.size() {
            for x in 0..hf.size() {
                hf.set_height(IVec2::new(x, z), 123);
            }
        }
        activate_by_error(&mut hf, 0.001);
        assert_eq!(hf.live_vertices(), 0);
    }

    #[test]
    fn spike_activates_its_vertex() {
        let mut hf = Heightfield::new(2, 1.0, 0.5, &StorageBackend::Memory).unwrap();
        // Error = 16 * 0.5 = 8 = 2^3 times the max error.
        hf.set_height(IVec2::new(1, 1), 16);
        activate_by_error(&mut hf, 1.0);
        assert_eq!(hf.get_level(IVec2::new(1, 1)), Some(3));

        // Depressions count too.
        let mut hf = Heightfield::new(2, 1.0, 0.5, &StorageBackend::Memory).unwrap();
        hf.set_height(IVec2::new(3, 2), -16);
        activate_by_error(&mut hf, 1.0);
        assert_eq!(hf.get_level(IVec2::new(3, 2)), Some(3));
    }
}
