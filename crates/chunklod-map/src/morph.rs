use crate::error_metric::Triangle;
use crate::heightfield::{Heightfield, Level};

use chunklod_core::glam::IVec2;

/// Height of the terrain surface at grid point `p` when the mesh is simplified to LOD `level`, in quantized height units.
///
/// Walks down the binary triangle tree toward `p` while the base vertices are active at `level`, then interpolates on the
/// triangle where the walk stops.
pub fn height_at_lod(hf: &Heightfield, level: Level, p: IVec2) -> i16 {
    let [sw, ne] = Triangle::root_halves(hf.size());
    let mut tri = if p.y > p.x { sw } else { ne };

    loop {
        if p == tri.apex || p == tri.right || p == tri.left {
            return hf.height(p);
        }

        let base = match tri.base_vertex() {
            Some(b) => b,
            None => {
                log::error!("Height query for {:?} reached the bottom of the triangle tree", p);
                return hf.height(tri.apex);
            }
        };

        let d = tri.left - tri.right;
        let edge_length_squared = (d.x * d.x + d.y * d.y) as f32 / 2.0;
        let to_p = p - tri.apex;
        // Barycentric coordinates with respect to the right and left legs.
        let sr = to_p.dot(tri.right - tri.apex) as f32 / edge_length_squared;
        let sl = to_p.dot(tri.left - tri.apex) as f32 / edge_length_squared;

        if hf.is_active(base, level) {
            tri = if sr >= sl {
                tri.right_child(base)
            } else {
                tri.left_child(base)
            };
            continue;
        }

        let ay = f32::from(hf.height(tri.apex));
        let dr = f32::from(hf.height(tri.right)) - ay;
        let dl = f32::from(hf.height(tri.left)) - ay;
        return (ay + sl * dl + sr * dr + 0.5).floor() as i16;
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

    fn sloped_heightfield() -> Heightfield {
        let mut hf = Heightfield::new(2, 1.0, 1.0, &StorageBackend::Memory).unwrap();
        for z in 0..hf.size() {
            for x in 0..hf.size() {
                hf.set_height(IVec2::new(x, z), (10 * x) as i16);
            }
        }
        hf
    }

    #[test]
    fn grid_corners_return_their_height() {
        let hf = sloped_heightfield();
        assert_eq!(height_at_lod(&hf, 0, IVec2::new(0, 0)), 0);
        assert_eq!(height_at_lod(&hf, 0, IVec2::new(4, 4)), 40);
        assert_eq!(height_at_lod(&hf, 3, IVec2::new(4, 0)), 40);
    }

    #[test]
    fn inactive_vertices_are_interpolated() {
        let mut hf = sloped_heightfield();
        // A bump that only exists at LOD 0.
        hf.set_height(IVec2::new(2, 2), 100);
        hf.activate(IVec2::new(2, 2), 0);

        // Planar slope across the coarse triangle.
        assert_eq!(height_at_lod(&hf, 1, IVec2::new(2, 2)), 20);
        assert_eq!(height_at_lod(&hf, 1, IVec2::new(1, 3)), 10);
        assert_eq!(height_at_lod(&hf, 1, IVec2::new(3, 1)), 30);

        // At LOD 0 the bump vertex is present.
        assert_eq!(height_at_lod(&hf, 0, IVec2::new(2, 2)), 100);
        // (1, 1) lies on the edge from (0, 0) to the bump; its own vertex is inactive.
        assert_eq!(height_at_lod(&hf, 0, IVec2::new(1, 1)), 50);
    }

    #[test]
    fn flat_heightfield_is_flat_at_every_lod() {
        let mut hf = Heightfield::new(3, 1.0, 1.0, &StorageBackend::Memory).unwrap();
        for z in 0..hf.size() {
            for x in 0..hf.size() {
                hf.set_height(IVec2::new(x, z), -7);
            }
        }
        for level in 0..4 {
            for z in 0..hf.size() {
                for x in 0..hf.size() {
                    assert_eq!(height_at_lod(&hf, level, IVec2::new(x, z)), -7);
                }
            }
        }
    }
}
