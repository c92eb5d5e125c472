use crate::heightfield::Heightfield;

use chunklod_core::glam::IVec2;
use chunklod_core::quadtree::{EdgeDir, CHILD_SIGNS};
use smallvec::{smallvec, SmallVec};

/// Each child of a node, with the two edge midpoints of the parent that depend on it.
const CHILD_DEPENDENTS: [([i32; 2], [EdgeDir; 2]); 4] = [
    ([1, -1], [EdgeDir::East, EdgeDir::North]),
    ([-1, -1], [EdgeDir::North, EdgeDir::West]),
    ([-1, 1], [EdgeDir::West, EdgeDir::South]),
    ([1, 1], [EdgeDir::South, EdgeDir::East]),
];

/// Edge midpoints in the order they feed the center.
const CENTER_DEPENDENCIES: [EdgeDir; 4] = [
    EdgeDir::East,
    EdgeDir::North,
    EdgeDir::South,
    EdgeDir::West,
];

/// Raises activation levels so that, for every quadtree node, the center is at least as active as its edge midpoints and
/// each edge midpoint is at least as active as the child centers next to it.
///
/// Levels are swept from the finest nodes to the root, so dependencies accumulate bottom-up.
pub fn propagate_activation_levels(hf: &mut Heightfield) {
    for target_level in 0..hf.log_size() {
        // Neighbors share edge midpoints, so a second sweep catches values that arrived after a node was visited.
        propagate_at_level(hf, target_level);
        propagate_at_level(hf, target_level);
    }
}

/// Visits every node whose half edge length is `2^target_level`, in NW, NE, SW, SE order, and propagates its
/// dependencies.
pub fn propagate_at_level(hf: &mut Heightfield, target_level: u32) {
    let root = IVec2::splat(hf.size() >> 1);
    let mut stack: SmallVec<[(IVec2, u32); 64]> = smallvec![(root, hf.log_size() - 1)];
    while let Some((center, level)) = stack.pop() {
        if level > target_level {
            let quarter = (1 << level) >> 1;
            for sign in CHILD_SIGNS.iter().rev() {
                stack.push((center + *sign * quarter, level - 1));
            }
        } else {
            propagate_node(hf, center, level);
        }
    }
}

fn propagate_node(hf: &mut Heightfield, center: IVec2, level: u32) {
    let half = 1 << level;
    let quarter = half >> 1;

    if level > 0 {
        for (sign, edges) in CHILD_DEPENDENTS {
            let child = center + IVec2::from(sign) * quarter;
            if let Some(child_level) = hf.get_level(child) {
                for dir in edges {
                    hf.activate(center + dir.unit() * half, child_level);
                }
            }
        }
    }

    for dir in CENTER_DEPENDENCIES {
        if let Some(edge_level) = hf.get_level(center + dir.unit() * half) {
            hf.activate(center, edge_level);
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
pub(crate) mod test {
    use super::*;
    use crate::error_metric::activate_by_error;
    use crate::heightfield::Level;
    use crate::storage::StorageBackend;

    /// Walks the whole tree and returns every node center where a dependency is more active than its dependent.
    pub fn find_propagation_violations(hf: &Heightfield) -> Vec<IVec2> {
        let mut violations = Vec::new();
        let root = IVec2::splat(hf.size() >> 1);
        check_node(hf, root, hf.log_size() - 1, &mut violations);
        violations
    }

    fn check_node(
        hf: &Heightfield,
        center: IVec2,
        level: u32,
        violations: &mut Vec<IVec2>,
    ) -> Option<Level> {
        let half = 1 << level;
        let quarter = half >> 1;
        let edge = |dir: EdgeDir| hf.get_level(center + dir.unit() * half);

        if level > 0 {
            for (sign, edges) in CHILD_DEPENDENTS {
                let child = center + IVec2::from(sign) * quarter;
                let child_max = check_node(hf, child, level - 1, violations);
                if edges.iter().any(|&dir| child_max > edge(dir)) {
                    violations.push(center);
                }
            }
        }

        let edge_max = EdgeDir::ALL.iter().map(|&dir| edge(dir)).max().flatten();
        let c = hf.get_level(center);
        if edge_max > c {
            violations.push(center);
        }

        edge_max.max(c)
    }

    pub fn noisy_heightfield(log_size: u32, amplitude: i32) -> Heightfield {
        let mut hf = Heightfield::new(log_size, 1.0, 1.0, &StorageBackend::Memory).unwrap();
        for z in 0..hf.size() {
            for x in 0..hf.size() {
                let hash = (x.wrapping_mul(73_856_093) ^ z.wrapping_mul(19_349_663)) as u32;
                let noise = (hash % (2 * amplitude as u32 + 1)) as i32 - amplitude;
                hf.set_height(IVec2::new(x, z), noise as i16);
            }
        }
        hf
    }

    fn snapshot_levels(hf: &Heightfield) -> Vec<Option<Level>> {
        let mut levels = Vec::new();
        for z in 0..hf.size() {
            for x in 0..hf.size() {
                levels.push(hf.get_level(IVec2::new(x, z)));
            }
        }
        levels
    }

    #[test]
    fn deep_activation_reaches_root() {
        let mut hf = Heightfield::new(3, 1.0, 1.0, &StorageBackend::Memory).unwrap();
        hf.activate(IVec2::new(1, 1), 2);
        propagate_activation_levels(&mut hf);

        // North and west edges of the NW node, then its center.
        assert_eq!(hf.get_level(IVec2::new(2, 0)), Some(2));
        assert_eq!(hf.get_level(IVec2::new(0, 2)), Some(2));
        assert_eq!(hf.get_level(IVec2::new(2, 2)), Some(2));
        // Same for the root.
        assert_eq!(hf.get_level(IVec2::new(4, 0)), Some(2));
        assert_eq!(hf.get_level(IVec2::new(0, 4)), Some(2));
        assert_eq!(hf.get_level(IVec2::new(4, 4)), Some(2));
        assert_eq!(hf.live_vertices(), 7);
        // Unrelated vertices stay inactive.
        assert_eq!(hf.get_level(IVec2::new(7, 7)), None);
        assert!(find_propagation_violations(&hf).is_empty());
    }

    #[test]
    fn noisy_terrain_satisfies_invariant() {
        for log_size in 1..=6 {
            let mut hf = noisy_heightfield(log_size, 40);
            activate_by_error(&mut hf, 1.0);
            assert!(hf.live_vertices() > 0);
            propagate_activation_levels(&mut hf);
            let violations = find_propagation_violations(&hf);
            assert!(violations.is_empty(), "{:?}", violations);
        }
    }

    #[test]
    fn propagation_is_idempotent_after_convergence() {
        let mut hf = noisy_heightfield(5, 25);
        activate_by_error(&mut hf, 2.0);
        propagate_activation_levels(&mut hf);
        let before = snapshot_levels(&hf);
        let live_before = hf.live_vertices();

        propagate_activation_levels(&mut hf);
        assert_eq!(snapshot_levels(&hf), before);
        assert_eq!(hf.live_vertices(), live_before);
    }
}
