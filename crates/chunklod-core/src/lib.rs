//! Foundations shared by the chunklod crates: hash map aliases, quadtree arithmetic, bounding boxes and timing.

pub mod geometry;
pub mod quadtree;
pub mod work_timer;

use ahash::{AHashMap, AHashSet};
pub type SmallKeyHashMap<K, V> = AHashMap<K, V>;
pub type SmallKeyHashSet<K> = AHashSet<K>;

// Re-exports.
pub use approx;
pub use glam;
pub use static_assertions;
