use glam::Vec3A;

/// Axis-aligned bounding box that grows to contain every point added to it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub minimum: Vec3A,
    pub maximum: Vec3A,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::empty()
    }
}

impl Aabb {
    /// Contains nothing. Adding any point makes the box degenerate around that point.
    pub fn empty() -> Self {
        Self {
            minimum: Vec3A::splat(f32::MAX),
            maximum: Vec3A::splat(f32::MIN),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.minimum.cmpgt(self.maximum).any()
    }

    pub fn add_point(&mut self, p: Vec3A) {
        self.minimum = self.minimum.min(p);
        self.maximum = self.maximum.max(p);
    }

    pub fn center(&self) -> Vec3A {
        (self.minimum + self.maximum) * 0.5
    }

    /// Half of the box's shape on each axis.
    pub fn extent(&self) -> Vec3A {
        (self.maximum - self.minimum) * 0.5
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
