use nalgebra::Vector3;

/// Axis-aligned box in world space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Vector3<f32>,
    pub max: Vector3<f32>,
}

impl Aabb {
    pub fn new(min: Vector3<f32>, max: Vector3<f32>) -> Self {
        Aabb { min, max }
    }

    /// Box of `size` whose footprint is centered on `center` in x/z and whose
    /// vertical extent is `[center.y + base, center.y + base + size.y]`.
    pub fn from_footprint(center: Vector3<f32>, size: Vector3<f32>, base: f32) -> Self {
        let half = Vector3::new(size.x / 2.0, 0.0, size.z / 2.0);
        let min = Vector3::new(center.x - half.x, center.y + base, center.z - half.z);
        let max = Vector3::new(center.x + half.x, center.y + base + size.y, center.z + half.z);
        Aabb { min, max }
    }

    /// True unless the boxes are separated on some axis. Boxes that only
    /// share a face count as intersecting.
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x && self.max.x >= other.min.x &&
        self.min.y <= other.max.y && self.max.y >= other.min.y &&
        self.min.z <= other.max.z && self.max.z >= other.min.z
    }
}

/// Index of the first box in `others` overlapping `subject`.
pub fn first_hit<I>(subject: &Aabb, others: I) -> Option<usize>
where
    I: IntoIterator<Item = Aabb>,
{
    others.into_iter().position(|other| subject.intersects(&other))
}
