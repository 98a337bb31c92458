//! Bounding boxes, rays and the collidable set the movement controller
//! samples against.

use cgmath::{ElementWise, Matrix4, Vector3, Vector4};

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Aabb {
    pub min: Vector3<f32>,
    pub max: Vector3<f32>,
}

impl Aabb {
    pub fn new(min: Vector3<f32>, max: Vector3<f32>) -> Self {
        Self { min, max }
    }

    pub fn from_points(points: impl IntoIterator<Item = Vector3<f32>>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = points.next()?;
        Some(points.fold(Self::new(first, first), |acc, p| Self {
            min: Vector3::new(acc.min.x.min(p.x), acc.min.y.min(p.y), acc.min.z.min(p.z)),
            max: Vector3::new(acc.max.x.max(p.x), acc.max.y.max(p.y), acc.max.z.max(p.z)),
        }))
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb::from_points([self.min, self.max, other.min, other.max]).unwrap_or(*self)
    }

    pub fn center(&self) -> Vector3<f32> {
        (self.min + self.max) * 0.5
    }

    pub fn contains(&self, p: Vector3<f32>) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    /// Box enclosing all eight transformed corners.
    pub fn transformed(&self, m: &Matrix4<f32>) -> Aabb {
        let corners = (0..8).map(|i| {
            let x = if i & 1 == 0 { self.min.x } else { self.max.x };
            let y = if i & 2 == 0 { self.min.y } else { self.max.y };
            let z = if i & 4 == 0 { self.min.z } else { self.max.z };
            (*m * Vector4::new(x, y, z, 1.0)).truncate()
        });
        Aabb::from_points(corners).unwrap_or(*self)
    }
}

/// Slab test. Returns the distance along `dir` to the first intersection in
/// front of the origin, or `None` on a miss. An origin inside the box yields
/// the exit distance.
pub fn intersect_aabb(origin: Vector3<f32>, dir: Vector3<f32>, aabb: &Aabb) -> Option<f32> {
    const EPSILON: f32 = 1e-8;

    let inv = |d: f32| {
        if d.abs() < EPSILON {
            1.0 / EPSILON.copysign(d)
        } else {
            1.0 / d
        }
    };
    let inv_dir = Vector3::new(inv(dir.x), inv(dir.y), inv(dir.z));

    let t_min = (aabb.min - origin).mul_element_wise(inv_dir);
    let t_max = (aabb.max - origin).mul_element_wise(inv_dir);

    let t_near = t_min.x.min(t_max.x).max(t_min.y.min(t_max.y)).max(t_min.z.min(t_max.z));
    let t_far = t_min.x.max(t_max.x).min(t_min.y.max(t_max.y)).min(t_min.z.max(t_max.z));

    if t_near > t_far || t_far < 0.0 {
        return None;
    }
    if t_near < 0.0 { Some(t_far) } else { Some(t_near) }
}

/// Flat list of solid boxes in world space. The version changes whenever the
/// environment adds or removes geometry so consumers can refresh cached copies.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollidableSet {
    boxes: Vec<Aabb>,
    version: u64,
}

impl CollidableSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&mut self, boxes: Vec<Aabb>) {
        self.boxes = boxes;
        self.version += 1;
    }

    pub fn clear(&mut self) {
        if !self.boxes.is_empty() {
            self.boxes.clear();
            self.version += 1;
        }
    }

    pub fn boxes(&self) -> &[Aabb] {
        &self.boxes
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    /// Nearest hit along the ray over all boxes.
    pub fn cast(&self, origin: Vector3<f32>, dir: Vector3<f32>) -> Option<f32> {
        self.boxes
            .iter()
            .filter_map(|aabb| intersect_aabb(origin, dir, aabb))
            .min_by(|a, b| a.total_cmp(b))
    }
}

pub const RING_RAYS: usize = 8;

/// Casts [`RING_RAYS`] rays around the y axis, starting at `heading` and
/// stepping 45 degrees each time. Entry `k` holds the hit distance of the ray
/// rotated by `k * 45` degrees.
pub fn sample_ring(
    set: &CollidableSet,
    origin: Vector3<f32>,
    heading: Vector3<f32>,
) -> [Option<f32>; RING_RAYS] {
    let mut hits = [None; RING_RAYS];
    for (k, hit) in hits.iter_mut().enumerate() {
        *hit = set.cast(origin, ring_direction(heading, k));
    }
    hits
}

pub fn ring_direction(heading: Vector3<f32>, k: usize) -> Vector3<f32> {
    let angle = std::f32::consts::FRAC_PI_4 * k as f32;
    let (sin, cos) = angle.sin_cos();
    Vector3::new(
        heading.x * cos - heading.z * sin,
        0.0,
        heading.x * sin + heading.z * cos,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::InnerSpace;

    fn unit_box_at(x: f32, z: f32) -> Aabb {
        Aabb::new(
            Vector3::new(x - 0.5, 0.0, z - 0.5),
            Vector3::new(x + 0.5, 2.0, z + 0.5),
        )
    }

    #[test]
    fn from_points_and_union() {
        let a = Aabb::from_points([Vector3::new(1.0, 0.0, 0.0), Vector3::new(-1.0, 2.0, 3.0)])
            .unwrap();
        assert_eq!(a.min, Vector3::new(-1.0, 0.0, 0.0));
        assert_eq!(a.max, Vector3::new(1.0, 2.0, 3.0));
        let b = Aabb::new(Vector3::new(5.0, 5.0, 5.0), Vector3::new(6.0, 6.0, 6.0));
        let u = a.union(&b);
        assert_eq!(u.min, a.min);
        assert_eq!(u.max, b.max);
        assert!(Aabb::from_points(std::iter::empty()).is_none());
    }

    #[test]
    fn ray_hits_box_in_front() {
        let t = intersect_aabb(
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(0.0, 0.0, -1.0),
            &unit_box_at(0.0, -3.0),
        );
        assert!((t.unwrap() - 2.5).abs() < 1e-5);
    }

    #[test]
    fn ray_misses_box_behind() {
        let t = intersect_aabb(
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(0.0, 0.0, 1.0),
            &unit_box_at(0.0, -3.0),
        );
        assert_eq!(t, None);
    }

    #[test]
    fn origin_inside_reports_exit() {
        let t = intersect_aabb(
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            &unit_box_at(0.0, 0.0),
        );
        assert!((t.unwrap() - 0.5).abs() < 1e-5);
    }

    #[test]
    fn axis_parallel_ray_outside_slab_misses() {
        let t = intersect_aabb(
            Vector3::new(0.0, 5.0, 0.0),
            Vector3::new(0.0, 0.0, -1.0),
            &unit_box_at(0.0, -3.0),
        );
        assert_eq!(t, None);
    }

    #[test]
    fn transformed_box_moves_with_matrix() {
        let moved = unit_box_at(0.0, 0.0)
            .transformed(&Matrix4::from_translation(Vector3::new(10.0, 0.0, 0.0)));
        assert_eq!(moved.center(), Vector3::new(10.0, 1.0, 0.0));
    }

    #[test]
    fn ring_covers_full_circle() {
        let heading = Vector3::new(0.0, 0.0, -1.0);
        let dirs: Vec<_> = (0..RING_RAYS).map(|k| ring_direction(heading, k)).collect();
        assert!((dirs[0] - heading).magnitude2() < 1e-10);
        assert!((dirs[4] + heading).magnitude2() < 1e-10);
        let sum = dirs.iter().fold(Vector3::new(0.0, 0.0, 0.0), |acc, d| acc + *d);
        assert!(sum.magnitude2() < 1e-8);
    }

    #[test]
    fn ring_sampling_reports_nearest_per_ray() {
        let mut set = CollidableSet::new();
        set.replace(vec![unit_box_at(0.0, -3.0), unit_box_at(0.0, 3.0)]);
        let hits = sample_ring(&set, Vector3::new(0.0, 1.0, 0.0), Vector3::new(0.0, 0.0, -1.0));
        assert!((hits[0].unwrap() - 2.5).abs() < 1e-5);
        assert!((hits[4].unwrap() - 2.5).abs() < 1e-5);
        assert_eq!(hits[2], None);
    }

    #[test]
    fn version_bumps_on_change() {
        let mut set = CollidableSet::new();
        let v0 = set.version();
        set.replace(vec![unit_box_at(0.0, 0.0)]);
        assert!(set.version() > v0);
        let v1 = set.version();
        set.clear();
        assert!(set.version() > v1);
        let v2 = set.version();
        set.clear();
        assert_eq!(set.version(), v2);
    }

}
