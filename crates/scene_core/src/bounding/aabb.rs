//! Axis-aligned bounding box

use super::{points_of, Bound, BoundingSphere, BoundingVolume, CONTAINMENT_EPSILON};
use crate::foundation::math::{Point3, Transform, Vec3};
use serde::{Deserialize, Serialize};

/// Axis-Aligned Bounding Box
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Minimum corner of the bounding box
    pub min: Point3,
    /// Maximum corner of the bounding box
    pub max: Point3,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::new(Point3::origin(), Point3::origin())
    }
}

impl BoundingBox {
    /// Create a new box from two corners (in any order)
    pub fn new(a: Point3, b: Point3) -> Self {
        Self {
            min: a.inf(&b),
            max: a.sup(&b),
        }
    }

    /// Create a box centered at a point with given half extents
    pub fn from_center_extents(center: Point3, extents: Vec3) -> Self {
        let extents = extents.abs();
        Self::new(center - extents, center + extents)
    }

    /// Smallest box around a sphere
    pub fn from_sphere(sphere: &BoundingSphere) -> Self {
        Self::from_center_extents(sphere.center, Vec3::repeat(sphere.radius))
    }

    /// Get the extents (half-size) of the box
    pub fn half_extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// The eight corners of the box
    pub fn corners(&self) -> [Point3; 8] {
        let (lo, hi) = (self.min, self.max);
        [
            Point3::new(lo.x, lo.y, lo.z),
            Point3::new(hi.x, lo.y, lo.z),
            Point3::new(lo.x, hi.y, lo.z),
            Point3::new(hi.x, hi.y, lo.z),
            Point3::new(lo.x, lo.y, hi.z),
            Point3::new(hi.x, lo.y, hi.z),
            Point3::new(lo.x, hi.y, hi.z),
            Point3::new(hi.x, hi.y, hi.z),
        ]
    }

    fn slack(&self) -> f32 {
        CONTAINMENT_EPSILON * self.half_extents().amax().max(1.0)
    }
}

impl BoundingVolume for BoundingBox {
    fn compute_from_points(&mut self, points: &[f32]) {
        let mut iter = points_of(points);
        let Some(first) = iter.next() else {
            *self = Self::default();
            return;
        };
        let (min, max) = iter.fold((first, first), |(min, max), p| (min.inf(&p), max.sup(&p)));
        self.min = min;
        self.max = max;
    }

    fn transform(&self, transform: &Transform) -> Bound {
        let mut corners = self.corners().into_iter().map(|c| transform.apply_forward(&c));
        // corners() always yields eight points
        let first = corners.next().unwrap_or_else(Point3::origin);
        let (min, max) = corners.fold((first, first), |(min, max), p| (min.inf(&p), max.sup(&p)));
        Bound::Box(BoundingBox { min, max })
    }

    fn merge_local(&mut self, other: &Bound) {
        let other = other.to_box();
        self.min = self.min.inf(&other.min);
        self.max = self.max.sup(&other.max);
    }

    fn center(&self) -> Point3 {
        nalgebra::center(&self.min, &self.max)
    }

    fn contains_point(&self, point: &Point3) -> bool {
        let slack = self.slack();
        (0..3).all(|i| point[i] >= self.min[i] - slack && point[i] <= self.max[i] + slack)
    }

    fn contains_bound(&self, other: &Bound) -> bool {
        let other = other.to_box();
        self.contains_point(&other.min) && self.contains_point(&other.max)
    }
}
