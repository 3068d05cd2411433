//! Bounding volumes
//!
//! The scene graph consumes bounds only through the [`BoundingVolume`]
//! contract: compute from points, transform, merge, clone. Merging never
//! shrinks: the result always contains every input.
//!
//! Two concrete volumes are provided. [`Bound`] is the closed set stored on
//! spatials; merging keeps the type of the receiving volume and converts the
//! other one as needed.

mod aabb;
mod sphere;

pub use aabb::BoundingBox;
pub use sphere::BoundingSphere;

use crate::foundation::math::{Point3, Transform};
use serde::{Deserialize, Serialize};

/// Slack used by containment checks to absorb float rounding
pub const CONTAINMENT_EPSILON: f32 = 1e-4;

/// Contract every bounding volume honors
pub trait BoundingVolume {
    /// Fit the volume around packed `xyz` triples
    fn compute_from_points(&mut self, points: &[f32]);

    /// Volume containing this one after applying `transform`
    fn transform(&self, transform: &Transform) -> Bound;

    /// Grow this volume so it also contains `other`
    fn merge_local(&mut self, other: &Bound);

    /// Center of the volume
    fn center(&self) -> Point3;

    /// Whether `point` lies inside (with [`CONTAINMENT_EPSILON`] slack)
    fn contains_point(&self, point: &Point3) -> bool;

    /// Whether `other` lies entirely inside (with [`CONTAINMENT_EPSILON`] slack)
    fn contains_bound(&self, other: &Bound) -> bool;
}

/// Bounding volume stored on spatials
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Bound {
    /// Sphere volume
    Sphere(BoundingSphere),
    /// Axis-aligned box volume
    Box(BoundingBox),
}

impl Bound {
    /// Smallest sphere around this volume
    pub fn to_sphere(&self) -> BoundingSphere {
        match self {
            Bound::Sphere(sphere) => sphere.clone(),
            Bound::Box(aabb) => BoundingSphere::new(aabb.center(), aabb.half_extents().magnitude()),
        }
    }

    /// Smallest axis-aligned box around this volume
    pub fn to_box(&self) -> BoundingBox {
        match self {
            Bound::Box(aabb) => aabb.clone(),
            Bound::Sphere(sphere) => BoundingBox::from_sphere(sphere),
        }
    }
}

impl From<BoundingSphere> for Bound {
    fn from(sphere: BoundingSphere) -> Self {
        Bound::Sphere(sphere)
    }
}

impl From<BoundingBox> for Bound {
    fn from(aabb: BoundingBox) -> Self {
        Bound::Box(aabb)
    }
}

impl BoundingVolume for Bound {
    fn compute_from_points(&mut self, points: &[f32]) {
        match self {
            Bound::Sphere(sphere) => sphere.compute_from_points(points),
            Bound::Box(aabb) => aabb.compute_from_points(points),
        }
    }

    fn transform(&self, transform: &Transform) -> Bound {
        match self {
            Bound::Sphere(sphere) => sphere.transform(transform),
            Bound::Box(aabb) => aabb.transform(transform),
        }
    }

    fn merge_local(&mut self, other: &Bound) {
        match self {
            Bound::Sphere(sphere) => sphere.merge_local(other),
            Bound::Box(aabb) => aabb.merge_local(other),
        }
    }

    fn center(&self) -> Point3 {
        match self {
            Bound::Sphere(sphere) => sphere.center(),
            Bound::Box(aabb) => aabb.center(),
        }
    }

    fn contains_point(&self, point: &Point3) -> bool {
        match self {
            Bound::Sphere(sphere) => sphere.contains_point(point),
            Bound::Box(aabb) => aabb.contains_point(point),
        }
    }

    fn contains_bound(&self, other: &Bound) -> bool {
        match self {
            Bound::Sphere(sphere) => sphere.contains_bound(other),
            Bound::Box(aabb) => aabb.contains_bound(other),
        }
    }
}

/// Iterate packed `xyz` triples as points, ignoring a trailing partial triple
pub(crate) fn points_of(points: &[f32]) -> impl Iterator<Item = Point3> + '_ {
    points.chunks_exact(3).map(|p| Point3::new(p[0], p[1], p[2]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;

    #[test]
    fn test_mixed_merge_keeps_receiver_type() {
        let mut bound = Bound::Sphere(BoundingSphere::new(Point3::origin(), 1.0));
        let other = Bound::Box(BoundingBox::new(
            Point3::new(2.0, 2.0, 2.0),
            Point3::new(3.0, 3.0, 3.0),
        ));
        bound.merge_local(&other);

        assert!(matches!(bound, Bound::Sphere(_)));
        assert!(bound.contains_bound(&other));
        assert!(bound.contains_point(&Point3::new(-1.0, 0.0, 0.0)));
    }

    #[test]
    fn test_box_to_sphere_contains_corners() {
        let aabb = BoundingBox::new(Point3::new(-1.0, -2.0, -3.0), Point3::new(1.0, 2.0, 3.0));
        let sphere = Bound::Box(aabb.clone()).to_sphere();
        for corner in aabb.corners() {
            assert!(sphere.contains_point(&corner));
        }
        assert_eq!(sphere.center(), Point3::from(Vec3::zeros()));
    }
}
