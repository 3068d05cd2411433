//! Bounding sphere

use super::{points_of, Bound, BoundingVolume, CONTAINMENT_EPSILON};
use crate::foundation::math::{Point3, Transform};
use serde::{Deserialize, Serialize};

/// Sphere defined by center and radius
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingSphere {
    /// Center of the sphere
    pub center: Point3,
    /// Radius, never negative
    pub radius: f32,
}

impl Default for BoundingSphere {
    fn default() -> Self {
        Self::new(Point3::origin(), 0.0)
    }
}

impl BoundingSphere {
    /// Create a sphere from center and radius
    pub fn new(center: Point3, radius: f32) -> Self {
        Self {
            center,
            radius: radius.abs(),
        }
    }

    /// Grow to contain another sphere
    fn merge_sphere(&mut self, other: &BoundingSphere) {
        let offset = other.center - self.center;
        let distance = offset.magnitude();

        if distance + other.radius <= self.radius {
            return;
        }
        if distance + self.radius <= other.radius {
            *self = other.clone();
            return;
        }

        let radius = (distance + self.radius + other.radius) * 0.5;
        // distance > 0 here, otherwise one sphere would contain the other
        self.center += offset * ((radius - self.radius) / distance);
        self.radius = radius;
    }
}

impl BoundingVolume for BoundingSphere {
    fn compute_from_points(&mut self, points: &[f32]) {
        let mut iter = points_of(points).peekable();
        let Some(first) = iter.peek().copied() else {
            *self = Self::default();
            return;
        };

        let (min, max) = iter.fold((first, first), |(min, max), p| (min.inf(&p), max.sup(&p)));
        let center = nalgebra::center(&min, &max);
        let radius = points_of(points)
            .map(|p| (p - center).magnitude())
            .fold(0.0_f32, f32::max);

        self.center = center;
        self.radius = radius;
    }

    fn transform(&self, transform: &Transform) -> Bound {
        Bound::Sphere(BoundingSphere::new(
            transform.apply_forward(&self.center),
            self.radius * transform.max_scale(),
        ))
    }

    fn merge_local(&mut self, other: &Bound) {
        match other {
            Bound::Sphere(sphere) => self.merge_sphere(sphere),
            Bound::Box(_) => self.merge_sphere(&other.to_sphere()),
        }
    }

    fn center(&self) -> Point3 {
        self.center
    }

    fn contains_point(&self, point: &Point3) -> bool {
        (point - self.center).magnitude()
            <= self.radius + CONTAINMENT_EPSILON * self.radius.max(1.0)
    }

    fn contains_bound(&self, other: &Bound) -> bool {
        match other {
            Bound::Sphere(sphere) => {
                (sphere.center - self.center).magnitude() + sphere.radius
                    <= self.radius + CONTAINMENT_EPSILON * self.radius.max(1.0)
            }
            Bound::Box(aabb) => aabb.corners().iter().all(|corner| self.contains_point(corner)),
        }
    }
}
