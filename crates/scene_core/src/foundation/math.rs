//! Math utilities and types
//!
//! Provides the vector, matrix and transform types the scene graph is built on.

use serde::{Deserialize, Serialize};

pub use nalgebra::{
    Vector3,
    Matrix3, Matrix4,
    Quaternion,
    Unit,
};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// Transform representing translation, rotation, and scale
///
/// Composition follows the usual scene graph convention: a child's world
/// transform is `parent_world.combine(&child_local)`.
///
/// A non-uniformly scaled parent over a rotated child produces shear, which
/// rotation and scale cannot express. Such results carry a general `linear`
/// part that takes precedence over `rotation` and `scale`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// Translation in 3D space
    pub translation: Vec3,

    /// Rotation quaternion
    pub rotation: Quat,

    /// Scale factors
    pub scale: Vec3,

    /// General 3x3 linear part; when set, `rotation` and `scale` are only
    /// the component-wise approximation of it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linear: Option<Mat3>,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::zeros(),
            rotation: Quat::identity(),
            scale: Vec3::new(1.0, 1.0, 1.0),
            linear: None,
        }
    }
}

impl Transform {
    /// Create a new identity transform
    pub fn identity() -> Self {
        Self::default()
    }

    /// Create a transform from a translation vector
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Default::default()
        }
    }

    /// Create a transform with translation and rotation
    pub fn from_translation_rotation(translation: Vec3, rotation: Quat) -> Self {
        Self {
            translation,
            rotation,
            ..Default::default()
        }
    }

    /// Set the rotation from a 3x3 rotation matrix
    ///
    /// The matrix is orthonormalized on the way in, so a slightly drifted
    /// matrix still yields a valid rotation.
    pub fn set_rotation_matrix(&mut self, matrix: &Mat3) {
        let rotation = nalgebra::Rotation3::from_matrix(matrix);
        self.rotation = Quat::from_rotation_matrix(&rotation);
        self.linear = None;
    }

    /// Whether the transform is rotation and scale only, with no shear
    pub fn is_rotation_scale(&self) -> bool {
        self.linear.is_none()
    }

    /// Whether all three scale components are equal
    pub fn has_uniform_scale(&self) -> bool {
        self.linear.is_none() && self.scale.x == self.scale.y && self.scale.y == self.scale.z
    }

    /// The 3x3 matrix applied before translation
    pub fn linear_matrix(&self) -> Mat3 {
        self.linear.unwrap_or_else(|| {
            self.rotation.to_rotation_matrix().into_inner() * Mat3::from_diagonal(&self.scale)
        })
    }

    /// Whether this transform leaves every point unchanged
    pub fn is_identity(&self) -> bool {
        self.translation == Vec3::zeros()
            && self.linear.map_or(
                self.scale == Vec3::new(1.0, 1.0, 1.0) && self.rotation == Quat::identity(),
                |linear| linear == Mat3::identity(),
            )
    }

    /// Largest factor by which this transform stretches a length
    pub fn max_scale(&self) -> f32 {
        match &self.linear {
            Some(linear) => linear.singular_values().max(),
            None => self.scale.x.abs().max(self.scale.y.abs()).max(self.scale.z.abs()),
        }
    }

    /// Convert to a transformation matrix (TRS order)
    pub fn to_matrix(&self) -> Mat4 {
        match &self.linear {
            Some(linear) => Mat4::new_translation(&self.translation) * linear.to_homogeneous(),
            None => {
                Mat4::new_translation(&self.translation)
                    * self.rotation.to_homogeneous()
                    * Mat4::new_nonuniform_scaling(&self.scale)
            }
        }
    }

    /// Apply this transform to a point (scale, then rotate, then translate)
    pub fn apply_forward(&self, point: &Point3) -> Point3 {
        match &self.linear {
            Some(linear) => Point3::from(self.translation + linear * point.coords),
            None => Point3::from(
                self.translation + self.rotation * point.coords.component_mul(&self.scale),
            ),
        }
    }

    /// Map a point from the space this transform produces back to its input space
    pub fn apply_inverse(&self, point: &Point3) -> Point3 {
        let offset = point.coords - self.translation;
        match &self.linear {
            Some(linear) => Point3::from(inverse_or_pseudo(linear) * offset),
            None => {
                let local = self.rotation.inverse() * offset;
                Point3::from(local.component_div(&self.scale))
            }
        }
    }

    /// Map a normal through this transform (inverse transpose), unnormalized
    pub fn apply_normal(&self, normal: &Vec3) -> Vec3 {
        match &self.linear {
            Some(linear) => inverse_or_pseudo(linear).transpose() * normal,
            None => self.rotation * normal.component_div(&self.scale),
        }
    }

    /// Combine this transform (as parent) with another (as child)
    ///
    /// Stays in rotation and scale form when the parent scale is uniform or
    /// the child is unrotated. Anything else yields a general linear part.
    pub fn combine(&self, child: &Transform) -> Transform {
        let rotation_scale = self.is_rotation_scale()
            && child.is_rotation_scale()
            && (self.has_uniform_scale() || child.rotation == Quat::identity());
        let parent_linear = self.linear_matrix();
        let translation = self.translation + parent_linear * child.translation;
        let rotation = self.rotation * child.rotation;
        let scale = self.scale.component_mul(&child.scale);

        if rotation_scale {
            Transform {
                translation,
                rotation,
                scale,
                linear: None,
            }
        } else {
            Transform {
                translation,
                rotation,
                scale,
                linear: Some(parent_linear * child.linear_matrix()),
            }
        }
    }
}

fn inverse_or_pseudo(matrix: &Mat3) -> Mat3 {
    matrix
        .try_inverse()
        .or_else(|| matrix.pseudo_inverse(f32::EPSILON).ok())
        .unwrap_or_else(Mat3::zeros)
}

/// RGBA color with float components in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorRgba {
    /// Red
    pub r: f32,
    /// Green
    pub g: f32,
    /// Blue
    pub b: f32,
    /// Alpha
    pub a: f32,
}

impl ColorRgba {
    /// Opaque white
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);
    /// Opaque black
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0, 1.0);

    /// Create a color from components
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Components as an array
    pub const fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl Default for ColorRgba {
    fn default() -> Self {
        Self::WHITE
    }
}
