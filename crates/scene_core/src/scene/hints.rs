//! Scene hints
//!
//! Per-spatial settings that are inherited from the nearest ancestor which
//! sets them. A hint left at `Inherit` all the way to the root resolves to the
//! documented default for that hint.

use serde::{Deserialize, Serialize};

/// Culling behavior when drawing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CullHint {
    /// Use the parent's hint
    #[default]
    Inherit,
    /// Test against the view frustum (root default)
    Dynamic,
    /// Never draw
    Always,
    /// Always draw, skipping the frustum test
    Never,
}

/// How normals are treated when the world transform scales geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum NormalsMode {
    /// Use the parent's hint
    #[default]
    Inherit,
    /// Normalize only when the world transform scales (root default)
    NormalizeIfScaled,
    /// Always normalize
    AlwaysNormalize,
    /// Rescale uniformly scaled normals
    UseProvided,
    /// Do not send normals at all
    Off,
}

/// How light states found on the ancestor chain combine at a mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LightCombineMode {
    /// Use the parent's hint
    #[default]
    Inherit,
    /// No lighting
    Off,
    /// Accumulate from the root down (root default)
    CombineFirst,
    /// Accumulate from the nearest state up
    CombineClosest,
    /// Accumulate from the nearest state up, stopping at a disabled state
    CombineClosestEnabled,
    /// Use the nearest light state only
    Replace,
}

/// How a mesh submits geometry to the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DataMode {
    /// Use the parent's hint
    #[default]
    Inherit,
    /// Client-side arrays
    Arrays,
    /// One GPU buffer per attribute
    Vbo,
    /// One interleaved GPU buffer for all attributes
    VboInterleaved,
}

/// Cached result of the last frustum test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum FrustumIntersect {
    /// Entirely outside the frustum
    Outside = 0,
    /// Entirely inside the frustum
    Inside = 1,
    /// Partially inside, or not yet tested
    #[default]
    Intersects = 2,
}

impl FrustumIntersect {
    pub(crate) const fn from_u8(value: u8) -> Self {
        match value {
            0 => FrustumIntersect::Outside,
            1 => FrustumIntersect::Inside,
            _ => FrustumIntersect::Intersects,
        }
    }
}

bitflags::bitflags! {
    /// Which picking queries a spatial takes part in
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PickingHints: u8 {
        /// Included in ray picking
        const PICKABLE = 1 << 0;
        /// Included in collision queries
        const COLLIDABLE = 1 << 1;
    }
}

impl Default for PickingHints {
    fn default() -> Self {
        PickingHints::all()
    }
}
