//! Dirty tracking
//!
//! Every spatial carries a set of pending invalidations. Changing a spatial
//! raises a [`DirtyType`] event, which sets marks on the spatial itself and
//! propagates them to ancestors and descendants:
//!
//! | Event               | Upward (ancestors) | Downward (descendants)            |
//! |---------------------|--------------------|-----------------------------------|
//! | Transform           | Bounding           | Transform, Bounding               |
//! | RenderState         | -                  | RenderState                       |
//! | Bounding            | Bounding           | -                                 |
//! | Attached            | Bounding           | Transform, RenderState, Bounding  |
//! | Detached, Destroyed | Bounding           | -                                 |
//!
//! Setting a mark is idempotent. Marks are consumed by the geometric update
//! pass; listeners only observe the event and can stop the *notification*
//! from travelling further up, never the marks themselves.

use crate::foundation::collections::SpatialKey;

/// Kind of change raised against a spatial
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirtyType {
    /// Local transform changed
    Transform,
    /// Bounds changed
    Bounding,
    /// Render state overrides changed
    RenderState,
    /// Spatial was attached to a parent
    Attached,
    /// Spatial was detached from its parent
    Detached,
    /// Spatial was destroyed
    Destroyed,
}

bitflags::bitflags! {
    /// Set of pending invalidations on one spatial
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DirtyMarks: u8 {
        /// World transform must be recomputed
        const TRANSFORM = 1 << 0;
        /// World bound must be recomputed
        const BOUNDING = 1 << 1;
        /// Effective render states must be resolved
        const RENDER_STATE = 1 << 2;
        /// Attached since the last update
        const ATTACHED = 1 << 3;
        /// Detached since the last update
        const DETACHED = 1 << 4;
        /// Destroyed (only observable on the event, the spatial is gone)
        const DESTROYED = 1 << 5;

        /// Marks consumed by the geometric update pass
        const RECOMPUTE =
            Self::TRANSFORM.bits() | Self::BOUNDING.bits() | Self::RENDER_STATE.bits();
        /// Marks recording a structural change
        const STRUCTURAL = Self::ATTACHED.bits() | Self::DETACHED.bits() | Self::DESTROYED.bits();
    }
}

impl DirtyType {
    /// Mark recorded on the spatial the event is raised for
    pub const fn mark(self) -> DirtyMarks {
        match self {
            DirtyType::Transform => DirtyMarks::TRANSFORM,
            DirtyType::Bounding => DirtyMarks::BOUNDING,
            DirtyType::RenderState => DirtyMarks::RENDER_STATE,
            DirtyType::Attached => DirtyMarks::ATTACHED,
            DirtyType::Detached => DirtyMarks::DETACHED,
            DirtyType::Destroyed => DirtyMarks::DESTROYED,
        }
    }

    /// Marks set on the spatial and every ancestor
    pub const fn upward(self) -> DirtyMarks {
        match self {
            DirtyType::RenderState => DirtyMarks::empty(),
            DirtyType::Transform
            | DirtyType::Bounding
            | DirtyType::Attached
            | DirtyType::Detached
            | DirtyType::Destroyed => DirtyMarks::BOUNDING,
        }
    }

    /// Marks set on the spatial and every descendant
    pub const fn downward(self) -> DirtyMarks {
        match self {
            DirtyType::Transform => DirtyMarks::TRANSFORM.union(DirtyMarks::BOUNDING),
            DirtyType::RenderState => DirtyMarks::RENDER_STATE,
            DirtyType::Attached => DirtyMarks::RECOMPUTE,
            DirtyType::Bounding | DirtyType::Detached | DirtyType::Destroyed => DirtyMarks::empty(),
        }
    }
}

/// Observer notified when a spatial at or below its owner becomes dirty
///
/// Returning `true` consumes the notification so ancestors' listeners are not
/// called. The marks themselves always propagate.
pub trait DirtyEventListener: Send + Sync {
    /// Called with the spatial that raised the event
    fn spatial_dirty(&self, spatial: SpatialKey, dirty: DirtyType) -> bool;
}

impl<F> DirtyEventListener for F
where
    F: Fn(SpatialKey, DirtyType) -> bool + Send + Sync,
{
    fn spatial_dirty(&self, spatial: SpatialKey, dirty: DirtyType) -> bool {
        self(spatial, dirty)
    }
}
