//! Time-driven mutators attached to spatials

use super::SceneGraph;
use crate::foundation::collections::SpatialKey;

/// Runs once per geometric update of the spatial it is attached to, before
/// that spatial's transform is recomputed
///
/// Controllers get mutable access to the whole graph so they can move their
/// target, change render states or attach more controllers. Dirty marks set
/// here are consumed by the same update pass.
pub trait Controller: Send + Sync {
    /// Advance by `time` seconds
    fn update(&mut self, time: f64, scene: &mut SceneGraph, target: SpatialKey);

    /// Inactive controllers are skipped
    fn is_active(&self) -> bool {
        true
    }
}

/// Controller backed by a closure
pub struct FnController<F> {
    update: F,
    active: bool,
}

impl<F> FnController<F>
where
    F: FnMut(f64, &mut SceneGraph, SpatialKey) + Send + Sync,
{
    /// Wrap `update` as an active controller
    pub fn new(update: F) -> Self {
        Self { update, active: true }
    }

    /// Enable or disable
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }
}

impl<F> Controller for FnController<F>
where
    F: FnMut(f64, &mut SceneGraph, SpatialKey) + Send + Sync,
{
    fn update(&mut self, time: f64, scene: &mut SceneGraph, target: SpatialKey) {
        (self.update)(time, scene, target);
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

impl<F> std::fmt::Debug for FnController<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnController").field("active", &self.active).finish()
    }
}
