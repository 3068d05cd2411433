//! Arena keys used by the scene graph

pub use slotmap::SlotMap;

slotmap::new_key_type! {
    /// Stable handle to a spatial stored in a [`SceneGraph`](crate::scene::SceneGraph)
    ///
    /// Keys are generational: a key to a destroyed spatial never aliases a
    /// spatial created later.
    pub struct SpatialKey;
}

/// Arena of spatials keyed by [`SpatialKey`]
pub type SpatialArena<T> = SlotMap<SpatialKey, T>;
