//! Error types for scene graph and buffer operations

use crate::foundation::collections::SpatialKey;
use thiserror::Error;

/// Result type for scene operations
pub type SceneResult<T> = Result<T, SceneError>;

/// Errors reported synchronously by scene graph and buffer calls
///
/// Absent GPU ids are not errors; lookups return `None` instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SceneError {
    /// A caller passed a value outside its contract (non-positive GPU id,
    /// unknown section index)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Primitive or vertex lookup beyond the current counts
    #[error("{what} index {index} out of bounds (count is {count})")]
    OutOfBounds {
        /// What was being indexed
        what: &'static str,
        /// Requested index
        index: usize,
        /// Number of valid entries
        count: usize,
    },

    /// The key does not name a live spatial in this graph
    #[error("Unknown spatial: {0:?}")]
    UnknownSpatial(SpatialKey),

    /// A node operation was requested on a mesh
    #[error("Spatial {0:?} is not a node")]
    NotANode(SpatialKey),

    /// A mesh operation was requested on a node
    #[error("Spatial {0:?} is not a mesh")]
    NotAMesh(SpatialKey),

    /// Attaching would make a spatial its own ancestor
    #[error("Attaching {child:?} under {parent:?} would create a cycle")]
    HierarchyCycle {
        /// Intended parent
        parent: SpatialKey,
        /// Intended child
        child: SpatialKey,
    },
}
