//! # Scene Core
//!
//! Traversal and state-resolution core of a retained-mode 3D scene graph.
//!
//! ## Features
//!
//! - **Dirty tracking**: transform, bound and render state invalidations
//!   propagate up and down the tree and are consumed by one update pass
//! - **Render state inheritance**: per-type override stacks with replaceable
//!   extractors (nearest wins, blend and light combination)
//! - **Bounding volumes**: spheres and boxes that merge without shrinking
//! - **GPU buffer registry**: per-context buffer ids, expiry on drop and
//!   deferred deletion through per-context task queues
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scene_core::prelude::*;
//! use std::sync::Arc;
//!
//! fn main() -> Result<(), SceneError> {
//!     let mut scene = SceneGraph::new();
//!     let root = scene.create_node("root");
//!     let tri = scene.create_mesh(
//!         "triangle",
//!         MeshData::from_vertices(vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]),
//!     );
//!     scene.attach_child(root, tri)?;
//!     scene.set_translation(tri, Vec3::new(1.0, 0.0, 0.0))?;
//!     scene.update_geometric_state(root, 0.016)?;
//!
//!     let tasks = Arc::new(TaskQueueManager::new(Default::default()));
//!     let registry = Arc::new(BufferRegistry::new(tasks));
//!     let mut renderer = HeadlessRenderer::new(registry);
//!     scene.draw(root, &mut renderer)?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod bounding;
pub mod buffer;
pub mod config;
pub mod error;
pub mod foundation;
pub mod render;
pub mod scene;

pub use error::{SceneError, SceneResult};

/// Common imports for scene users
pub mod prelude {
    pub use crate::{
        bounding::{Bound, BoundingBox, BoundingSphere, BoundingVolume},
        buffer::{BufferData, BufferRegistry, FloatBufferData, IndexBufferData},
        config::{Config, SceneConfig},
        error::{SceneError, SceneResult},
        foundation::{
            collections::SpatialKey,
            math::{ColorRgba, Point3, Quat, Transform, Vec3},
        },
        render::{ContextKey, HeadlessRenderer, RenderState, Renderer, StateType, TaskQueueManager},
        scene::{
            Controller, CullHint, DataMode, DirtyType, FnController, LightCombineMode, Mesh,
            MeshData, NormalsMode, SceneGraph, Spatial, TraversalOrder,
        },
    };
}
