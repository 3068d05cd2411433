//! Scene graph
//!
//! Spatials live in an arena owned by [`SceneGraph`]. Interior nodes own
//! their children through ordered key lists and meshes carry geometry. All
//! editing goes through the graph so dirty marks propagate; one
//! [`SceneGraph::update_geometric_state`] per frame consumes them and
//! [`SceneGraph::draw`] submits the result to a [`Renderer`](crate::render::Renderer).

pub mod controller;
pub mod dirty;
pub mod graph;
pub mod hints;
pub mod mesh;
pub mod mesh_data;
pub mod node;
pub mod spatial;
pub mod traversal;
pub mod update;

#[cfg(test)]
mod tests;

pub use controller::{Controller, FnController};
pub use dirty::{DirtyEventListener, DirtyMarks, DirtyType};
pub use graph::SceneGraph;
pub use hints::{CullHint, DataMode, FrustumIntersect, LightCombineMode, NormalsMode, PickingHints};
pub use mesh::Mesh;
pub use mesh_data::{IndexMode, InterleavedFormat, MeshData};
pub use spatial::{Spatial, SpatialKind};
pub use traversal::TraversalOrder;
