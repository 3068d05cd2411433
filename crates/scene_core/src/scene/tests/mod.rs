//! Scenarios spanning the graph, the resolver, the renderer seam and the
//! buffer registry

mod drawing;
mod render_states;

use crate::foundation::collections::SpatialKey;
use crate::scene::{MeshData, SceneGraph};

/// Two-triangle quad in the XY plane, indexed
fn quad(graph: &mut SceneGraph, name: &str) -> SpatialKey {
    let mut data = MeshData::from_vertices(vec![
        -1.0, -1.0, 0.0, //
        1.0, -1.0, 0.0, //
        1.0, 1.0, 0.0, //
        -1.0, 1.0, 0.0,
    ]);
    data.set_indices(Some(crate::buffer::IndexBufferData::new(vec![0, 1, 2, 0, 2, 3], 1)));
    graph.create_mesh(name, data)
}
