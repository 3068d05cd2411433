//! Walking and drawing the tree

use super::graph::SceneGraph;
use super::hints::{CullHint, FrustumIntersect};
use super::spatial::{Spatial, SpatialKind};
use crate::error::SceneResult;
use crate::foundation::collections::SpatialKey;
use crate::render::Renderer;

/// When a spatial is visited relative to its children
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalOrder {
    /// Parent before children
    PreOrder,
    /// Children before parent
    PostOrder,
}

impl SceneGraph {
    /// Visit `root` and every spatial below it with its depth below `root`
    pub fn walk<F>(&self, root: SpatialKey, order: TraversalOrder, mut visit: F) -> SceneResult<()>
    where
        F: FnMut(SpatialKey, &Spatial, usize),
    {
        self.spatial(root)?;
        self.walk_inner(root, order, 0, &mut visit);
        Ok(())
    }

    fn walk_inner<F>(&self, key: SpatialKey, order: TraversalOrder, depth: usize, visit: &mut F)
    where
        F: FnMut(SpatialKey, &Spatial, usize),
    {
        let Some(spatial) = self.spatials.get(key) else {
            return;
        };
        if order == TraversalOrder::PreOrder {
            visit(key, spatial, depth);
        }
        for &child in spatial.children() {
            self.walk_inner(child, order, depth + 1, visit);
        }
        if order == TraversalOrder::PostOrder {
            visit(key, spatial, depth);
        }
    }

    /// Keys of `root` and its subtree in `order`
    pub fn subtree(&self, root: SpatialKey, order: TraversalOrder) -> SceneResult<Vec<SpatialKey>> {
        let mut keys = Vec::new();
        self.walk(root, order, |key, _, _| keys.push(key))?;
        Ok(keys)
    }

    /// Draw the subtree at `key` through `renderer`
    ///
    /// Takes `&self` so render threads can draw while holding a shared lock;
    /// the only state written is each spatial's cached frustum result.
    pub fn draw(&self, key: SpatialKey, renderer: &mut dyn Renderer) -> SceneResult<()> {
        self.spatial(key)?;
        self.draw_inner(key, renderer);
        Ok(())
    }

    fn draw_inner(&self, key: SpatialKey, renderer: &mut dyn Renderer) {
        let Some(spatial) = self.spatials.get(key) else {
            return;
        };

        match self.cull_hint(key) {
            CullHint::Always => {
                spatial.set_last_frustum_intersection(FrustumIntersect::Outside);
                return;
            }
            CullHint::Never => spatial.set_last_frustum_intersection(FrustumIntersect::Intersects),
            CullHint::Dynamic | CullHint::Inherit => {
                let mut intersect = spatial
                    .parent
                    .and_then(|parent| self.spatials.get(parent))
                    .map_or(FrustumIntersect::Intersects, Spatial::last_frustum_intersection);
                if intersect == FrustumIntersect::Intersects {
                    if let Some(bound) = spatial.world_bound() {
                        intersect = renderer.cull_test(bound);
                    }
                }
                spatial.set_last_frustum_intersection(intersect);
                if intersect == FrustumIntersect::Outside {
                    return;
                }
            }
        }

        if let Some(delegate) = spatial.render_delegate(renderer.context_key()) {
            delegate.render(self, key, renderer);
            return;
        }

        match &spatial.kind {
            SpatialKind::Node(children) => {
                for &child in children {
                    self.draw_inner(child, renderer);
                }
            }
            SpatialKind::Mesh(mesh) => mesh.render(
                spatial,
                self.data_mode(key),
                self.normals_mode(key),
                self.config.render_vertex_only,
                renderer,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_walk_orders_and_depths() {
        let mut graph = SceneGraph::new();
        let root = graph.create_node("root");
        let a = graph.create_node("a");
        let b = graph.create_node("b");
        let a1 = graph.create_node("a1");
        graph.attach_child(root, a).unwrap();
        graph.attach_child(root, b).unwrap();
        graph.attach_child(a, a1).unwrap();

        assert_eq!(graph.subtree(root, TraversalOrder::PreOrder).unwrap(), vec![root, a, a1, b]);
        assert_eq!(graph.subtree(root, TraversalOrder::PostOrder).unwrap(), vec![a1, a, b, root]);

        let mut depths = Vec::new();
        graph
            .walk(root, TraversalOrder::PreOrder, |_, spatial, depth| {
                depths.push((spatial.name().to_string(), depth));
            })
            .unwrap();
        assert_eq!(depths[2], ("a1".to_string(), 2));
    }

    #[test]
    fn test_walk_unknown_root_fails() {
        let mut graph = SceneGraph::new();
        let root = graph.create_node("root");
        graph.destroy(root).unwrap();
        assert!(graph.subtree(root, TraversalOrder::PreOrder).is_err());
    }
}
