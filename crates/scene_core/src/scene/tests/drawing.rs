use super::quad;
use crate::bounding::BoundingBox;
use crate::buffer::BufferRegistry;
use crate::config::TaskQueueConfig;
use crate::foundation::collections::SpatialKey;
use crate::foundation::math::{Point3, Vec3};
use crate::render::{HeadlessRenderer, RenderDelegate, Renderer, TaskQueueManager};
use crate::scene::{CullHint, FrustumIntersect, SceneGraph};
use parking_lot::Mutex;
use std::sync::Arc;

fn renderer() -> HeadlessRenderer {
    let tasks = Arc::new(TaskQueueManager::new(TaskQueueConfig::default()));
    HeadlessRenderer::new(Arc::new(BufferRegistry::new(tasks)))
}

fn two_quads(graph: &mut SceneGraph) -> (SpatialKey, SpatialKey, SpatialKey) {
    let root = graph.create_node("root");
    let near = quad(graph, "near");
    let far = quad(graph, "far");
    graph.attach_child(root, near).unwrap();
    graph.attach_child(root, far).unwrap();
    graph.set_translation(far, Vec3::new(100.0, 0.0, 0.0)).unwrap();
    graph.update_geometric_state(root, 0.0).unwrap();
    (root, near, far)
}

#[test]
fn test_dynamic_culling_skips_meshes_outside_the_view() {
    let mut graph = SceneGraph::new();
    let (root, near, far) = two_quads(&mut graph);
    let mut renderer = renderer();
    renderer.set_view_volume(Some(BoundingBox::new(
        Point3::new(-10.0, -10.0, -10.0),
        Point3::new(10.0, 10.0, 10.0),
    )));

    graph.draw(root, &mut renderer).unwrap();
    assert_eq!(renderer.draws().len(), 1);
    assert_eq!(renderer.draws()[0].count, 6);
    let last = |key| graph.spatial(key).unwrap().last_frustum_intersection();
    assert_eq!(last(root), FrustumIntersect::Intersects);
    assert_eq!(last(near), FrustumIntersect::Inside);
    assert_eq!(last(far), FrustumIntersect::Outside);
}

#[test]
fn test_inside_parent_skips_child_tests() {
    let mut graph = SceneGraph::new();
    let (root, near, far) = two_quads(&mut graph);
    let mut renderer = renderer();
    renderer.set_view_volume(Some(BoundingBox::new(
        Point3::new(-500.0, -500.0, -500.0),
        Point3::new(500.0, 500.0, 500.0),
    )));

    graph.draw(root, &mut renderer).unwrap();
    assert_eq!(renderer.draws().len(), 2);
    for key in [root, near, far] {
        assert_eq!(
            graph.spatial(key).unwrap().last_frustum_intersection(),
            FrustumIntersect::Inside
        );
    }
}

#[test]
fn test_cull_hints_override_the_view_test() {
    let mut graph = SceneGraph::new();
    let (root, near, far) = two_quads(&mut graph);
    let mut renderer = renderer();
    renderer.set_view_volume(Some(BoundingBox::new(
        Point3::new(-10.0, -10.0, -10.0),
        Point3::new(10.0, 10.0, 10.0),
    )));

    graph.spatial_mut(far).unwrap().set_cull_hint(CullHint::Never);
    graph.spatial_mut(near).unwrap().set_cull_hint(CullHint::Always);
    graph.draw(root, &mut renderer).unwrap();
    assert_eq!(renderer.draws().len(), 1);
    assert_eq!(renderer.draws()[0].world.as_ref().unwrap().translation.x, 100.0);
    assert_eq!(graph.spatial(near).unwrap().last_frustum_intersection(), FrustumIntersect::Outside);

    renderer.clear_frame();
    graph.spatial_mut(root).unwrap().set_cull_hint(CullHint::Always);
    graph.draw(root, &mut renderer).unwrap();
    assert!(renderer.draws().is_empty());
}

struct CountingDelegate {
    drawn: Mutex<Vec<SpatialKey>>,
}

impl RenderDelegate for CountingDelegate {
    fn render(&self, _graph: &SceneGraph, spatial: SpatialKey, _renderer: &mut dyn Renderer) {
        self.drawn.lock().push(spatial);
    }
}

#[test]
fn test_delegate_replaces_drawing_in_its_context_only() {
    let mut graph = SceneGraph::new();
    let (root, near, _) = two_quads(&mut graph);
    let mut with_delegate = renderer();
    let mut plain = renderer();

    let delegate = Arc::new(CountingDelegate { drawn: Mutex::new(Vec::new()) });
    graph
        .spatial_mut(root)
        .unwrap()
        .set_render_delegate(with_delegate.context_key(), Some(delegate.clone()));

    graph.draw(root, &mut with_delegate).unwrap();
    graph.draw(root, &mut plain).unwrap();
    assert!(with_delegate.draws().is_empty());
    assert_eq!(delegate.drawn.lock().as_slice(), &[root]);
    assert_eq!(plain.draws().len(), 2);

    graph.detach_child(root, near).unwrap();
    graph
        .spatial_mut(near)
        .unwrap()
        .set_render_delegate(plain.context_key(), Some(delegate.clone()));
    graph.detach_child(root, graph.child_named(root, "far").unwrap()).unwrap();
    graph.attach_child(root, near).unwrap();
    assert!(graph.spatial(near).unwrap().render_delegate(plain.context_key()).is_some());
    graph.remove_from_parent(near).unwrap();
    assert!(graph.spatial(near).unwrap().render_delegate(plain.context_key()).is_none());
}
