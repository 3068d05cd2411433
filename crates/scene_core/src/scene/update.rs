//! Geometric update pass
//!
//! One call to [`SceneGraph::update_geometric_state`] walks a subtree once
//! and consumes the dirty marks it finds: controllers run first, world
//! transforms are recomputed top-down, render states are resolved against
//! the ancestor override stacks, and world bounds are refitted bottom-up.
//! The pass always starts from the caller's real position in the tree, so
//! the ancestor stacks are rebuilt from the root before descending.

use super::dirty::{DirtyMarks, DirtyType};
use super::graph::SceneGraph;
use super::hints::DataMode;
use super::mesh;
use super::spatial::SpatialKind;
use crate::bounding::{Bound, BoundingVolume};
use crate::error::SceneResult;
use crate::foundation::collections::SpatialKey;
use crate::foundation::math::Point3;
use crate::render::{StateStacks, StateType};
use log::trace;
use std::sync::Arc;

impl SceneGraph {
    /// Run controllers and bring transforms, render states and bounds of the
    /// subtree at `key` up to date, then refit the bounds of its ancestors
    pub fn update_geometric_state(&mut self, key: SpatialKey, time: f64) -> SceneResult<()> {
        let mut stacks = self.ancestor_stacks(key)?;
        self.update_recursive(key, time, &mut stacks);
        if self.contains(key) {
            self.propagate_bound_to_root(key)?;
        }
        Ok(())
    }

    /// Override stacks of every ancestor of `key`, root first
    fn ancestor_stacks(&self, key: SpatialKey) -> SceneResult<StateStacks> {
        let mut path = Vec::new();
        let mut current = self.spatial(key)?.parent;
        while let Some(parent) = current {
            let spatial = self.spatial(parent)?;
            path.push(parent);
            current = spatial.parent;
        }

        let mut stacks = StateStacks::new();
        for ancestor in path.into_iter().rev() {
            stacks.push_overrides(self.spatial(ancestor)?);
        }
        Ok(stacks)
    }

    fn update_recursive(&mut self, key: SpatialKey, time: f64, stacks: &mut StateStacks) {
        self.run_controllers(key, time);
        let Some(spatial) = self.spatials.get(key) else {
            return;
        };
        trace!("Updating '{}' ({:?})", spatial.name, spatial.dirty);

        if spatial.is_dirty(DirtyType::Transform) {
            self.refresh_world_transform(key);
        }

        let Some(spatial) = self.spatials.get(key) else {
            return;
        };
        let pushed = stacks.push_overrides(spatial);
        let resolved_now = spatial.is_dirty(DirtyType::RenderState);
        if resolved_now {
            self.refresh_render_states(key, stacks);
        }
        self.ensure_interleaved(key);

        let children = self
            .spatials
            .get(key)
            .map(|spatial| spatial.children().to_vec())
            .unwrap_or_default();
        for child in children {
            let still_attached = self
                .spatials
                .get(child)
                .map_or(false, |spatial| spatial.parent == Some(key));
            if still_attached {
                self.update_recursive(child, time, stacks);
            }
        }
        stacks.pop_pushed(&pushed);

        if self.is_dirty(key, DirtyType::Bounding) {
            self.refresh_world_bound(key);
        }
        if resolved_now {
            self.sort_lights_of(key);
        }
        self.clear_marks(key, DirtyMarks::STRUCTURAL);
    }

    /// Run the controllers of `key`; controllers added meanwhile are kept and
    /// first run on the next update
    fn run_controllers(&mut self, key: SpatialKey, time: f64) {
        let Some(spatial) = self.spatials.get_mut(key) else {
            return;
        };
        if spatial.controllers.is_empty() {
            return;
        }
        let generation = spatial.controller_generation;
        let mut controllers = std::mem::take(&mut spatial.controllers);
        for controller in controllers.iter_mut() {
            if controller.is_active() {
                controller.update(time, self, key);
            }
            match self.spatials.get(key) {
                None => return,
                // Cleared by a controller: drop the running list
                Some(spatial) if spatial.controller_generation != generation => return,
                Some(_) => {}
            }
        }
        if let Some(spatial) = self.spatials.get_mut(key) {
            let added = std::mem::replace(&mut spatial.controllers, controllers);
            spatial.controllers.extend(added);
        }
    }

    fn refresh_world_transform(&mut self, key: SpatialKey) {
        let Some(spatial) = self.spatials.get(key) else {
            return;
        };
        let parent_world =
            spatial.parent.and_then(|parent| self.spatials.get(parent)).map(|p| p.world.clone());
        let world = match parent_world {
            Some(parent_world) => parent_world.combine(&spatial.local),
            None => spatial.local.clone(),
        };
        if let Some(spatial) = self.spatials.get_mut(key) {
            spatial.world = world;
            spatial.dirty.remove(DirtyMarks::TRANSFORM);
        }
    }

    /// Resolve with `stacks` already holding the overrides of `key` itself
    fn refresh_render_states(&mut self, key: SpatialKey, stacks: &StateStacks) {
        let resolved = self.resolver.resolve(stacks, self, key);
        if let Some(spatial) = self.spatials.get_mut(key) {
            spatial.resolved = resolved.map(Some);
            spatial.dirty.remove(DirtyMarks::RENDER_STATE);
        }
    }

    fn ensure_interleaved(&mut self, key: SpatialKey) {
        if self.data_mode(key) != DataMode::VboInterleaved {
            return;
        }
        let Some(mesh) = self.spatials.get_mut(key).and_then(|spatial| spatial.as_mesh_mut()) else {
            return;
        };
        if mesh.data().interleaved().is_none() && mesh.data().vertices().is_some() {
            mesh.data_mut().rebuild_interleaved();
        }
    }

    fn refresh_world_bound(&mut self, key: SpatialKey) {
        let Some(spatial) = self.spatials.get(key) else {
            return;
        };
        let bound = match &spatial.kind {
            SpatialKind::Node(children) => {
                let mut merged: Option<Bound> = None;
                for child_bound in children
                    .iter()
                    .filter_map(|&child| self.spatials.get(child))
                    .filter_map(|child| child.world_bound.as_ref())
                {
                    match merged.as_mut() {
                        Some(bound) => bound.merge_local(child_bound),
                        None => merged = Some(child_bound.clone()),
                    }
                }
                merged
            }
            SpatialKind::Mesh(mesh) => mesh.world_bound(&spatial.world),
        };
        if let Some(spatial) = self.spatials.get_mut(key) {
            spatial.world_bound = bound;
            spatial.dirty.remove(DirtyMarks::BOUNDING);
        }
    }

    /// Recompute the world transform of `key`, and of its subtree when
    /// `recurse` is set, regardless of dirty marks
    pub fn update_world_transform(&mut self, key: SpatialKey, recurse: bool) -> SceneResult<()> {
        self.spatial(key)?;
        self.refresh_world_transform(key);
        if recurse {
            for descendant in self.descendants(key) {
                self.refresh_world_transform(descendant);
            }
        }
        Ok(())
    }

    /// Refit the world bound of `key`; with `recurse` the subtree is refitted
    /// first, children before parents
    pub fn update_world_bound(&mut self, key: SpatialKey, recurse: bool) -> SceneResult<()> {
        self.spatial(key)?;
        if recurse {
            for descendant in self.descendants(key).into_iter().rev() {
                self.refresh_world_bound(descendant);
            }
        }
        self.refresh_world_bound(key);
        Ok(())
    }

    /// Resolve render states of `key`, and of its subtree when `recurse` is
    /// set, starting from its ancestors' overrides
    pub fn update_world_render_states(
        &mut self,
        key: SpatialKey,
        recurse: bool,
    ) -> SceneResult<()> {
        let mut stacks = self.ancestor_stacks(key)?;
        self.update_world_render_states_with(key, recurse, &mut stacks)
    }

    /// Resolve render states with caller-provided stacks holding the
    /// overrides of every ancestor of `key`
    ///
    /// The stacks are returned in the state they were passed in.
    pub fn update_world_render_states_with(
        &mut self,
        key: SpatialKey,
        recurse: bool,
        stacks: &mut StateStacks,
    ) -> SceneResult<()> {
        let pushed = stacks.push_overrides(self.spatial(key)?);
        self.refresh_render_states(key, stacks);
        self.sort_lights_of(key);
        if recurse {
            let children = self.spatial(key)?.children().to_vec();
            for child in children {
                if let Err(err) = self.update_world_render_states_with(child, true, stacks) {
                    stacks.pop_pushed(&pushed);
                    return Err(err);
                }
            }
        }
        stacks.pop_pushed(&pushed);
        Ok(())
    }

    /// Refit the world bound of every ancestor of `key`, nearest first
    pub fn propagate_bound_to_root(&mut self, key: SpatialKey) -> SceneResult<()> {
        let mut current = self.spatial(key)?.parent;
        while let Some(parent) = current {
            self.refresh_world_bound(parent);
            current = self.spatial(parent)?.parent;
        }
        Ok(())
    }

    /// Trim a mesh's resolved lights to the configured maximum, keeping the
    /// ones with the most influence on its world position
    pub fn sort_lights(&mut self, key: SpatialKey) -> SceneResult<()> {
        self.mesh(key)?;
        self.sort_lights_of(key);
        Ok(())
    }

    fn sort_lights_of(&mut self, key: SpatialKey) {
        let max_lights = self.config.max_lights;
        let Some(spatial) = self.spatials.get_mut(key) else {
            return;
        };
        if spatial.as_mesh().is_none() {
            return;
        }
        let at = match &spatial.world_bound {
            Some(bound) => bound.center(),
            None => Point3::from(spatial.world.translation),
        };
        let index = StateType::Light.index();
        let Some(state) = spatial.resolved[index].as_ref() else {
            return;
        };
        if let Some(sorted) = mesh::sort_lights(state, &at, max_lights) {
            spatial.resolved[index] = Some(Arc::new(sorted));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{ColorRgba, Quat, Transform, Vec3};
    use crate::render::state::{CullFace, CullState, Light, LightState, RenderState};
    use crate::scene::{FnController, MeshData};
    use approx::assert_relative_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn unit_mesh(graph: &mut SceneGraph, name: &str) -> SpatialKey {
        graph.create_mesh(name, MeshData::from_vertices(vec![-1.0, 0.0, 0.0, 1.0, 0.0, 0.0]))
    }

    #[test]
    fn test_world_transform_composes_down_the_tree() {
        let mut graph = SceneGraph::new();
        let root = graph.create_node("root");
        let child = graph.create_node("child");
        graph.attach_child(root, child).unwrap();
        graph.set_translation(root, Vec3::new(0.0, 2.0, 0.0)).unwrap();
        graph.set_scale(root, Vec3::new(2.0, 2.0, 2.0)).unwrap();
        graph.set_translation(child, Vec3::new(1.0, 0.0, 0.0)).unwrap();
        graph.update_geometric_state(root, 0.0).unwrap();

        let world = graph.spatial(child).unwrap().world_transform();
        assert_relative_eq!(world.translation, Vec3::new(2.0, 2.0, 0.0), epsilon = 1e-6);
        assert_relative_eq!(world.scale, Vec3::new(2.0, 2.0, 2.0), epsilon = 1e-6);
        assert!(!graph.is_dirty(child, DirtyType::Transform));
    }

    #[test]
    fn test_node_bound_contains_children() {
        let mut graph = SceneGraph::new();
        let root = graph.create_node("root");
        let left = unit_mesh(&mut graph, "left");
        let right = unit_mesh(&mut graph, "right");
        graph.attach_child(root, left).unwrap();
        graph.attach_child(root, right).unwrap();
        graph.set_translation(left, Vec3::new(-5.0, 0.0, 0.0)).unwrap();
        graph
            .set_transform(
                right,
                Transform::from_translation_rotation(
                    Vec3::new(3.0, 1.0, 0.0),
                    Quat::from_axis_angle(&Vec3::z_axis(), 0.7),
                ),
            )
            .unwrap();
        graph.update_geometric_state(root, 0.0).unwrap();

        let bound = graph.spatial(root).unwrap().world_bound().unwrap().clone();
        for mesh in [left, right] {
            let child_bound = graph.spatial(mesh).unwrap().world_bound().unwrap();
            assert!(bound.contains_bound(child_bound));
            for p in graph.world_vectors(mesh).unwrap() {
                assert!(bound.contains_point(&p));
            }
        }
    }

    #[test]
    fn test_empty_node_has_no_bound() {
        let mut graph = SceneGraph::new();
        let root = graph.create_node("root");
        let empty = graph.create_node("empty");
        graph.attach_child(root, empty).unwrap();
        graph.update_geometric_state(root, 0.0).unwrap();
        assert!(graph.spatial(root).unwrap().world_bound().is_none());
    }

    #[test]
    fn test_partial_update_refits_ancestors() {
        let mut graph = SceneGraph::new();
        let root = graph.create_node("root");
        let mid = graph.create_node("mid");
        let mesh = unit_mesh(&mut graph, "mesh");
        graph.attach_child(root, mid).unwrap();
        graph.attach_child(mid, mesh).unwrap();
        graph.update_geometric_state(root, 0.0).unwrap();

        graph.set_translation(mesh, Vec3::new(50.0, 0.0, 0.0)).unwrap();
        graph.update_geometric_state(mesh, 0.0).unwrap();
        let root_bound = graph.spatial(root).unwrap().world_bound().unwrap();
        assert!(root_bound.contains_point(&Point3::new(50.0, 0.0, 0.0)));
        assert!(!graph.is_dirty(root, DirtyType::Bounding));
    }

    #[test]
    fn test_partial_update_sees_ancestor_overrides() {
        let mut graph = SceneGraph::new();
        let root = graph.create_node("root");
        let leaf = graph.create_node("leaf");
        graph.attach_child(root, leaf).unwrap();
        graph.set_render_state(root, CullState::new(CullFace::Front)).unwrap();
        graph.update_geometric_state(leaf, 0.0).unwrap();

        let state = graph.spatial(leaf).unwrap().render_state(StateType::Cull);
        assert_eq!(state.as_cull().unwrap().face, CullFace::Front);
    }

    #[test]
    fn test_controllers_run_and_may_add_controllers() {
        let mut graph = SceneGraph::new();
        let node = graph.create_node("spinner");
        graph
            .add_controller(
                node,
                FnController::new(|time, scene: &mut SceneGraph, target| {
                    let x = scene.spatial(target).unwrap().local_transform().translation.x;
                    scene.set_translation(target, Vec3::new(x + time as f32, 0.0, 0.0)).unwrap();
                    if scene.spatial(target).unwrap().controller_count() == 0 {
                        let idle = FnController::new(|_, _: &mut SceneGraph, _| {});
                        scene.add_controller(target, idle).unwrap();
                    }
                }),
            )
            .unwrap();

        graph.update_geometric_state(node, 0.5).unwrap();
        let spatial = graph.spatial(node).unwrap();
        assert_relative_eq!(spatial.world_transform().translation.x, 0.5);
        assert_eq!(spatial.controller_count(), 2);
    }

    #[test]
    fn test_controller_may_clear_its_own_list() {
        let mut graph = SceneGraph::new();
        let node = graph.create_node("one_shot");
        let runs = Arc::new(AtomicUsize::new(0));
        let first = Arc::clone(&runs);
        graph
            .add_controller(
                node,
                FnController::new(move |_, scene: &mut SceneGraph, target| {
                    first.fetch_add(1, Ordering::SeqCst);
                    scene.clear_controllers(target).unwrap();
                }),
            )
            .unwrap();
        let second = Arc::clone(&runs);
        graph
            .add_controller(
                node,
                FnController::new(move |_, _: &mut SceneGraph, _| {
                    second.fetch_add(10, Ordering::SeqCst);
                }),
            )
            .unwrap();

        graph.update_geometric_state(node, 0.1).unwrap();
        assert_eq!(graph.spatial(node).unwrap().controller_count(), 0);
        graph.update_geometric_state(node, 0.1).unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_explicit_render_state_update_balances_stacks() {
        let mut graph = SceneGraph::new();
        let root = graph.create_node("root");
        let leaf = graph.create_node("leaf");
        graph.attach_child(root, leaf).unwrap();
        graph.set_render_state(leaf, CullState::new(CullFace::Back)).unwrap();

        let mut stacks = StateStacks::new();
        graph.update_world_render_states_with(root, true, &mut stacks).unwrap();
        assert!(stacks.is_empty());
        let state = graph.spatial(leaf).unwrap().render_state(StateType::Cull);
        assert_eq!(state.as_cull().unwrap().face, CullFace::Back);
    }

    #[test]
    fn test_lights_trimmed_to_maximum() {
        let mut graph = SceneGraph::new();
        graph.config.max_lights = 1;
        let root = graph.create_node("root");
        let mesh = unit_mesh(&mut graph, "mesh");
        graph.attach_child(root, mesh).unwrap();
        let near = Light::point(Point3::new(1.0, 0.0, 0.0), 10.0, ColorRgba::WHITE);
        let far = Light::point(Point3::new(20.0, 0.0, 0.0), 10.0, ColorRgba::WHITE);
        graph
            .set_render_state(
                root,
                RenderState::Light(LightState::with_lights(vec![far, near.clone()])),
            )
            .unwrap();
        graph.update_geometric_state(root, 0.0).unwrap();

        let lights = graph.spatial(mesh).unwrap().render_state(StateType::Light);
        assert_eq!(lights.as_light().unwrap().lights, vec![near]);
    }
}
