//! Scene graph arena
//!
//! Spatials live in a generational arena and refer to each other by
//! [`SpatialKey`]. A node owns its children through its ordered key list; a
//! child's parent key is only used for traversal (dirty propagation,
//! inherited hints, ancestry checks), never for lifetime.

use super::controller::Controller;
use super::dirty::{DirtyMarks, DirtyType};
use super::hints::{CullHint, DataMode, LightCombineMode, NormalsMode};
use super::mesh::Mesh;
use super::mesh_data::MeshData;
use super::spatial::{Spatial, SpatialKind};
use crate::bounding::Bound;
use crate::config::RenderConfig;
use crate::error::{SceneError, SceneResult};
use crate::foundation::collections::{SpatialArena, SpatialKey};
use crate::foundation::math::{Mat3, Point3, Quat, Transform, Vec3};
use crate::render::{RenderState, RenderStateResolver, StateType};
use log::trace;
use std::sync::Arc;

/// Tree of spatials plus the settings shared by every pass over it
pub struct SceneGraph {
    pub(crate) spatials: SpatialArena<Spatial>,
    pub(crate) resolver: RenderStateResolver,
    pub(crate) config: RenderConfig,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph {
    /// Empty graph with the default render configuration
    pub fn new() -> Self {
        Self::with_config(RenderConfig::default())
    }

    /// Empty graph using `config`
    pub fn with_config(config: RenderConfig) -> Self {
        Self {
            spatials: SpatialArena::with_key(),
            resolver: RenderStateResolver::default(),
            config,
        }
    }

    /// Render configuration
    pub fn render_config(&self) -> &RenderConfig {
        &self.config
    }

    /// Render state extractors
    pub fn resolver(&self) -> &RenderStateResolver {
        &self.resolver
    }

    /// Mutable extractors; mark the affected subtrees `RenderState` dirty
    /// after replacing one
    pub fn resolver_mut(&mut self) -> &mut RenderStateResolver {
        &mut self.resolver
    }

    /// Create a detached node
    pub fn create_node(&mut self, name: impl Into<String>) -> SpatialKey {
        self.spatials.insert(Spatial::new(name, SpatialKind::Node(Vec::new())))
    }

    /// Create a detached mesh from geometry
    pub fn create_mesh(&mut self, name: impl Into<String>, data: MeshData) -> SpatialKey {
        self.insert_mesh(name, Mesh::new(data))
    }

    /// Create a detached mesh
    pub fn insert_mesh(&mut self, name: impl Into<String>, mesh: Mesh) -> SpatialKey {
        self.spatials.insert(Spatial::new(name, SpatialKind::Mesh(Box::new(mesh))))
    }

    /// Whether `key` names a live spatial
    pub fn contains(&self, key: SpatialKey) -> bool {
        self.spatials.contains_key(key)
    }

    /// Number of spatials
    pub fn len(&self) -> usize {
        self.spatials.len()
    }

    /// Whether the graph holds no spatials
    pub fn is_empty(&self) -> bool {
        self.spatials.is_empty()
    }

    /// Spatials without a parent
    pub fn roots(&self) -> Vec<SpatialKey> {
        self.spatials
            .iter()
            .filter(|(_, spatial)| spatial.parent.is_none())
            .map(|(key, _)| key)
            .collect()
    }

    /// Shared access to a spatial
    pub fn spatial(&self, key: SpatialKey) -> SceneResult<&Spatial> {
        self.spatials.get(key).ok_or(SceneError::UnknownSpatial(key))
    }

    /// Mutable access to a spatial
    pub fn spatial_mut(&mut self, key: SpatialKey) -> SceneResult<&mut Spatial> {
        self.spatials.get_mut(key).ok_or(SceneError::UnknownSpatial(key))
    }

    /// Shared access to a mesh
    pub fn mesh(&self, key: SpatialKey) -> SceneResult<&Mesh> {
        self.spatial(key)?.as_mesh().ok_or(SceneError::NotAMesh(key))
    }

    /// Mutable access to a mesh
    ///
    /// Geometry edits are out-of-band: call [`SceneGraph::update_model_bound`]
    /// or [`SceneGraph::mark_dirty`] afterwards.
    pub fn mesh_mut(&mut self, key: SpatialKey) -> SceneResult<&mut Mesh> {
        self.spatial_mut(key)?.as_mesh_mut().ok_or(SceneError::NotAMesh(key))
    }

    /// Raise `dirty` on `key` and propagate it
    pub fn mark_dirty(&mut self, key: SpatialKey, dirty: DirtyType) -> SceneResult<()> {
        self.mark_dirty_from(key, key, dirty)
    }

    /// Apply the propagation rules of `dirty` starting at `origin` and notify
    /// listeners from `origin` upward on behalf of `caller`
    pub(crate) fn mark_dirty_from(
        &mut self,
        origin: SpatialKey,
        caller: SpatialKey,
        dirty: DirtyType,
    ) -> SceneResult<()> {
        let up = dirty.upward();
        let down = dirty.downward();

        if let Some(spatial) = self.spatials.get_mut(caller) {
            spatial.dirty |= dirty.mark();
        }
        let spatial = self.spatial_mut(origin)?;
        spatial.dirty |= up | down;
        let mut parent = spatial.parent;

        if !down.is_empty() {
            for key in self.descendants(origin) {
                if let Some(descendant) = self.spatials.get_mut(key) {
                    descendant.dirty |= down;
                }
            }
        }
        if !up.is_empty() {
            while let Some(key) = parent {
                let Some(ancestor) = self.spatials.get_mut(key) else {
                    break;
                };
                ancestor.dirty |= up;
                parent = ancestor.parent;
            }
        }

        self.notify_dirty(origin, caller, dirty);
        Ok(())
    }

    fn notify_dirty(&self, origin: SpatialKey, caller: SpatialKey, dirty: DirtyType) {
        let mut current = Some(origin);
        while let Some(key) = current {
            let Some(spatial) = self.spatials.get(key) else {
                return;
            };
            if let Some(listener) = &spatial.listener {
                if listener.spatial_dirty(caller, dirty) {
                    trace!("Dirty event {:?} consumed at {:?}", dirty, key);
                    return;
                }
            }
            current = spatial.parent;
        }
    }

    /// Whether `dirty` is pending on `key`; `false` for unknown keys
    pub fn is_dirty(&self, key: SpatialKey, dirty: DirtyType) -> bool {
        self.spatials.get(key).map_or(false, |spatial| spatial.is_dirty(dirty))
    }

    /// Clear one mark on `key` only
    pub fn clear_dirty(&mut self, key: SpatialKey, dirty: DirtyType) -> SceneResult<()> {
        self.spatial_mut(key)?.dirty.remove(dirty.mark());
        Ok(())
    }

    pub(crate) fn clear_marks(&mut self, key: SpatialKey, marks: DirtyMarks) {
        if let Some(spatial) = self.spatials.get_mut(key) {
            spatial.dirty.remove(marks);
        }
    }

    /// Replace the local transform
    pub fn set_transform(&mut self, key: SpatialKey, transform: Transform) -> SceneResult<()> {
        self.spatial_mut(key)?.local = transform;
        self.mark_dirty(key, DirtyType::Transform)
    }

    /// Set the local translation
    pub fn set_translation(&mut self, key: SpatialKey, translation: Vec3) -> SceneResult<()> {
        self.spatial_mut(key)?.local.translation = translation;
        self.mark_dirty(key, DirtyType::Transform)
    }

    /// Set the local rotation
    pub fn set_rotation(&mut self, key: SpatialKey, rotation: Quat) -> SceneResult<()> {
        let local = &mut self.spatial_mut(key)?.local;
        local.rotation = rotation;
        local.linear = None;
        self.mark_dirty(key, DirtyType::Transform)
    }

    /// Set the local rotation from a matrix
    pub fn set_rotation_matrix(&mut self, key: SpatialKey, rotation: &Mat3) -> SceneResult<()> {
        self.spatial_mut(key)?.local.set_rotation_matrix(rotation);
        self.mark_dirty(key, DirtyType::Transform)
    }

    /// Set the local scale
    pub fn set_scale(&mut self, key: SpatialKey, scale: Vec3) -> SceneResult<()> {
        let local = &mut self.spatial_mut(key)?.local;
        local.scale = scale;
        local.linear = None;
        self.mark_dirty(key, DirtyType::Transform)
    }

    /// Override one render state on `key`, returning the previous override
    pub fn set_render_state(
        &mut self,
        key: SpatialKey,
        state: impl Into<RenderState>,
    ) -> SceneResult<Option<Arc<RenderState>>> {
        self.set_shared_render_state(key, Arc::new(state.into()))
    }

    /// Override one render state with a state shared between spatials
    pub fn set_shared_render_state(
        &mut self,
        key: SpatialKey,
        state: Arc<RenderState>,
    ) -> SceneResult<Option<Arc<RenderState>>> {
        let index = state.state_type().index();
        let previous = self.spatial_mut(key)?.overrides[index].replace(state);
        self.mark_dirty(key, DirtyType::RenderState)?;
        Ok(previous)
    }

    /// Remove the override of `state_type`, returning it
    pub fn clear_render_state(
        &mut self,
        key: SpatialKey,
        state_type: StateType,
    ) -> SceneResult<Option<Arc<RenderState>>> {
        let previous = self.spatial_mut(key)?.overrides[state_type.index()].take();
        if previous.is_some() {
            self.mark_dirty(key, DirtyType::RenderState)?;
        }
        Ok(previous)
    }

    /// Remove every override on `key`
    pub fn clear_render_states(&mut self, key: SpatialKey) -> SceneResult<()> {
        let spatial = self.spatial_mut(key)?;
        let had_any = spatial.overrides.iter().any(Option::is_some);
        spatial.overrides = Default::default();
        if had_any {
            self.mark_dirty(key, DirtyType::RenderState)?;
        }
        Ok(())
    }

    /// Set the local light combine mode
    pub fn set_light_combine_mode(
        &mut self,
        key: SpatialKey,
        mode: LightCombineMode,
    ) -> SceneResult<()> {
        self.spatial_mut(key)?.light_combine_mode = mode;
        self.mark_dirty(key, DirtyType::RenderState)
    }

    /// Append a controller
    pub fn add_controller(
        &mut self,
        key: SpatialKey,
        controller: impl Controller + 'static,
    ) -> SceneResult<()> {
        self.spatial_mut(key)?.controllers.push(Box::new(controller));
        Ok(())
    }

    /// Remove every controller, returning how many there were
    ///
    /// Called from a controller of `key`, the running controllers are dropped
    /// once the current one returns and the rest of them are skipped.
    pub fn clear_controllers(&mut self, key: SpatialKey) -> SceneResult<usize> {
        let spatial = self.spatial_mut(key)?;
        spatial.controller_generation = spatial.controller_generation.wrapping_add(1);
        Ok(std::mem::take(&mut spatial.controllers).len())
    }

    /// Refit a mesh's model bound around its vertices
    pub fn update_model_bound(&mut self, key: SpatialKey) -> SceneResult<()> {
        self.mesh_mut(key)?.compute_model_bound();
        self.mark_dirty(key, DirtyType::Bounding)
    }

    /// Replace a mesh's model bound
    pub fn set_model_bound(&mut self, key: SpatialKey, bound: Option<Bound>) -> SceneResult<()> {
        self.mesh_mut(key)?.set_model_bound(bound);
        self.mark_dirty(key, DirtyType::Bounding)
    }

    /// Map a point from `key`'s local space into world space
    pub fn local_to_world(&self, key: SpatialKey, point: &Point3) -> SceneResult<Point3> {
        Ok(self.spatial(key)?.world.apply_forward(point))
    }

    /// Map a world point into `key`'s local space
    pub fn world_to_local(&self, key: SpatialKey, point: &Point3) -> SceneResult<Point3> {
        Ok(self.spatial(key)?.world.apply_inverse(point))
    }

    /// A mesh's vertices in world space
    pub fn world_vectors(&self, key: SpatialKey) -> SceneResult<Vec<Point3>> {
        let spatial = self.spatial(key)?;
        let mesh = spatial.as_mesh().ok_or(SceneError::NotAMesh(key))?;
        Ok(mesh.world_vectors(&spatial.world))
    }

    /// A mesh's normals in world space
    pub fn world_normals(&self, key: SpatialKey) -> SceneResult<Vec<Vec3>> {
        let spatial = self.spatial(key)?;
        let mesh = spatial.as_mesh().ok_or(SceneError::NotAMesh(key))?;
        Ok(mesh.world_normals(&spatial.world))
    }

    /// First non-`Inherit` value on the path to the root
    fn inherited<T: PartialEq + Copy>(
        &self,
        key: SpatialKey,
        inherit: T,
        local: impl Fn(&Spatial) -> T,
    ) -> Option<T> {
        let mut current = Some(key);
        while let Some(k) = current {
            let spatial = self.spatials.get(k)?;
            let value = local(spatial);
            if value != inherit {
                return Some(value);
            }
            current = spatial.parent;
        }
        None
    }

    /// Effective cull hint; `Dynamic` when nothing sets one
    pub fn cull_hint(&self, key: SpatialKey) -> CullHint {
        self.inherited(key, CullHint::Inherit, |s| s.cull_hint)
            .unwrap_or(CullHint::Dynamic)
    }

    /// Effective normals mode; `NormalizeIfScaled` when nothing sets one
    pub fn normals_mode(&self, key: SpatialKey) -> NormalsMode {
        self.inherited(key, NormalsMode::Inherit, |s| s.normals_mode)
            .unwrap_or(NormalsMode::NormalizeIfScaled)
    }

    /// Effective light combine mode; `CombineFirst` when nothing sets one
    pub fn light_combine_mode(&self, key: SpatialKey) -> LightCombineMode {
        self.inherited(key, LightCombineMode::Inherit, |s| s.light_combine_mode)
            .unwrap_or(LightCombineMode::CombineFirst)
    }

    /// Effective data mode; the configured default when nothing sets one
    pub fn data_mode(&self, key: SpatialKey) -> DataMode {
        self.inherited(key, DataMode::Inherit, |s| s.data_mode)
            .unwrap_or(match self.config.default_data_mode {
                DataMode::Inherit => DataMode::Arrays,
                mode => mode,
            })
    }
}

impl std::fmt::Debug for SceneGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneGraph")
            .field("spatials", &self.spatials.len())
            .field("config", &self.config)
            .finish()
    }
}
