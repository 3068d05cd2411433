//! Spatial records stored in the scene graph arena
//!
//! Every element of the tree is a [`Spatial`]: a name, a local and derived
//! world transform, a derived world bound, dirty marks, render state
//! overrides and the resolved states, controllers and hints. What differs
//! between interior nodes and drawable leaves lives in [`SpatialKind`].

use super::controller::Controller;
use super::dirty::{DirtyEventListener, DirtyMarks, DirtyType};
use super::hints::{
    CullHint, DataMode, FrustumIntersect, LightCombineMode, NormalsMode, PickingHints,
};
use super::mesh::Mesh;
use crate::bounding::Bound;
use crate::foundation::collections::SpatialKey;
use crate::foundation::math::Transform;
use crate::render::{ContextKey, RenderDelegate, RenderState, StateType};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Closed set of spatial variants
pub enum SpatialKind {
    /// Interior node owning an ordered list of children
    Node(Vec<SpatialKey>),
    /// Drawable leaf
    Mesh(Box<Mesh>),
}

/// One element of the scene graph
pub struct Spatial {
    pub(crate) name: String,
    pub(crate) parent: Option<SpatialKey>,
    pub(crate) local: Transform,
    pub(crate) world: Transform,
    pub(crate) world_bound: Option<Bound>,
    pub(crate) dirty: DirtyMarks,
    pub(crate) overrides: [Option<Arc<RenderState>>; StateType::COUNT],
    pub(crate) resolved: [Option<Arc<RenderState>>; StateType::COUNT],
    pub(crate) controllers: Vec<Box<dyn Controller>>,
    pub(crate) controller_generation: u64,
    pub(crate) listener: Option<Arc<dyn DirtyEventListener>>,
    pub(crate) delegates: HashMap<ContextKey, Arc<dyn RenderDelegate>>,
    pub(crate) user_data: Option<Box<dyn Any + Send + Sync>>,
    pub(crate) frustum: AtomicU8,
    pub(crate) cull_hint: CullHint,
    pub(crate) normals_mode: NormalsMode,
    pub(crate) light_combine_mode: LightCombineMode,
    pub(crate) data_mode: DataMode,
    pub(crate) picking: PickingHints,
    pub(crate) z_order: i32,
    pub(crate) kind: SpatialKind,
}

impl Spatial {
    pub(crate) fn new(name: impl Into<String>, kind: SpatialKind) -> Self {
        Self {
            name: name.into(),
            parent: None,
            local: Transform::identity(),
            world: Transform::identity(),
            world_bound: None,
            dirty: DirtyMarks::RECOMPUTE,
            overrides: Default::default(),
            resolved: Default::default(),
            controllers: Vec::new(),
            controller_generation: 0,
            listener: None,
            delegates: HashMap::new(),
            user_data: None,
            frustum: AtomicU8::new(FrustumIntersect::Intersects as u8),
            cull_hint: CullHint::Inherit,
            normals_mode: NormalsMode::Inherit,
            light_combine_mode: LightCombineMode::Inherit,
            data_mode: DataMode::Inherit,
            picking: PickingHints::default(),
            z_order: 0,
            kind,
        }
    }

    /// Name, not necessarily unique
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Parent node, `None` for a root
    pub fn parent(&self) -> Option<SpatialKey> {
        self.parent
    }

    /// Transform relative to the parent
    pub fn local_transform(&self) -> &Transform {
        &self.local
    }

    /// Derived world transform, valid once the transform mark is clear
    pub fn world_transform(&self) -> &Transform {
        &self.world
    }

    /// Derived world bound, valid once the bounding mark is clear
    pub fn world_bound(&self) -> Option<&Bound> {
        self.world_bound.as_ref()
    }

    /// Pending invalidations
    pub fn dirty_marks(&self) -> DirtyMarks {
        self.dirty
    }

    /// Whether `dirty` is pending on this spatial
    pub fn is_dirty(&self, dirty: DirtyType) -> bool {
        self.dirty.contains(dirty.mark())
    }

    /// Variant data
    pub fn kind(&self) -> &SpatialKind {
        &self.kind
    }

    /// Whether this is an interior node
    pub fn is_node(&self) -> bool {
        matches!(self.kind, SpatialKind::Node(_))
    }

    /// Ordered children; empty for meshes
    pub fn children(&self) -> &[SpatialKey] {
        match &self.kind {
            SpatialKind::Node(children) => children,
            SpatialKind::Mesh(_) => &[],
        }
    }

    /// Mesh data, if this is a mesh
    pub fn as_mesh(&self) -> Option<&Mesh> {
        match &self.kind {
            SpatialKind::Mesh(mesh) => Some(mesh),
            SpatialKind::Node(_) => None,
        }
    }

    pub(crate) fn as_mesh_mut(&mut self) -> Option<&mut Mesh> {
        match &mut self.kind {
            SpatialKind::Mesh(mesh) => Some(mesh),
            SpatialKind::Node(_) => None,
        }
    }

    pub(crate) fn children_mut(&mut self) -> Option<&mut Vec<SpatialKey>> {
        match &mut self.kind {
            SpatialKind::Node(children) => Some(children),
            SpatialKind::Mesh(_) => None,
        }
    }

    /// Override set on this spatial for `state_type`
    pub fn render_state_override(&self, state_type: StateType) -> Option<&Arc<RenderState>> {
        self.overrides[state_type.index()].as_ref()
    }

    /// Effective state from the last resolution, or the type's default
    pub fn render_state(&self, state_type: StateType) -> Arc<RenderState> {
        match &self.resolved[state_type.index()] {
            Some(state) => Arc::clone(state),
            None => RenderState::default_for(state_type),
        }
    }

    /// Number of attached controllers
    pub fn controller_count(&self) -> usize {
        self.controllers.len()
    }

    /// Observer of dirty events at or below this spatial
    pub fn listener(&self) -> Option<&Arc<dyn DirtyEventListener>> {
        self.listener.as_ref()
    }

    /// Install or remove the dirty event observer
    ///
    /// The listener is scoped to the current tree position and is removed
    /// when this spatial is detached.
    pub fn set_listener(&mut self, listener: Option<Arc<dyn DirtyEventListener>>) {
        self.listener = listener;
    }

    /// Delegate drawing this spatial in `context`
    pub fn render_delegate(&self, context: ContextKey) -> Option<&Arc<dyn RenderDelegate>> {
        self.delegates.get(&context)
    }

    /// Install or remove the delegate used in `context`
    pub fn set_render_delegate(
        &mut self,
        context: ContextKey,
        delegate: Option<Arc<dyn RenderDelegate>>,
    ) {
        match delegate {
            Some(delegate) => {
                self.delegates.insert(context, delegate);
            }
            None => {
                self.delegates.remove(&context);
            }
        }
    }

    /// Opaque application data
    pub fn user_data(&self) -> Option<&(dyn Any + Send + Sync)> {
        self.user_data.as_deref()
    }

    /// Application data downcast to `T`
    pub fn user_data_as<T: Any>(&self) -> Option<&T> {
        self.user_data.as_ref()?.downcast_ref::<T>()
    }

    /// Replace the application data
    pub fn set_user_data(&mut self, data: Option<Box<dyn Any + Send + Sync>>) {
        self.user_data = data;
    }

    /// Result of the last frustum test
    pub fn last_frustum_intersection(&self) -> FrustumIntersect {
        FrustumIntersect::from_u8(self.frustum.load(Ordering::Relaxed))
    }

    /// Record a frustum test result; callable while the graph is shared
    pub fn set_last_frustum_intersection(&self, intersect: FrustumIntersect) {
        self.frustum.store(intersect as u8, Ordering::Relaxed);
    }

    /// Local cull hint
    pub fn cull_hint(&self) -> CullHint {
        self.cull_hint
    }

    /// Set the local cull hint
    pub fn set_cull_hint(&mut self, hint: CullHint) {
        self.cull_hint = hint;
    }

    /// Local normals mode
    pub fn normals_mode(&self) -> NormalsMode {
        self.normals_mode
    }

    /// Set the local normals mode
    pub fn set_normals_mode(&mut self, mode: NormalsMode) {
        self.normals_mode = mode;
    }

    /// Local light combine mode; change it through
    /// [`SceneGraph::set_light_combine_mode`](super::SceneGraph::set_light_combine_mode)
    pub fn local_light_combine_mode(&self) -> LightCombineMode {
        self.light_combine_mode
    }

    /// Local data mode
    pub fn data_mode(&self) -> DataMode {
        self.data_mode
    }

    /// Set the local data mode
    pub fn set_data_mode(&mut self, mode: DataMode) {
        self.data_mode = mode;
    }

    /// Picking participation
    pub fn picking_hints(&self) -> PickingHints {
        self.picking
    }

    /// Set picking participation
    pub fn set_picking_hints(&mut self, hints: PickingHints) {
        self.picking = hints;
    }

    /// Draw order key used by render queues
    pub fn z_order(&self) -> i32 {
        self.z_order
    }

    /// Set the draw order key
    pub fn set_z_order(&mut self, z_order: i32) {
        self.z_order = z_order;
    }
}

impl fmt::Debug for Spatial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.kind {
            SpatialKind::Node(children) => format!("Node({} children)", children.len()),
            SpatialKind::Mesh(_) => "Mesh".to_string(),
        };
        f.debug_struct("Spatial")
            .field("name", &self.name)
            .field("kind", &kind)
            .field("parent", &self.parent)
            .field("dirty", &self.dirty)
            .field("local", &self.local)
            .field("world_bound", &self.world_bound)
            .finish_non_exhaustive()
    }
}
