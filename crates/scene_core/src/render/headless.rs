//! Recording renderer without a graphics API
//!
//! Allocates GPU ids per context the way a real binding would (sequential,
//! starting at 1) and records every call so tests and tools can inspect what
//! a frame submitted.

use super::{AttributeKind, ContextKey, RenderState, Renderer, StateType};
use crate::bounding::{Bound, BoundingBox, BoundingVolume};
use crate::buffer::{BufferData, BufferRegistry, FloatBufferData, IndexBufferData};
use crate::foundation::math::{ColorRgba, Transform};
use crate::scene::{FrustumIntersect, IndexMode, InterleavedFormat, NormalsMode};
use bytemuck::Pod;
use log::warn;
use std::sync::Arc;

/// One recorded draw
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    /// Issued through `draw_elements`
    pub indexed: bool,
    /// Sourced from GPU buffers
    pub vbo: bool,
    /// Indices (or vertices) submitted
    pub count: usize,
    /// Index modes of the sections drawn
    pub modes: Vec<IndexMode>,
    /// World transform loaded at draw time
    pub world: Option<Transform>,
    /// Attribute streams bound at draw time
    pub attributes: Vec<AttributeKind>,
}

/// Renderer that records instead of drawing
pub struct HeadlessRenderer {
    context: ContextKey,
    registry: Arc<BufferRegistry>,
    next_id: u32,
    view_volume: Option<BoundingBox>,
    world: Option<Transform>,
    attributes: Vec<AttributeKind>,
    draws: Vec<DrawCall>,
    applied: Vec<RenderState>,
    deleted: Vec<u32>,
    default_color: Option<ColorRgba>,
    normals_mode: Option<NormalsMode>,
    uploads: usize,
}

impl HeadlessRenderer {
    /// New renderer with its own context
    pub fn new(registry: Arc<BufferRegistry>) -> Self {
        Self::with_context(ContextKey::unique(), registry)
    }

    /// New renderer for an existing context
    pub fn with_context(context: ContextKey, registry: Arc<BufferRegistry>) -> Self {
        Self {
            context,
            registry,
            next_id: 1,
            view_volume: None,
            world: None,
            attributes: Vec::new(),
            draws: Vec::new(),
            applied: Vec::new(),
            deleted: Vec::new(),
            default_color: None,
            normals_mode: None,
            uploads: 0,
        }
    }

    /// Registry ids are recorded in
    pub fn registry(&self) -> &Arc<BufferRegistry> {
        &self.registry
    }

    /// Cull against `volume`; `None` treats everything as intersecting
    pub fn set_view_volume(&mut self, volume: Option<BoundingBox>) {
        self.view_volume = volume;
    }

    /// Draws recorded since the last [`HeadlessRenderer::clear_frame`]
    pub fn draws(&self) -> &[DrawCall] {
        &self.draws
    }

    /// States applied since the last [`HeadlessRenderer::clear_frame`]
    pub fn applied_states(&self) -> &[RenderState] {
        &self.applied
    }

    /// Every GPU id deleted in this context
    pub fn deleted_ids(&self) -> &[u32] {
        &self.deleted
    }

    /// Buffer uploads performed
    pub fn uploads(&self) -> usize {
        self.uploads
    }

    /// Last default color applied
    pub fn default_color(&self) -> Option<ColorRgba> {
        self.default_color
    }

    /// Last normals mode applied
    pub fn normals_mode(&self) -> Option<NormalsMode> {
        self.normals_mode
    }

    /// Forget the per-frame records
    pub fn clear_frame(&mut self) {
        self.draws.clear();
        self.applied.clear();
    }

    /// Run this context's pending tasks
    pub fn execute_tasks(&mut self) -> usize {
        let tasks = Arc::clone(self.registry.task_queues());
        tasks.execute(self)
    }

    fn ensure_vbo<T: Pod>(&mut self, data: &BufferData<T>) {
        if data.vbo_id(self.context).is_none() {
            let id = self.next_id;
            if let Err(err) = self.registry.set_id(data, self.context, i64::from(id)) {
                warn!("Failed to record vbo id: {}", err);
                return;
            }
            self.next_id += 1;
            data.set_needs_refresh(true);
        }
        if data.needs_refresh() {
            self.uploads += 1;
            data.set_needs_refresh(false);
        }
    }
}

impl Renderer for HeadlessRenderer {
    fn context_key(&self) -> ContextKey {
        self.context
    }

    fn delete_buffers(&mut self, ids: &[u32]) {
        self.deleted.extend_from_slice(ids);
    }

    fn apply_state(&mut self, _state_type: StateType, state: &RenderState) {
        self.applied.push(state.clone());
    }

    fn do_transforms(&mut self, world: &Transform) -> bool {
        if world.is_identity() {
            return false;
        }
        self.world = Some(world.clone());
        true
    }

    fn undo_transforms(&mut self, _world: &Transform) {
        self.world = None;
    }

    fn apply_normals_mode(&mut self, mode: NormalsMode, _world: Option<&Transform>) {
        self.normals_mode = Some(mode);
    }

    fn apply_default_color(&mut self, color: Option<ColorRgba>) {
        self.default_color = color;
    }

    fn setup_attribute(&mut self, kind: AttributeKind, data: Option<&FloatBufferData>, vbo: bool) {
        self.attributes.retain(|bound| *bound != kind);
        if let Some(data) = data {
            if vbo {
                self.ensure_vbo(data);
            }
            self.attributes.push(kind);
        }
    }

    fn setup_interleaved(&mut self, interleaved: &FloatBufferData, format: InterleavedFormat) {
        self.ensure_vbo(interleaved);
        self.attributes.clear();
        self.attributes.push(AttributeKind::Vertex);
        if format.normals {
            self.attributes.push(AttributeKind::Normal);
        }
        if format.colors {
            self.attributes.push(AttributeKind::Color);
        }
        for unit in 0..format.texture_units {
            self.attributes.push(AttributeKind::TexCoord(unit as u32));
        }
    }

    fn draw_elements(
        &mut self,
        indices: &IndexBufferData,
        lengths: Option<&[usize]>,
        modes: &[IndexMode],
        vbo: bool,
    ) {
        if vbo {
            self.ensure_vbo(indices);
        }
        let count = lengths.map_or(indices.len(), |lengths| lengths.iter().sum());
        self.draws.push(DrawCall {
            indexed: true,
            vbo,
            count,
            modes: modes.to_vec(),
            world: self.world.clone(),
            attributes: self.attributes.clone(),
        });
    }

    fn draw_arrays(
        &mut self,
        vertices: &FloatBufferData,
        lengths: Option<&[usize]>,
        modes: &[IndexMode],
    ) {
        let count = lengths.map_or(vertices.tuple_count(), |lengths| lengths.iter().sum());
        let vbo = vertices.vbo_id(self.context).is_some()
            && self.attributes.contains(&AttributeKind::Vertex);
        self.draws.push(DrawCall {
            indexed: false,
            vbo,
            count,
            modes: modes.to_vec(),
            world: self.world.clone(),
            attributes: self.attributes.clone(),
        });
    }

    fn unbind_vbo(&mut self) {
        self.attributes.clear();
    }

    fn cull_test(&mut self, bound: &Bound) -> FrustumIntersect {
        let Some(view) = &self.view_volume else {
            return FrustumIntersect::Intersects;
        };
        let other = bound.to_box();
        let disjoint = (0..3).any(|i| other.max[i] < view.min[i] || other.min[i] > view.max[i]);
        if disjoint {
            FrustumIntersect::Outside
        } else if view.contains_bound(bound) {
            FrustumIntersect::Inside
        } else {
            FrustumIntersect::Intersects
        }
    }
}

impl std::fmt::Debug for HeadlessRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeadlessRenderer")
            .field("context", &self.context)
            .field("draws", &self.draws.len())
            .field("deleted", &self.deleted.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounding::BoundingSphere;
    use crate::config::TaskQueueConfig;
    use crate::foundation::math::Point3;
    use crate::render::TaskQueueManager;

    fn renderer() -> HeadlessRenderer {
        let tasks = Arc::new(TaskQueueManager::new(TaskQueueConfig::default()));
        HeadlessRenderer::new(Arc::new(BufferRegistry::new(tasks)))
    }

    #[test]
    fn test_vbo_ids_allocated_once_per_buffer() {
        let mut renderer = renderer();
        let vertices = FloatBufferData::new(vec![0.0; 9], 3);
        renderer.setup_attribute(AttributeKind::Vertex, Some(&vertices), true);
        renderer.setup_attribute(AttributeKind::Vertex, Some(&vertices), true);

        assert_eq!(vertices.vbo_id(renderer.context_key()), Some(1));
        assert_eq!(renderer.uploads(), 1);
        assert!(renderer.registry().is_live(vertices.buffer_id()));
    }

    #[test]
    fn test_cull_test_against_view_volume() {
        let mut renderer = renderer();
        renderer.set_view_volume(Some(BoundingBox::new(
            Point3::new(-10.0, -10.0, -10.0),
            Point3::new(10.0, 10.0, 10.0),
        )));

        let inside = Bound::Sphere(BoundingSphere::new(Point3::origin(), 1.0));
        let outside = Bound::Sphere(BoundingSphere::new(Point3::new(50.0, 0.0, 0.0), 1.0));
        let straddling = Bound::Sphere(BoundingSphere::new(Point3::new(10.0, 0.0, 0.0), 1.0));

        assert_eq!(renderer.cull_test(&inside), FrustumIntersect::Inside);
        assert_eq!(renderer.cull_test(&outside), FrustumIntersect::Outside);
        assert_eq!(renderer.cull_test(&straddling), FrustumIntersect::Intersects);
    }
}
