//! Rendering seam
//!
//! The scene graph never talks to a graphics API directly. Meshes describe
//! what to draw through the [`Renderer`] trait; deletions of GPU buffers owned
//! by other contexts travel through per-context [`task_queue`]s.

pub mod headless;
pub mod resolver;
pub mod state;
pub mod task_queue;

pub use headless::{DrawCall, HeadlessRenderer};
pub use resolver::{RenderStateResolver, StateExtractor, StateStacks};
pub use state::{RenderState, StateType};
pub use task_queue::{RenderTask, TaskQueue, TaskQueueManager};

use crate::bounding::Bound;
use crate::buffer::{FloatBufferData, IndexBufferData};
use crate::foundation::collections::SpatialKey;
use crate::foundation::math::{ColorRgba, Transform};
use crate::scene::{FrustumIntersect, IndexMode, InterleavedFormat, NormalsMode, SceneGraph};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_CONTEXT: AtomicU64 = AtomicU64::new(1);

/// Identity of one graphics context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextKey(u64);

impl ContextKey {
    /// A key no other context uses
    pub fn unique() -> Self {
        Self(NEXT_CONTEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Wrap an externally allocated context identity
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw numeric value
    pub const fn as_raw(self) -> u64 {
        self.0
    }
}

/// Per-vertex attribute streams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    /// Positions
    Vertex,
    /// Normals
    Normal,
    /// Colors
    Color,
    /// Texture coordinates of one unit
    TexCoord(u32),
}

/// Graphics API binding bound to one context
pub trait Renderer {
    /// Context this renderer draws into
    fn context_key(&self) -> ContextKey;

    /// Free GPU buffers of this context
    fn delete_buffers(&mut self, ids: &[u32]);

    /// Apply one effective render state
    fn apply_state(&mut self, state_type: StateType, state: &RenderState);

    /// Load the world transform; returns whether anything was pushed
    fn do_transforms(&mut self, world: &Transform) -> bool;

    /// Undo a successful [`Renderer::do_transforms`]
    fn undo_transforms(&mut self, world: &Transform);

    /// Configure normal handling; `world` is `None` when normals are off
    fn apply_normals_mode(&mut self, mode: NormalsMode, world: Option<&Transform>);

    /// Color used when a mesh has no color buffer; `None` resets it
    fn apply_default_color(&mut self, color: Option<ColorRgba>);

    /// Bind or unbind one attribute stream
    fn setup_attribute(&mut self, kind: AttributeKind, data: Option<&FloatBufferData>, vbo: bool);

    /// Bind an interleaved buffer described by `format`
    fn setup_interleaved(&mut self, interleaved: &FloatBufferData, format: InterleavedFormat);

    /// Draw indexed sections
    fn draw_elements(
        &mut self,
        indices: &IndexBufferData,
        lengths: Option<&[usize]>,
        modes: &[IndexMode],
        vbo: bool,
    );

    /// Draw vertices in order
    fn draw_arrays(
        &mut self,
        vertices: &FloatBufferData,
        lengths: Option<&[usize]>,
        modes: &[IndexMode],
    );

    /// Whether GPU buffers can be used at all
    fn is_vbo_supported(&self) -> bool {
        true
    }

    /// Stop sourcing attributes from GPU buffers
    fn unbind_vbo(&mut self) {}

    /// Test a world bound against the view
    fn cull_test(&mut self, _bound: &Bound) -> FrustumIntersect {
        FrustumIntersect::Intersects
    }
}

/// Replaces the default drawing of a spatial in one context
pub trait RenderDelegate: Send + Sync {
    /// Draw `spatial` instead of the default path
    fn render(&self, graph: &SceneGraph, spatial: SpatialKey, renderer: &mut dyn Renderer);
}
