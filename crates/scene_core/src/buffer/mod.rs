//! GPU buffer identity and lifecycle
//!
//! A [`BufferData`] owns one CPU buffer and the GPU ids allocated for it in
//! every context. The [`BufferRegistry`] tracks buffers that hold ids and
//! turns dropped buffers into deferred per-context deletions.

mod data;
mod registry;
mod vbo_info;

pub use data::{BufferData, BufferId, FloatBufferData, IndexBufferData, VboAccessMode, VboIdCache};
pub use registry::{BufferRegistry, IdsByContext};
pub use vbo_info::{VboInfo, VboKinds};
