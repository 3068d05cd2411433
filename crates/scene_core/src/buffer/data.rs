//! CPU-side buffer data with per-context GPU ids

use crate::error::{SceneError, SceneResult};
use crate::render::ContextKey;
use bytemuck::Pod;
use crossbeam_channel::Sender;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_BUFFER_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of one [`BufferData`]
///
/// Clones of a buffer get a fresh identity, so two buffers never share GPU
/// ids without an explicit copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(u64);

impl BufferId {
    fn next() -> Self {
        Self(NEXT_BUFFER_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value
    pub fn as_raw(self) -> u64 {
        self.0
    }
}

/// GPU ids of one buffer, keyed by rendering context
///
/// Readable from any render thread; an id is written only by the thread that
/// owns its context.
#[derive(Debug, Default)]
pub struct VboIdCache {
    ids: RwLock<HashMap<ContextKey, u32>>,
}

impl VboIdCache {
    /// Id allocated in `context`, if any
    pub fn get(&self, context: ContextKey) -> Option<u32> {
        self.ids.read().get(&context).copied()
    }

    pub(crate) fn set(&self, context: ContextKey, id: u32) {
        self.ids.write().insert(context, id);
    }

    /// Forget the id of `context`, returning it
    pub fn remove(&self, context: ContextKey) -> Option<u32> {
        self.ids.write().remove(&context)
    }

    /// Remove and return every id
    pub fn drain(&self) -> Vec<(ContextKey, u32)> {
        self.ids.write().drain().collect()
    }

    /// Snapshot of every id
    pub fn entries(&self) -> Vec<(ContextKey, u32)> {
        self.ids.read().iter().map(|(context, id)| (*context, *id)).collect()
    }

    /// Number of contexts holding an id
    pub fn len(&self) -> usize {
        self.ids.read().len()
    }

    /// Whether no context holds an id
    pub fn is_empty(&self) -> bool {
        self.ids.read().is_empty()
    }
}

/// Shared identity of a buffer; dropping the last buffer handle reports
/// the id to the registry it was registered with
pub(crate) struct BufferIdentity {
    pub(crate) id: BufferId,
    pub(crate) ids: Arc<VboIdCache>,
    pub(crate) expiry: Mutex<Option<Sender<BufferId>>>,
}

impl BufferIdentity {
    fn new() -> Self {
        Self {
            id: BufferId::next(),
            ids: Arc::new(VboIdCache::default()),
            expiry: Mutex::new(None),
        }
    }
}

impl Drop for BufferIdentity {
    fn drop(&mut self) {
        if let Some(expiry) = self.expiry.get_mut().take() {
            // A dropped registry simply never collects
            let _ = expiry.send(self.id);
        }
    }
}

/// Expected update frequency of a buffer's GPU copy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum VboAccessMode {
    /// Uploaded once, drawn many times
    #[default]
    StaticDraw,
    /// Updated occasionally
    DynamicDraw,
    /// Updated every frame
    StreamDraw,
}

/// One CPU buffer of `T` grouped in tuples, plus its GPU ids
pub struct BufferData<T: Pod> {
    data: Vec<T>,
    tuple_size: usize,
    access_mode: VboAccessMode,
    needs_refresh: AtomicBool,
    identity: Arc<BufferIdentity>,
}

/// Float attribute buffer (positions, normals, colors, texture coordinates)
pub type FloatBufferData = BufferData<f32>;

/// Index buffer
pub type IndexBufferData = BufferData<u32>;

impl<T: Pod> BufferData<T> {
    /// Wrap `data`, grouped in tuples of `tuple_size` (at least 1)
    pub fn new(data: Vec<T>, tuple_size: usize) -> Self {
        Self {
            data,
            tuple_size: tuple_size.max(1),
            access_mode: VboAccessMode::default(),
            needs_refresh: AtomicBool::new(true),
            identity: Arc::new(BufferIdentity::new()),
        }
    }

    /// Identity used by the registry
    pub fn buffer_id(&self) -> BufferId {
        self.identity.id
    }

    /// Raw elements
    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// Mutable elements; flags the GPU copy as stale
    pub fn data_mut(&mut self) -> &mut Vec<T> {
        *self.needs_refresh.get_mut() = true;
        &mut self.data
    }

    /// Elements as raw bytes for upload
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }

    /// Elements per tuple
    pub fn tuple_size(&self) -> usize {
        self.tuple_size
    }

    /// Number of complete tuples
    pub fn tuple_count(&self) -> usize {
        self.data.len() / self.tuple_size
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the buffer holds no elements
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Declared update frequency
    pub fn access_mode(&self) -> VboAccessMode {
        self.access_mode
    }

    /// Change the declared update frequency
    pub fn set_access_mode(&mut self, mode: VboAccessMode) {
        self.access_mode = mode;
    }

    /// Whether the GPU copy must be re-uploaded
    pub fn needs_refresh(&self) -> bool {
        self.needs_refresh.load(Ordering::Acquire)
    }

    /// Mark the GPU copy stale or fresh
    pub fn set_needs_refresh(&self, refresh: bool) {
        self.needs_refresh.store(refresh, Ordering::Release);
    }

    /// GPU id in `context`, `None` when nothing is allocated there
    pub fn vbo_id(&self, context: ContextKey) -> Option<u32> {
        self.identity.ids.get(context)
    }

    /// Record the GPU id allocated in `context`
    ///
    /// Valid ids are strictly positive.
    pub fn set_vbo_id(&self, context: ContextKey, id: i64) -> SceneResult<()> {
        let id = validate_vbo_id(id)?;
        self.identity.ids.set(context, id);
        Ok(())
    }

    /// Forget the GPU id of `context`, returning it
    pub fn remove_vbo_id(&self, context: ContextKey) -> Option<u32> {
        self.identity.ids.remove(context)
    }

    /// Every (context, id) pair currently held
    pub fn vbo_ids(&self) -> Vec<(ContextKey, u32)> {
        self.identity.ids.entries()
    }

    pub(crate) fn identity(&self) -> &Arc<BufferIdentity> {
        &self.identity
    }
}

impl<T: Pod> Clone for BufferData<T> {
    /// Copies the elements under a fresh identity with no GPU ids
    fn clone(&self) -> Self {
        let mut copy = Self::new(self.data.clone(), self.tuple_size);
        copy.access_mode = self.access_mode;
        copy
    }
}

impl<T: Pod> fmt::Debug for BufferData<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferData")
            .field("id", &self.identity.id)
            .field("len", &self.data.len())
            .field("tuple_size", &self.tuple_size)
            .field("access_mode", &self.access_mode)
            .finish()
    }
}

/// Check a GPU id is strictly positive and fits the id type
pub(crate) fn validate_vbo_id(id: i64) -> SceneResult<u32> {
    if id <= 0 {
        return Err(SceneError::InvalidArgument(format!("vbo id must be > 0, got {id}")));
    }
    u32::try_from(id).map_err(|_| SceneError::InvalidArgument(format!("vbo id {id} out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tuple_count() {
        let buffer = FloatBufferData::new(vec![0.0; 10], 3);
        assert_eq!(buffer.tuple_count(), 3);
        assert_eq!(buffer.as_bytes().len(), 40);
    }

    #[test]
    fn test_set_vbo_id_rejects_non_positive() {
        let buffer = FloatBufferData::new(vec![0.0; 3], 3);
        let context = ContextKey::unique();
        assert!(matches!(buffer.set_vbo_id(context, 0), Err(SceneError::InvalidArgument(_))));
        assert!(matches!(buffer.set_vbo_id(context, -4), Err(SceneError::InvalidArgument(_))));
        assert_eq!(buffer.vbo_id(context), None);

        buffer.set_vbo_id(context, 7).unwrap();
        assert_eq!(buffer.vbo_id(context), Some(7));
        assert_eq!(buffer.remove_vbo_id(context), Some(7));
        assert_eq!(buffer.remove_vbo_id(context), None);
    }

    #[test]
    fn test_clone_gets_fresh_identity() {
        let buffer = IndexBufferData::new(vec![0, 1, 2], 1);
        buffer.set_vbo_id(ContextKey::unique(), 3).unwrap();
        let copy = buffer.clone();

        assert_ne!(copy.buffer_id(), buffer.buffer_id());
        assert!(copy.vbo_ids().is_empty());
        assert_eq!(copy.data(), buffer.data());
    }

    #[test]
    fn test_data_mut_flags_refresh() {
        let mut buffer = FloatBufferData::new(vec![1.0, 2.0], 2);
        buffer.set_needs_refresh(false);
        buffer.data_mut().push(3.0);
        assert!(buffer.needs_refresh());
    }
}
