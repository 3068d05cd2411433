//! Live buffer tracking and deferred GPU deletion
//!
//! The registry holds a weak handle to every buffer that owns GPU ids. When
//! the last handle to a registered buffer drops, its identity is reported on
//! a channel; [`BufferRegistry::collect_expired`] turns those reports into
//! the per-context ids that must be deleted, and [`BufferRegistry::delete_now`]
//! deletes them on the right thread: immediately for the caller's context,
//! through that context's task queue for every other one.
//!
//! Queued deletions run the next time their context executes its queue. A
//! context that never renders again never frees them.

use super::data::{BufferData, BufferId, BufferIdentity, VboIdCache};
use crate::error::SceneResult;
use crate::render::task_queue::TaskQueueManager;
use crate::render::{ContextKey, Renderer};
use bytemuck::Pod;
use crossbeam_channel::{Receiver, Sender};
use log::{debug, trace};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

/// GPU ids grouped by the context that owns them
pub type IdsByContext = HashMap<ContextKey, Vec<u32>>;

struct LiveEntry {
    identity: Weak<BufferIdentity>,
    ids: Arc<VboIdCache>,
}

/// Registry of live buffers for one engine instance
pub struct BufferRegistry {
    live: RwLock<HashMap<BufferId, LiveEntry>>,
    expired_tx: Sender<BufferId>,
    expired_rx: Receiver<BufferId>,
    tasks: Arc<TaskQueueManager>,
}

impl BufferRegistry {
    /// Create a registry that defers foreign deletions to `tasks`
    pub fn new(tasks: Arc<TaskQueueManager>) -> Self {
        let (expired_tx, expired_rx) = crossbeam_channel::unbounded();
        Self {
            live: RwLock::new(HashMap::new()),
            expired_tx,
            expired_rx,
            tasks,
        }
    }

    /// Per-context task queues used for deferred deletion
    pub fn task_queues(&self) -> &Arc<TaskQueueManager> {
        &self.tasks
    }

    /// Start tracking `buffer`; returns `false` if it already was tracked
    pub fn register_live<T: Pod>(&self, buffer: &BufferData<T>) -> bool {
        let identity = buffer.identity();
        let mut live = self.live.write();
        if live.contains_key(&identity.id) {
            return false;
        }

        let mut expiry = identity.expiry.lock();
        if expiry.is_some() {
            // Tracked by another registry
            return false;
        }
        *expiry = Some(self.expired_tx.clone());
        live.insert(
            identity.id,
            LiveEntry {
                identity: Arc::downgrade(identity),
                ids: Arc::clone(&identity.ids),
            },
        );
        trace!("Registered buffer {:?}", identity.id);
        true
    }

    /// Whether `id` names a tracked buffer that is still alive
    pub fn is_live(&self, id: BufferId) -> bool {
        self.live
            .read()
            .get(&id)
            .map_or(false, |entry| entry.identity.strong_count() > 0)
    }

    /// Number of tracked buffers, including dropped ones not yet collected
    pub fn live_count(&self) -> usize {
        self.live.read().len()
    }

    /// Id of `buffer` in `context`; never allocates
    pub fn get_id<T: Pod>(&self, buffer: &BufferData<T>, context: ContextKey) -> Option<u32> {
        buffer.vbo_id(context)
    }

    /// Record the id allocated for `buffer` in `context` and track the buffer
    pub fn set_id<T: Pod>(
        &self,
        buffer: &BufferData<T>,
        context: ContextKey,
        id: i64,
    ) -> SceneResult<()> {
        buffer.set_vbo_id(context, id)?;
        self.register_live(buffer);
        Ok(())
    }

    /// Forget the id of `buffer` in `context`, returning it
    pub fn remove_id<T: Pod>(&self, buffer: &BufferData<T>, context: ContextKey) -> Option<u32> {
        buffer.remove_vbo_id(context)
    }

    /// Drain every buffer dropped since the last call and return its ids
    ///
    /// Each id is returned exactly once.
    pub fn collect_expired(&self) -> IdsByContext {
        let mut collected = IdsByContext::new();
        let expired: Vec<BufferId> = self.expired_rx.try_iter().collect();
        if expired.is_empty() {
            return collected;
        }

        let mut live = self.live.write();
        for id in expired {
            if let Some(entry) = live.remove(&id) {
                gather(&mut collected, entry.ids.drain());
            }
        }
        collected
    }

    /// Expired ids plus every id held by live buffers, which lose them
    pub fn collect_all(&self) -> IdsByContext {
        let mut collected = self.collect_expired();
        for entry in self.live.read().values() {
            gather(&mut collected, entry.ids.drain());
        }
        collected
    }

    /// Delete ids now for the active renderer's context and queue the rest
    pub fn delete_now(&self, ids_by_context: IdsByContext, mut active: Option<&mut dyn Renderer>) {
        for (context, ids) in ids_by_context {
            if ids.is_empty() {
                continue;
            }
            match active.as_deref_mut() {
                Some(renderer) if renderer.context_key() == context => {
                    debug!("Deleting {} buffer ids in current context {:?}", ids.len(), context);
                    renderer.delete_buffers(&ids);
                }
                _ => {
                    debug!(
                        "Queueing deletion of {} buffer ids for context {:?}",
                        ids.len(),
                        context
                    );
                    self.tasks.enqueue(context, Box::new(move |renderer: &mut dyn Renderer| {
                        renderer.delete_buffers(&ids);
                    }));
                }
            }
        }
    }

    /// Collect expired buffers and delete their ids; returns the id count
    pub fn clean_expired(&self, active: Option<&mut dyn Renderer>) -> usize {
        let ids = self.collect_expired();
        let count = ids.values().map(Vec::len).sum();
        self.delete_now(ids, active);
        count
    }

    /// Delete every tracked id, live or expired; returns the id count
    pub fn clean_all(&self, active: Option<&mut dyn Renderer>) -> usize {
        let ids = self.collect_all();
        let count = ids.values().map(Vec::len).sum();
        self.delete_now(ids, active);
        count
    }
}

impl std::fmt::Debug for BufferRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferRegistry")
            .field("live", &self.live_count())
            .field("pending_expired", &self.expired_rx.len())
            .finish()
    }
}

fn gather(collected: &mut IdsByContext, ids: Vec<(ContextKey, u32)>) {
    for (context, id) in ids {
        collected.entry(context).or_default().push(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::FloatBufferData;
    use crate::config::TaskQueueConfig;
    use crate::error::SceneError;
    use crate::render::headless::HeadlessRenderer;

    fn registry() -> Arc<BufferRegistry> {
        Arc::new(BufferRegistry::new(Arc::new(TaskQueueManager::new(TaskQueueConfig::default()))))
    }

    #[test]
    fn test_register_live_is_idempotent() {
        let registry = registry();
        let buffer = FloatBufferData::new(vec![0.0; 3], 3);
        assert!(registry.register_live(&buffer));
        assert!(!registry.register_live(&buffer));
        assert_eq!(registry.live_count(), 1);
        assert!(registry.is_live(buffer.buffer_id()));
    }

    #[test]
    fn test_buffer_tracked_by_one_registry_only() {
        let first = registry();
        let second = registry();
        let buffer = FloatBufferData::new(vec![0.0; 3], 3);
        assert!(first.register_live(&buffer));
        assert!(!second.register_live(&buffer));
        assert_eq!(second.live_count(), 0);
    }

    #[test]
    fn test_id_validity() {
        let registry = registry();
        let buffer = FloatBufferData::new(vec![0.0; 3], 3);
        let context = ContextKey::unique();

        assert_eq!(registry.get_id(&buffer, context), None);
        assert!(matches!(
            registry.set_id(&buffer, context, 0),
            Err(SceneError::InvalidArgument(_))
        ));
        assert_eq!(registry.live_count(), 0);

        registry.set_id(&buffer, context, 12).unwrap();
        assert_eq!(registry.get_id(&buffer, context), Some(12));
        assert_eq!(registry.live_count(), 1);
        assert_eq!(registry.remove_id(&buffer, context), Some(12));
        assert_eq!(registry.remove_id(&buffer, context), None);
    }

    #[test]
    fn test_expired_ids_collected_exactly_once() {
        let registry = registry();
        let (a, b) = (ContextKey::unique(), ContextKey::unique());

        let buffer = FloatBufferData::new(vec![0.0; 6], 3);
        registry.set_id(&buffer, a, 1).unwrap();
        registry.set_id(&buffer, b, 5).unwrap();
        let keep = FloatBufferData::new(vec![0.0; 3], 3);
        registry.set_id(&keep, a, 2).unwrap();

        assert!(registry.collect_expired().is_empty());
        drop(buffer);

        let expired = registry.collect_expired();
        assert_eq!(expired.get(&a), Some(&vec![1]));
        assert_eq!(expired.get(&b), Some(&vec![5]));
        assert!(registry.collect_expired().is_empty());
        assert_eq!(registry.live_count(), 1);
        assert_eq!(keep.vbo_id(a), Some(2));
    }

    #[test]
    fn test_collect_all_drains_live_buffers() {
        let registry = registry();
        let context = ContextKey::unique();
        let buffer = FloatBufferData::new(vec![0.0; 3], 3);
        registry.set_id(&buffer, context, 9).unwrap();

        let all = registry.collect_all();
        assert_eq!(all.get(&context), Some(&vec![9]));
        assert_eq!(buffer.vbo_id(context), None);
        assert!(registry.collect_all().is_empty());
    }

    #[test]
    fn test_delete_now_splits_current_and_foreign_contexts() {
        let registry = registry();
        let mut current = HeadlessRenderer::new(Arc::clone(&registry));
        let mut other = HeadlessRenderer::new(Arc::clone(&registry));

        let mut ids = IdsByContext::new();
        ids.insert(current.context_key(), vec![1, 2]);
        ids.insert(other.context_key(), vec![3]);
        registry.delete_now(ids, Some(&mut current));

        assert_eq!(current.deleted_ids(), &[1, 2]);
        assert!(other.deleted_ids().is_empty());
        assert_eq!(registry.task_queues().queue(other.context_key()).pending(), 1);

        assert_eq!(other.execute_tasks(), 1);
        assert_eq!(other.deleted_ids(), &[3]);
    }

    #[test]
    fn test_delete_without_active_renderer_queues_everything() {
        let registry = registry();
        let context = ContextKey::unique();
        let mut ids = IdsByContext::new();
        ids.insert(context, vec![4]);
        registry.delete_now(ids, None);
        assert_eq!(registry.task_queues().queue(context).pending(), 1);
    }
}
