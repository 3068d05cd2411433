//! Per-context task queues
//!
//! Work that must happen on the thread owning a graphics context (deleting
//! GPU buffers in particular) is queued here and executed by that context's
//! render loop. Queues are unbounded.

use super::{ContextKey, Renderer};
use crate::config::TaskQueueConfig;
use crossbeam_channel::{Receiver, Sender};
use log::warn;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Work executed on a context's render thread
pub type RenderTask = Box<dyn FnOnce(&mut dyn Renderer) + Send>;

/// Queue of tasks for one context
pub struct TaskQueue {
    sender: Sender<RenderTask>,
    receiver: Receiver<RenderTask>,
    config: RwLock<TaskQueueConfig>,
}

impl TaskQueue {
    /// Create an empty queue
    pub fn new(config: TaskQueueConfig) -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self {
            sender,
            receiver,
            config: RwLock::new(config),
        }
    }

    /// Add a task; never blocks
    pub fn enqueue(&self, task: RenderTask) {
        // The receiver lives as long as the queue
        let _ = self.sender.send(task);
    }

    /// Number of tasks waiting
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    /// Current execution policy
    pub fn config(&self) -> TaskQueueConfig {
        self.config.read().clone()
    }

    /// Change the execution policy
    pub fn set_config(&self, config: TaskQueueConfig) {
        *self.config.write() = config;
    }

    /// Run queued tasks against `renderer`
    ///
    /// Runs a single task unless `execute_all` is set, in which case tasks run
    /// until the queue is empty or the time budget is spent. Returns the number
    /// of tasks run.
    pub fn execute(&self, renderer: &mut dyn Renderer) -> usize {
        let config = self.config();
        if !config.execute_all {
            return match self.receiver.try_recv() {
                Ok(task) => {
                    task(renderer);
                    1
                }
                Err(_) => 0,
            };
        }

        let budget = config.execution_time_ms.map(Duration::from_millis);
        let start = Instant::now();
        let mut executed = 0;
        while let Ok(task) = self.receiver.try_recv() {
            task(renderer);
            executed += 1;
            if budget.map_or(false, |budget| start.elapsed() >= budget) {
                break;
            }
        }
        executed
    }
}

/// Task queues of every context, created on first use
pub struct TaskQueueManager {
    queues: RwLock<HashMap<ContextKey, Arc<TaskQueue>>>,
    config: TaskQueueConfig,
}

impl TaskQueueManager {
    /// Create a manager whose queues use `config`
    pub fn new(config: TaskQueueConfig) -> Self {
        Self {
            queues: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Queue of `context`, created if missing
    pub fn queue(&self, context: ContextKey) -> Arc<TaskQueue> {
        if let Some(queue) = self.queues.read().get(&context) {
            return Arc::clone(queue);
        }
        let mut queues = self.queues.write();
        Arc::clone(
            queues
                .entry(context)
                .or_insert_with(|| Arc::new(TaskQueue::new(self.config.clone()))),
        )
    }

    /// Queue `task` for `context`
    pub fn enqueue(&self, context: ContextKey, task: RenderTask) {
        self.queue(context).enqueue(task);
    }

    /// Run the queue of the renderer's own context
    pub fn execute(&self, renderer: &mut dyn Renderer) -> usize {
        let queue = self.queues.read().get(&renderer.context_key()).cloned();
        queue.map_or(0, |queue| queue.execute(renderer))
    }

    /// Contexts that currently have a queue
    pub fn contexts(&self) -> Vec<ContextKey> {
        self.queues.read().keys().copied().collect()
    }

    /// Drop the queue of a context that will not render again
    ///
    /// Returns the number of tasks discarded with it.
    pub fn remove_context(&self, context: ContextKey) -> usize {
        let Some(queue) = self.queues.write().remove(&context) else {
            return 0;
        };
        let pending = queue.pending();
        if pending > 0 {
            warn!(
                "Context {:?} removed with {} pending tasks; they will never run",
                context, pending
            );
        }
        pending
    }
}

impl std::fmt::Debug for TaskQueueManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskQueueManager")
            .field("contexts", &self.queues.read().len())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferRegistry;
    use crate::render::headless::HeadlessRenderer;

    fn renderer_with(config: TaskQueueConfig) -> HeadlessRenderer {
        let tasks = Arc::new(TaskQueueManager::new(config));
        HeadlessRenderer::new(Arc::new(BufferRegistry::new(tasks)))
    }

    fn delete(id: u32) -> RenderTask {
        Box::new(move |renderer: &mut dyn Renderer| renderer.delete_buffers(&[id]))
    }

    #[test]
    fn test_execute_one_at_a_time() {
        let mut renderer = renderer_with(TaskQueueConfig {
            execute_all: false,
            execution_time_ms: None,
        });
        let queue = renderer.registry().task_queues().queue(renderer.context_key());
        queue.enqueue(delete(1));
        queue.enqueue(delete(2));

        assert_eq!(queue.execute(&mut renderer), 1);
        assert_eq!(queue.pending(), 1);
        assert_eq!(queue.execute(&mut renderer), 1);
        assert_eq!(queue.execute(&mut renderer), 0);
        assert_eq!(renderer.deleted_ids(), &[1, 2]);
    }

    #[test]
    fn test_execute_all_drains_queue() {
        let mut renderer = renderer_with(TaskQueueConfig::default());
        let queue = renderer.registry().task_queues().queue(renderer.context_key());
        for id in 1..=5 {
            queue.enqueue(delete(id));
        }
        assert_eq!(queue.execute(&mut renderer), 5);
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn test_zero_budget_still_runs_one_task() {
        let mut renderer = renderer_with(TaskQueueConfig {
            execute_all: true,
            execution_time_ms: Some(0),
        });
        let queue = renderer.registry().task_queues().queue(renderer.context_key());
        queue.enqueue(delete(1));
        queue.enqueue(delete(2));
        assert_eq!(queue.execute(&mut renderer), 1);
    }

    #[test]
    fn test_remove_context_reports_abandoned_tasks() {
        let manager = TaskQueueManager::new(TaskQueueConfig::default());
        let context = ContextKey::unique();
        manager.enqueue(context, delete(8));
        assert_eq!(manager.contexts(), vec![context]);
        assert_eq!(manager.remove_context(context), 1);
        assert_eq!(manager.remove_context(context), 0);
    }
}
