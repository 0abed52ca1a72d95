//! Cancellation handles for in-flight task executions.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;

use crate::task::domain::TaskId;

/// Maps task identifiers to the cancellation token of their execution.
///
/// Entries are inserted by [`HandleRegistry::register`] just before the
/// execution is spawned and removed when the returned [`HandleGuard`] drops
/// at the end of the execution, so each entry is removed exactly once.
#[derive(Debug, Default)]
pub(crate) struct HandleRegistry {
    handles: Mutex<HashMap<TaskId, CancellationToken>>,
}

impl HandleRegistry {
    fn lock(&self) -> MutexGuard<'_, HashMap<TaskId, CancellationToken>> {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inserts `token` for `task_id` and returns the guard that removes it.
    pub(crate) fn register(
        self: &Arc<Self>,
        task_id: TaskId,
        token: CancellationToken,
    ) -> HandleGuard {
        self.lock().insert(task_id, token);
        HandleGuard {
            registry: Arc::clone(self),
            task_id,
        }
    }

    /// Cancels the execution of `task_id`; returns `false` when none is live.
    pub(crate) fn cancel(&self, task_id: TaskId) -> bool {
        self.lock().get(&task_id).map(CancellationToken::cancel).is_some()
    }

    /// Returns `true` while an execution for `task_id` is registered.
    pub(crate) fn contains(&self, task_id: TaskId) -> bool {
        self.lock().contains_key(&task_id)
    }

    /// Returns the number of registered executions.
    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }
}

/// Removes its registry entry on drop.
#[derive(Debug)]
pub(crate) struct HandleGuard {
    registry: Arc<HandleRegistry>,
    task_id: TaskId,
}

impl Drop for HandleGuard {
    fn drop(&mut self) {
        self.registry.lock().remove(&self.task_id);
    }
}
