//! Repository port for task persistence and read-side queries.

use crate::task::domain::{Task, TaskId, TaskStats};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for task repository operations.
pub type TaskRepositoryResult<T> = Result<T, TaskRepositoryError>;

/// Task persistence contract.
///
/// Every write is an atomic single-row operation. [`TaskRepository::update`]
/// is a compare-and-swap on the task version, so a writer holding a stale
/// copy can never overwrite a newer record, terminal or not.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Stores a new task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskRepositoryError::DuplicateTask`] when the task ID already
    /// exists.
    async fn store(&self, task: &Task) -> TaskRepositoryResult<()>;

    /// Persists `task` if the stored version equals `task.version()`, then
    /// advances `task`'s version to match the stored record.
    ///
    /// # Errors
    ///
    /// Returns [`TaskRepositoryError::NotFound`] when the task does not exist
    /// or [`TaskRepositoryError::VersionConflict`] when another writer got
    /// there first; `task` is left unchanged in both cases.
    async fn update(&self, task: &mut Task) -> TaskRepositoryResult<()>;

    /// Finds a task by identifier.
    async fn find_by_id(&self, id: TaskId) -> TaskRepositoryResult<Option<Task>>;

    /// Returns the running task with the latest start time.
    async fn find_latest_running(&self) -> TaskRepositoryResult<Option<Task>>;

    /// Returns pending tasks, oldest first.
    async fn list_pending(&self) -> TaskRepositoryResult<Vec<Task>>;

    /// Returns up to `limit` terminal tasks, newest completion first.
    async fn list_recent_terminal(&self, limit: usize) -> TaskRepositoryResult<Vec<Task>>;

    /// Returns a page of terminal tasks, newest creation first, together with
    /// the total number of terminal tasks.
    async fn history(&self, limit: usize, offset: usize) -> TaskRepositoryResult<(Vec<Task>, u64)>;

    /// Aggregates counts and mean duration over every stored task.
    async fn stats(&self) -> TaskRepositoryResult<TaskStats>;

    /// Deletes every terminal task and returns how many were removed.
    async fn delete_terminal(&self) -> TaskRepositoryResult<u64>;
}

/// Errors returned by task repository implementations.
#[derive(Debug, Clone, Error)]
pub enum TaskRepositoryError {
    /// A task with the same identifier already exists.
    #[error("duplicate task identifier: {0}")]
    DuplicateTask(TaskId),

    /// The task was not found.
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// The stored version differs from the writer's copy.
    #[error("task {task_id} was modified concurrently (expected version {expected})")]
    VersionConflict {
        /// Task being written.
        task_id: TaskId,
        /// Version the writer read.
        expected: u64,
    },

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl TaskRepositoryError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
