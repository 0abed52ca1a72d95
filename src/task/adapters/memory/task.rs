//! In-memory task repository for tests and database-less runs.

use async_trait::async_trait;
use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::task::{
    domain::{Task, TaskId, TaskStats, TaskStatus},
    ports::{TaskRepository, TaskRepositoryError, TaskRepositoryResult},
};

/// Thread-safe in-memory task repository.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTaskRepository {
    tasks: Arc<RwLock<HashMap<TaskId, Task>>>,
}

impl InMemoryTaskRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn select<F>(&self, keep: F) -> TaskRepositoryResult<Vec<Task>>
    where
        F: Fn(&Task) -> bool,
    {
        let tasks = self.tasks.read().map_err(lock_error)?;
        Ok(tasks.values().filter(|task| keep(task)).cloned().collect())
    }
}

fn lock_error(err: impl ToString) -> TaskRepositoryError {
    TaskRepositoryError::persistence(std::io::Error::other(err.to_string()))
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn store(&self, task: &Task) -> TaskRepositoryResult<()> {
        let mut tasks = self.tasks.write().map_err(lock_error)?;
        if tasks.contains_key(&task.id()) {
            return Err(TaskRepositoryError::DuplicateTask(task.id()));
        }
        tasks.insert(task.id(), task.clone());
        Ok(())
    }

    async fn update(&self, task: &mut Task) -> TaskRepositoryResult<()> {
        let mut tasks = self.tasks.write().map_err(lock_error)?;
        let stored = tasks
            .get_mut(&task.id())
            .ok_or(TaskRepositoryError::NotFound(task.id()))?;
        if stored.version() != task.version() {
            return Err(TaskRepositoryError::VersionConflict {
                task_id: task.id(),
                expected: task.version(),
            });
        }
        task.bump_version();
        *stored = task.clone();
        Ok(())
    }

    async fn find_by_id(&self, id: TaskId) -> TaskRepositoryResult<Option<Task>> {
        let tasks = self.tasks.read().map_err(lock_error)?;
        Ok(tasks.get(&id).cloned())
    }

    async fn find_latest_running(&self) -> TaskRepositoryResult<Option<Task>> {
        let running = self.select(|task| task.status() == TaskStatus::Running)?;
        Ok(running.into_iter().max_by_key(Task::started_at))
    }

    async fn list_pending(&self) -> TaskRepositoryResult<Vec<Task>> {
        let mut pending = self.select(|task| task.status() == TaskStatus::Pending)?;
        pending.sort_by_key(Task::created_at);
        Ok(pending)
    }

    async fn list_recent_terminal(&self, limit: usize) -> TaskRepositoryResult<Vec<Task>> {
        let mut terminal = self.select(Task::is_terminal)?;
        terminal.sort_by_key(|task| Reverse(task.completed_at()));
        terminal.truncate(limit);
        Ok(terminal)
    }

    async fn history(&self, limit: usize, offset: usize) -> TaskRepositoryResult<(Vec<Task>, u64)> {
        let mut terminal = self.select(Task::is_terminal)?;
        let total = u64::try_from(terminal.len()).map_err(TaskRepositoryError::persistence)?;
        terminal.sort_by_key(|task| Reverse(task.created_at()));
        let page = terminal.into_iter().skip(offset).take(limit).collect();
        Ok((page, total))
    }

    async fn stats(&self) -> TaskRepositoryResult<TaskStats> {
        let tasks = self.tasks.read().map_err(lock_error)?;
        Ok(TaskStats::from_tasks(tasks.values()))
    }

    async fn delete_terminal(&self) -> TaskRepositoryResult<u64> {
        let mut tasks = self.tasks.write().map_err(lock_error)?;
        let before = tasks.len();
        tasks.retain(|_, task| !task.is_terminal());
        u64::try_from(before - tasks.len()).map_err(TaskRepositoryError::persistence)
    }
}
