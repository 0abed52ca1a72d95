//! Service layer for creating, observing, and cancelling transfer tasks.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use mockable::Clock;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::info;

use super::handles::HandleRegistry;
use crate::reference::{self, ImageReference, ReferenceError};
use crate::registry::{
    ports::{PasswordCipher, RegistryConfigRepository},
    services::{CredentialError, CredentialResolver, DestinationRequest},
};
use crate::task::{
    domain::{
        NewTask, Task, TaskDomainError, TaskHistoryPage, TaskId, TaskListing, TaskStats,
        TaskStatus, TaskView,
    },
    ports::{TaskRepository, TaskRepositoryError},
};
use crate::transfer::{ports::ImageClient, services::TransferPipeline};

/// Status message written when a user cancels a task.
pub const CANCELLED_MESSAGE: &str = "Task cancelled";

/// Status message written when shutdown interrupts an execution.
pub const SHUTDOWN_MESSAGE: &str = "Cancelled during shutdown";

/// Page size used when a history request gives none or zero.
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// Largest history page served.
pub const MAX_HISTORY_LIMIT: usize = 100;

/// Tunables for [`TaskLifecycleService`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleConfig {
    /// Ceiling on one execution, after which the task is failed.
    pub task_timeout: Duration,
    /// Number of terminal tasks shown in [`TaskListing::recent`].
    pub recent_limit: usize,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            task_timeout: Duration::from_secs(600),
            recent_limit: 5,
        }
    }
}

/// Request payload for a new transfer task.
#[derive(Debug, Clone)]
pub struct CreateTaskRequest {
    source_reference: String,
    target_reference: Option<String>,
    destination: DestinationRequest,
}

impl CreateTaskRequest {
    /// Creates a request that transfers `source_reference` to `destination`.
    #[must_use]
    pub fn new(source_reference: impl Into<String>, destination: DestinationRequest) -> Self {
        Self {
            source_reference: source_reference.into(),
            target_reference: None,
            destination,
        }
    }

    /// Sets an explicit target reference instead of the computed one.
    #[must_use]
    pub fn with_target(mut self, target_reference: impl Into<String>) -> Self {
        self.target_reference = Some(target_reference.into());
        self
    }
}

/// Acknowledgement returned by [`TaskLifecycleService::create_task`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedTask {
    /// Identifier of the new task.
    pub task_id: TaskId,
    /// Status at creation; always pending.
    pub status: TaskStatus,
    /// Human-readable acknowledgement.
    pub message: String,
}

/// Service-level errors for task lifecycle operations.
#[derive(Debug, Error)]
pub enum TaskLifecycleError {
    /// The source or explicit target reference is malformed.
    #[error(transparent)]
    InvalidReference(#[from] ReferenceError),
    /// Destination credentials are incomplete or unresolvable.
    #[error(transparent)]
    Credentials(#[from] CredentialError),
    /// No task has the given identifier.
    #[error("task {0} not found")]
    NotFound(TaskId),
    /// The task is absent or already terminal, so it cannot be cancelled.
    #[error("task {0} not found or already finished")]
    NotFoundOrTerminal(TaskId),
    /// The service is shutting down and accepts no new tasks.
    #[error("task service is shutting down")]
    ShuttingDown,
    /// A state transition was rejected.
    #[error(transparent)]
    Domain(#[from] TaskDomainError),
    /// Repository operation failed.
    #[error(transparent)]
    Repository(#[from] TaskRepositoryError),
}

/// Result type for task lifecycle service operations.
pub type TaskLifecycleResult<T> = Result<T, TaskLifecycleError>;

/// Collaborators shared between the service and its background executions.
pub(super) struct Shared<T, R, P, I, C>
where
    T: TaskRepository,
    R: RegistryConfigRepository,
    P: PasswordCipher,
    I: ImageClient,
    C: Clock + Send + Sync,
{
    pub(super) repository: Arc<T>,
    pub(super) resolver: CredentialResolver<R, P>,
    pub(super) pipeline: TransferPipeline<I>,
    pub(super) clock: Arc<C>,
    pub(super) config: LifecycleConfig,
    pub(super) handles: Arc<HandleRegistry>,
    pub(super) tracker: TaskTracker,
    pub(super) shutdown: CancellationToken,
    /// Held shared while an execution is spawned and exclusively while
    /// shutdown closes the tracker.
    pub(super) admission: RwLock<()>,
}

/// Task lifecycle orchestration service.
///
/// Each created task runs in its own background execution owned by a
/// [`TaskTracker`], so [`TaskLifecycleService::shutdown`] can cancel and
/// await every execution still in flight.
pub struct TaskLifecycleService<T, R, P, I, C>
where
    T: TaskRepository,
    R: RegistryConfigRepository,
    P: PasswordCipher,
    I: ImageClient,
    C: Clock + Send + Sync,
{
    shared: Arc<Shared<T, R, P, I, C>>,
}

impl<T, R, P, I, C> Clone for TaskLifecycleService<T, R, P, I, C>
where
    T: TaskRepository,
    R: RegistryConfigRepository,
    P: PasswordCipher,
    I: ImageClient,
    C: Clock + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T, R, P, I, C> TaskLifecycleService<T, R, P, I, C>
where
    T: TaskRepository + 'static,
    R: RegistryConfigRepository + 'static,
    P: PasswordCipher + 'static,
    I: ImageClient + 'static,
    C: Clock + Send + Sync + 'static,
{
    /// Creates a new task lifecycle service.
    #[must_use]
    pub fn new(
        repository: Arc<T>,
        resolver: CredentialResolver<R, P>,
        pipeline: TransferPipeline<I>,
        clock: Arc<C>,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                repository,
                resolver,
                pipeline,
                clock,
                config,
                handles: Arc::new(HandleRegistry::default()),
                tracker: TaskTracker::new(),
                shutdown: CancellationToken::new(),
                admission: RwLock::new(()),
            }),
        }
    }

    /// Validates `request`, stores a pending task, and starts its transfer
    /// in the background.
    ///
    /// Returns as soon as the pending record is stored.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::ShuttingDown`] after shutdown began,
    /// [`TaskLifecycleError::InvalidReference`] for a malformed source or
    /// target, [`TaskLifecycleError::Credentials`] when the destination is
    /// incomplete or names an unknown configuration, or the repository
    /// failure.
    pub async fn create_task(&self, request: CreateTaskRequest) -> TaskLifecycleResult<CreatedTask> {
        let shared = &self.shared;
        if shared.shutdown.is_cancelled() {
            return Err(TaskLifecycleError::ShuttingDown);
        }

        let CreateTaskRequest {
            source_reference,
            target_reference,
            destination,
        } = request;
        let source = source_reference.trim().to_owned();
        ImageReference::parse(&source)?;
        let resolved = shared.resolver.describe(&destination).await?;
        let (target, target_host) = match target_reference.as_deref().map(str::trim) {
            Some(explicit) if !explicit.is_empty() => {
                ImageReference::parse(explicit)?;
                (explicit.to_owned(), reference::extract_host(explicit).to_owned())
            }
            _ => (
                reference::build_target_reference(&source, &resolved.host)?,
                resolved.host,
            ),
        };

        let mut task = Task::new(
            NewTask {
                source_reference: source,
                target_reference: target,
                target_host,
                target_username: resolved.username,
                config_id: resolved.config_id,
            },
            &*shared.clock,
        );
        shared.repository.store(&task).await?;

        let task_id = task.id();
        if !self.spawn_execution(task_id, destination) {
            task.cancel(SHUTDOWN_MESSAGE, &*shared.clock)?;
            shared.repository.update(&mut task).await?;
            info!(task_id = %task_id, "task stored after shutdown began; cancelled");
            return Err(TaskLifecycleError::ShuttingDown);
        }

        info!(
            task_id = %task_id,
            source = task.source_reference(),
            target = task.target_reference(),
            "transfer task created"
        );
        Ok(CreatedTask {
            task_id,
            status: task.status(),
            message: "Transfer task created and running in the background".to_owned(),
        })
    }

    /// Starts the background execution unless shutdown has begun.
    ///
    /// Returns `false` when the tracker no longer admits executions.
    fn spawn_execution(&self, task_id: TaskId, destination: DestinationRequest) -> bool {
        let shared = &self.shared;
        let _admitted = shared
            .admission
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        if shared.shutdown.is_cancelled() {
            return false;
        }
        let token = shared.shutdown.child_token();
        let guard = shared.handles.register(task_id, token.clone());
        let execution = Arc::clone(shared);
        shared.tracker.spawn(async move {
            execution.execute(task_id, token, destination).await;
            drop(guard);
        });
        true
    }

    /// Retrieves a task with its estimated remaining time.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::NotFound`] for an unknown identifier, or
    /// the repository failure.
    pub async fn get_task(&self, task_id: TaskId) -> TaskLifecycleResult<TaskView> {
        let task = self
            .shared
            .repository
            .find_by_id(task_id)
            .await?
            .ok_or(TaskLifecycleError::NotFound(task_id))?;
        Ok(TaskView::at(task, self.shared.clock.utc()))
    }

    /// Returns the running task, the pending queue, and recent terminal tasks.
    ///
    /// # Errors
    ///
    /// Returns the repository failure.
    pub async fn list_tasks(&self) -> TaskLifecycleResult<TaskListing> {
        let repository = &self.shared.repository;
        Ok(TaskListing {
            current: repository.find_latest_running().await?,
            queue: repository.list_pending().await?,
            recent: repository
                .list_recent_terminal(self.shared.config.recent_limit)
                .await?,
        })
    }

    /// Returns aggregate counts and the mean finished duration.
    ///
    /// # Errors
    ///
    /// Returns the repository failure.
    pub async fn get_stats(&self) -> TaskLifecycleResult<TaskStats> {
        Ok(self.shared.repository.stats().await?)
    }

    /// Cancels a pending or running task.
    ///
    /// The cancelled status is written with a compare-and-swap, retried until
    /// it lands or the task is found terminal. Only then is a live execution
    /// signalled, so a failed write leaves the transfer running.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::NotFoundOrTerminal`] when the task is
    /// absent or already terminal, or the repository failure.
    pub async fn cancel_task(&self, task_id: TaskId) -> TaskLifecycleResult<Task> {
        let shared = &self.shared;
        loop {
            let mut task = shared
                .repository
                .find_by_id(task_id)
                .await?
                .filter(|found| !found.is_terminal())
                .ok_or(TaskLifecycleError::NotFoundOrTerminal(task_id))?;
            task.cancel(CANCELLED_MESSAGE, &*shared.clock)?;
            match shared.repository.update(&mut task).await {
                Ok(()) => {
                    let signalled = shared.handles.cancel(task_id);
                    info!(task_id = %task_id, signalled, "transfer task cancelled");
                    return Ok(task);
                }
                Err(TaskRepositoryError::VersionConflict { .. }) => {}
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Pages through terminal tasks, newest first.
    ///
    /// A missing or zero `limit` means [`DEFAULT_HISTORY_LIMIT`]; larger
    /// values are capped at [`MAX_HISTORY_LIMIT`].
    ///
    /// # Errors
    ///
    /// Returns the repository failure.
    pub async fn history(
        &self,
        limit: Option<usize>,
        offset: usize,
    ) -> TaskLifecycleResult<TaskHistoryPage> {
        let page_size = match limit {
            None | Some(0) => DEFAULT_HISTORY_LIMIT,
            Some(requested) => requested.min(MAX_HISTORY_LIMIT),
        };
        let (tasks, total) = self.shared.repository.history(page_size, offset).await?;
        Ok(TaskHistoryPage {
            tasks,
            total,
            limit: page_size,
            offset,
        })
    }

    /// Deletes every terminal task and returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns the repository failure.
    pub async fn clear_history(&self) -> TaskLifecycleResult<u64> {
        let removed = self.shared.repository.delete_terminal().await?;
        info!(removed, "task history cleared");
        Ok(removed)
    }

    /// Rejects new tasks, cancels every in-flight execution, and waits for
    /// them to record their final state.
    pub async fn shutdown(&self) {
        let shared = &self.shared;
        info!(in_flight = shared.handles.len(), "shutting down task service");
        {
            let _closing = shared
                .admission
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            shared.shutdown.cancel();
            shared.tracker.close();
        }
        shared.tracker.wait().await;
    }

    /// Returns `true` while an execution for `task_id` is in flight.
    #[must_use]
    pub fn is_executing(&self, task_id: TaskId) -> bool {
        self.shared.handles.contains(task_id)
    }

    /// Returns the number of executions in flight.
    #[must_use]
    pub fn executing_count(&self) -> usize {
        self.shared.handles.len()
    }
}
