//! Error types for task domain transitions and parsing.

use super::{TaskId, TaskStatus};
use thiserror::Error;

/// Errors returned by task state transitions.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskDomainError {
    /// The requested transition is not permitted from the current status.
    #[error("task {task_id} cannot move from {from} to {to}")]
    InvalidTransition {
        /// Task being transitioned.
        task_id: TaskId,
        /// Current status.
        from: TaskStatus,
        /// Requested status.
        to: TaskStatus,
    },

    /// A progress report arrived while the task was not running.
    #[error("task {task_id} is {status}, progress can only change while running")]
    NotRunning {
        /// Task being updated.
        task_id: TaskId,
        /// Current status.
        status: TaskStatus,
    },
}

/// Error returned while parsing task statuses from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown task status: {0}")]
pub struct ParseTaskStatusError(pub String);
