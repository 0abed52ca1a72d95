//! Application services for task lifecycle orchestration.

mod execution;
mod handles;
mod lifecycle;

pub use lifecycle::{
    CANCELLED_MESSAGE, CreateTaskRequest, CreatedTask, DEFAULT_HISTORY_LIMIT, LifecycleConfig,
    MAX_HISTORY_LIMIT, SHUTDOWN_MESSAGE, TaskLifecycleError, TaskLifecycleResult,
    TaskLifecycleService,
};
