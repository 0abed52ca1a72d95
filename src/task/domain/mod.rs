//! Domain model for image transfer tasks.

mod error;
mod ids;
mod listing;
mod task;

pub use error::{ParseTaskStatusError, TaskDomainError};
pub use ids::TaskId;
pub use listing::{TaskHistoryPage, TaskListing, TaskStats, TaskView};
pub use task::{NewTask, PersistedTaskData, Task, TaskStatus};
