//! Read-side projections: single-task view, dashboard listing, statistics,
//! and history pages.

use super::{Task, TaskStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A task together with its estimated remaining time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskView {
    /// The stored task.
    pub task: Task,
    /// Linear estimate of seconds left; present only while running with
    /// positive progress and a positive estimate.
    pub estimated_remaining_secs: Option<u64>,
}

impl TaskView {
    /// Builds a view, extrapolating remaining time as of `now`.
    ///
    /// `remaining = elapsed * 100 / progress - elapsed`.
    #[must_use]
    pub fn at(task: Task, now: DateTime<Utc>) -> Self {
        let estimated_remaining_secs = estimate_remaining(&task, now);
        Self {
            task,
            estimated_remaining_secs,
        }
    }
}

fn estimate_remaining(task: &Task, now: DateTime<Utc>) -> Option<u64> {
    if task.status() != TaskStatus::Running || task.progress() == 0 {
        return None;
    }
    let started = task.started_at()?;
    let elapsed = u64::try_from((now - started).num_seconds()).ok()?;
    let projected_total = elapsed
        .checked_mul(100)?
        .checked_div(u64::from(task.progress()))?;
    projected_total.checked_sub(elapsed).filter(|remaining| *remaining > 0)
}

/// Dashboard snapshot of the task queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskListing {
    /// Most recently started running task.
    pub current: Option<Task>,
    /// Pending tasks, oldest first.
    pub queue: Vec<Task>,
    /// Most recent terminal tasks, newest completion first.
    pub recent: Vec<Task>,
}

/// Aggregate counts across all stored tasks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskStats {
    /// Every stored task.
    pub total: u64,
    /// Running tasks.
    pub running: u64,
    /// Pending tasks.
    pub queued: u64,
    /// Completed tasks.
    pub succeeded: u64,
    /// Failed tasks.
    pub failed: u64,
    /// Cancelled tasks.
    pub cancelled: u64,
    /// Mean duration over completed and failed tasks with a positive
    /// duration; absent when there are none.
    pub avg_duration_secs: Option<f64>,
}

impl TaskStats {
    /// Aggregates statistics over an in-memory task set.
    #[must_use]
    pub fn from_tasks<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Self {
        let mut stats = Self::default();
        let mut duration_sum: u64 = 0;
        let mut duration_count: u64 = 0;
        for task in tasks {
            stats.total += 1;
            match task.status() {
                TaskStatus::Pending => stats.queued += 1,
                TaskStatus::Running => stats.running += 1,
                TaskStatus::Completed => stats.succeeded += 1,
                TaskStatus::Failed => stats.failed += 1,
                TaskStatus::Cancelled => stats.cancelled += 1,
            }
            if matches!(task.status(), TaskStatus::Completed | TaskStatus::Failed)
                && task.duration_secs() > 0
            {
                duration_sum = duration_sum.saturating_add(task.duration_secs());
                duration_count += 1;
            }
        }
        stats.avg_duration_secs = mean(duration_sum, duration_count);
        stats
    }
}

#[expect(
    clippy::cast_precision_loss,
    clippy::float_arithmetic,
    reason = "mean of whole-second durations is reported as a float"
)]
fn mean(sum: u64, count: u64) -> Option<f64> {
    (count > 0).then(|| sum as f64 / count as f64)
}

/// One page of terminal tasks, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskHistoryPage {
    /// Tasks on this page.
    pub tasks: Vec<Task>,
    /// Terminal tasks across all pages.
    pub total: u64,
    /// Page size applied.
    pub limit: usize,
    /// Number of tasks skipped.
    pub offset: usize,
}
