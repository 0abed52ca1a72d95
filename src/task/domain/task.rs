//! Task aggregate root and its status state machine.

use super::{ParseTaskStatusError, TaskDomainError, TaskId};
use crate::registry::domain::RegistryConfigId;
use crate::transfer::domain::TransferStep;
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a transfer task.
///
/// Transitions run `pending → running → {completed, failed}` and
/// `{pending, running} → cancelled`; terminal statuses never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Accepted, execution not yet started.
    Pending,
    /// Execution in progress.
    Running,
    /// Transfer succeeded.
    Completed,
    /// Transfer failed; the error message is recorded.
    Failed,
    /// Cancelled by request or shutdown.
    Cancelled,
}

impl TaskStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Returns `true` for completed, failed, and cancelled.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Returns `true` when the state machine permits `self → next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running | Self::Cancelled)
                | (Self::Running, Self::Completed | Self::Failed | Self::Cancelled)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for TaskStatus {
    type Error = ParseTaskStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(ParseTaskStatusError(value.to_owned())),
        }
    }
}

/// Parameter object describing a newly accepted transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    /// Source reference as submitted.
    pub source_reference: String,
    /// Destination reference, supplied or computed.
    pub target_reference: String,
    /// Destination registry host.
    pub target_host: String,
    /// Username presented to the destination.
    pub target_username: String,
    /// Stored configuration the destination came from.
    pub config_id: Option<RegistryConfigId>,
}

/// Transfer task aggregate root.
///
/// `version` increases on every persisted write; repositories use it for
/// compare-and-swap updates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    source_reference: String,
    target_reference: String,
    target_host: String,
    target_username: String,
    config_id: Option<RegistryConfigId>,
    status: TaskStatus,
    progress: u8,
    step: TransferStep,
    step_message: String,
    error_message: Option<String>,
    duration_secs: u64,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    version: u64,
}

/// Parameter object for reconstructing a persisted task aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedTaskData {
    /// Persisted task identifier.
    pub id: TaskId,
    /// Source reference.
    pub source_reference: String,
    /// Destination reference.
    pub target_reference: String,
    /// Destination host.
    pub target_host: String,
    /// Destination username.
    pub target_username: String,
    /// Stored configuration, if any.
    pub config_id: Option<RegistryConfigId>,
    /// Lifecycle status.
    pub status: TaskStatus,
    /// Progress percentage.
    pub progress: u8,
    /// Current step.
    pub step: TransferStep,
    /// Human-readable step message.
    pub step_message: String,
    /// Failure message.
    pub error_message: Option<String>,
    /// Duration in whole seconds.
    pub duration_secs: u64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Start timestamp.
    pub started_at: Option<DateTime<Utc>>,
    /// Terminal transition timestamp.
    pub completed_at: Option<DateTime<Utc>>,
    /// Optimistic concurrency version.
    pub version: u64,
}

impl Task {
    /// Creates a pending task at progress 0.
    #[must_use]
    pub fn new(new_task: NewTask, clock: &impl Clock) -> Self {
        Self {
            id: TaskId::new(),
            source_reference: new_task.source_reference,
            target_reference: new_task.target_reference,
            target_host: new_task.target_host,
            target_username: new_task.target_username,
            config_id: new_task.config_id,
            status: TaskStatus::Pending,
            progress: 0,
            step: TransferStep::Init,
            step_message: TransferStep::Init.message().to_owned(),
            error_message: None,
            duration_secs: 0,
            created_at: clock.utc(),
            started_at: None,
            completed_at: None,
            version: 0,
        }
    }

    /// Reconstructs a task from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedTaskData) -> Self {
        Self {
            id: data.id,
            source_reference: data.source_reference,
            target_reference: data.target_reference,
            target_host: data.target_host,
            target_username: data.target_username,
            config_id: data.config_id,
            status: data.status,
            progress: data.progress,
            step: data.step,
            step_message: data.step_message,
            error_message: data.error_message,
            duration_secs: data.duration_secs,
            created_at: data.created_at,
            started_at: data.started_at,
            completed_at: data.completed_at,
            version: data.version,
        }
    }

    /// Returns the task identifier.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Returns the source reference as submitted.
    #[must_use]
    pub fn source_reference(&self) -> &str {
        &self.source_reference
    }

    /// Returns the destination reference.
    #[must_use]
    pub fn target_reference(&self) -> &str {
        &self.target_reference
    }

    /// Returns the destination host.
    #[must_use]
    pub fn target_host(&self) -> &str {
        &self.target_host
    }

    /// Returns the destination username.
    #[must_use]
    pub fn target_username(&self) -> &str {
        &self.target_username
    }

    /// Returns the stored configuration the destination came from.
    #[must_use]
    pub const fn config_id(&self) -> Option<RegistryConfigId> {
        self.config_id
    }

    /// Returns the lifecycle status.
    #[must_use]
    pub const fn status(&self) -> TaskStatus {
        self.status
    }

    /// Returns the progress percentage.
    #[must_use]
    pub const fn progress(&self) -> u8 {
        self.progress
    }

    /// Returns the current step.
    #[must_use]
    pub const fn step(&self) -> TransferStep {
        self.step
    }

    /// Returns the human-readable step message.
    #[must_use]
    pub fn step_message(&self) -> &str {
        &self.step_message
    }

    /// Returns the failure message; set only while failed.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Returns the duration in whole seconds; zero until terminal.
    #[must_use]
    pub const fn duration_secs(&self) -> u64 {
        self.duration_secs
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the start timestamp.
    #[must_use]
    pub const fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Returns the terminal transition timestamp.
    #[must_use]
    pub const fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Returns the optimistic concurrency version.
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    /// Returns `true` once the task has reached a terminal status.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Moves a pending task to running at the pull step.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidTransition`] unless pending.
    pub fn start(&mut self, clock: &impl Clock) -> Result<(), TaskDomainError> {
        self.transition(TaskStatus::Running)?;
        self.set_step(TransferStep::Pull);
        self.started_at = Some(clock.utc());
        Ok(())
    }

    /// Records that `step` has begun.
    ///
    /// Progress never decreases: a report for an earlier step than the
    /// current one is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::NotRunning`] unless running.
    pub fn advance(&mut self, step: TransferStep) -> Result<(), TaskDomainError> {
        if self.status != TaskStatus::Running {
            return Err(TaskDomainError::NotRunning {
                task_id: self.id,
                status: self.status,
            });
        }
        if step > self.step {
            self.set_step(step);
        }
        Ok(())
    }

    /// Marks a running task completed at 100%.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidTransition`] unless running.
    pub fn complete(&mut self, duration_secs: u64, clock: &impl Clock) -> Result<(), TaskDomainError> {
        self.transition(TaskStatus::Completed)?;
        self.set_step(TransferStep::Complete);
        self.finish(duration_secs, clock);
        Ok(())
    }

    /// Marks a running task failed, resetting progress to the init step.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidTransition`] unless running.
    pub fn fail(
        &mut self,
        error_message: impl Into<String>,
        duration_secs: u64,
        clock: &impl Clock,
    ) -> Result<(), TaskDomainError> {
        self.transition(TaskStatus::Failed)?;
        self.progress = 0;
        self.step = TransferStep::Init;
        self.step_message = "Transfer failed".to_owned();
        self.error_message = Some(error_message.into());
        self.finish(duration_secs, clock);
        Ok(())
    }

    /// Cancels a pending or running task.
    ///
    /// The duration is the wall-clock time since the task started, or zero
    /// if it never did.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidTransition`] from a terminal status.
    pub fn cancel(
        &mut self,
        message: impl Into<String>,
        clock: &impl Clock,
    ) -> Result<(), TaskDomainError> {
        self.transition(TaskStatus::Cancelled)?;
        let now = clock.utc();
        let duration_secs = self
            .started_at
            .map_or(0, |started| whole_seconds_between(started, now));
        self.step_message = message.into();
        self.duration_secs = duration_secs;
        self.completed_at = Some(now);
        Ok(())
    }

    /// Advances the version after a successful persisted write.
    pub(crate) const fn bump_version(&mut self) {
        self.version += 1;
    }

    fn transition(&mut self, next: TaskStatus) -> Result<(), TaskDomainError> {
        if !self.status.can_transition_to(next) {
            return Err(TaskDomainError::InvalidTransition {
                task_id: self.id,
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    fn set_step(&mut self, step: TransferStep) {
        self.step = step;
        self.progress = self.progress.max(step.progress());
        step.message().clone_into(&mut self.step_message);
    }

    fn finish(&mut self, duration_secs: u64, clock: &impl Clock) {
        self.duration_secs = duration_secs;
        self.completed_at = Some(clock.utc());
    }
}

/// Whole seconds from `start` to `end`, rounded to nearest and floored at 0.
pub(crate) fn whole_seconds_between(start: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
    let millis = (end - start).num_milliseconds().saturating_add(500);
    u64::try_from(millis).map_or(0, |positive| positive / 1000)
}
