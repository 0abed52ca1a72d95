//! Background execution of one transfer task.

use std::time::Duration;

use mockable::Clock;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::lifecycle::{CANCELLED_MESSAGE, SHUTDOWN_MESSAGE, Shared};
use crate::registry::{
    ports::{PasswordCipher, RegistryConfigRepository},
    services::DestinationRequest,
};
use crate::task::{
    domain::{Task, TaskDomainError, TaskId},
    ports::{TaskRepository, TaskRepositoryError},
};
use crate::transfer::{
    domain::{TransferError, TransferOutcome, TransferStep},
    ports::ImageClient,
};

/// How an execution ended, decided after the pipeline returns.
enum Verdict {
    Completed,
    Failed(String),
    ShutDown,
    /// A user cancellation; the cancel operation normally writes the final
    /// state.
    Withdrawn,
}

impl<T, R, P, I, C> Shared<T, R, P, I, C>
where
    T: TaskRepository,
    R: RegistryConfigRepository,
    P: PasswordCipher,
    I: ImageClient,
    C: Clock + Send + Sync,
{
    /// Runs the task to a terminal state unless a user cancellation claims it.
    pub(super) async fn execute(
        &self,
        task_id: TaskId,
        token: CancellationToken,
        destination: DestinationRequest,
    ) {
        let Some(mut task) = self.claim(task_id, &token).await else {
            return;
        };

        let started = Instant::now();
        let credentials = match self.resolver.resolve(&destination).await {
            Ok(credentials) => credentials,
            Err(err) => {
                let message = err.to_string();
                self.seal(&mut task, |record, clock| {
                    record.fail(message, rounded_secs(started.elapsed()), clock)
                })
                .await;
                return;
            }
        };

        let source = task.source_reference().to_owned();
        let target = task.target_reference().to_owned();
        let (steps, mut step_reports) = mpsc::unbounded_channel();
        let transfer = self
            .pipeline
            .transfer(&token, &source, &target, &credentials, &steps);
        tokio::pin!(transfer);
        let deadline = tokio::time::sleep(self.config.task_timeout);
        tokio::pin!(deadline);
        let mut timed_out = false;

        let result = loop {
            tokio::select! {
                result = &mut transfer => break result,
                Some(step) = step_reports.recv() => self.record_step(&mut task, step).await,
                () = &mut deadline, if !timed_out => {
                    timed_out = true;
                    warn!(task_id = %task_id, "transfer exceeded its time limit");
                    token.cancel();
                }
            }
        };

        let duration_secs = rounded_secs(started.elapsed());
        match self.verdict(&result, &token, timed_out) {
            Verdict::Completed => {
                self.seal(&mut task, |record, clock| record.complete(duration_secs, clock))
                    .await;
            }
            Verdict::Failed(message) => {
                self.seal(&mut task, |record, clock| {
                    record.fail(message, duration_secs, clock)
                })
                .await;
            }
            Verdict::ShutDown => {
                self.seal(&mut task, |record, clock| record.cancel(SHUTDOWN_MESSAGE, clock))
                    .await;
            }
            Verdict::Withdrawn => self.confirm_withdrawal(task_id).await,
        }
    }

    /// Seals a user-cancelled task whose record is still open.
    ///
    /// The stored record is re-read so the write carries its current
    /// version; if the cancel operation already landed this is a no-op.
    async fn confirm_withdrawal(&self, task_id: TaskId) {
        match self.repository.find_by_id(task_id).await {
            Ok(Some(mut stored)) if !stored.is_terminal() => {
                warn!(task_id = %task_id, "cancelled execution left an open record; sealing it");
                self.seal(&mut stored, |record, clock| record.cancel(CANCELLED_MESSAGE, clock))
                    .await;
            }
            Ok(_) => debug!(task_id = %task_id, "execution stopped by user cancellation"),
            Err(err) => {
                error!(task_id = %task_id, error = %err, "failed to re-read cancelled task");
            }
        }
    }

    /// Loads the task and moves it to running.
    ///
    /// Returns `None` when the task is gone, already terminal, or was
    /// cancelled before it could start.
    async fn claim(&self, task_id: TaskId, token: &CancellationToken) -> Option<Task> {
        let mut task = match self.repository.find_by_id(task_id).await {
            Ok(Some(task)) if !task.is_terminal() => task,
            Ok(_) => return None,
            Err(err) => {
                error!(task_id = %task_id, error = %err, "failed to load task for execution");
                return None;
            }
        };

        if token.is_cancelled() {
            if self.shutdown.is_cancelled() {
                self.seal(&mut task, |record, clock| record.cancel(SHUTDOWN_MESSAGE, clock))
                    .await;
            }
            return None;
        }

        if let Err(err) = task.start(&*self.clock) {
            warn!(task_id = %task_id, error = %err, "task cannot start");
            return None;
        }
        match self.repository.update(&mut task).await {
            Ok(()) => {
                info!(task_id = %task_id, "transfer task started");
                Some(task)
            }
            Err(err) => {
                log_write_failure(task_id, &err);
                None
            }
        }
    }

    /// Persists intermediate progress; the completion step is left to `seal`.
    async fn record_step(&self, task: &mut Task, step: TransferStep) {
        let before = task.progress();
        if step == TransferStep::Complete
            || task.advance(step).is_err()
            || task.progress() == before
        {
            return;
        }
        match self.repository.update(task).await {
            Ok(()) => debug!(task_id = %task.id(), ?step, progress = task.progress(), "step recorded"),
            Err(err) => log_write_failure(task.id(), &err),
        }
    }

    fn verdict(
        &self,
        result: &Result<TransferOutcome, TransferError>,
        token: &CancellationToken,
        timed_out: bool,
    ) -> Verdict {
        match result {
            Ok(_) => Verdict::Completed,
            Err(_) if timed_out => Verdict::Failed(format!(
                "transfer timed out after {} seconds",
                self.config.task_timeout.as_secs()
            )),
            Err(_) if self.shutdown.is_cancelled() => Verdict::ShutDown,
            Err(_) if token.is_cancelled() => Verdict::Withdrawn,
            Err(err) => Verdict::Failed(err.to_string()),
        }
    }

    /// Applies a terminal transition and writes it with a compare-and-swap.
    ///
    /// A version conflict means another writer got there first; the task is
    /// left as that writer recorded it.
    async fn seal<F>(&self, task: &mut Task, transition: F)
    where
        F: FnOnce(&mut Task, &C) -> Result<(), TaskDomainError>,
    {
        if let Err(err) = transition(task, &*self.clock) {
            warn!(task_id = %task.id(), error = %err, "terminal transition rejected");
            return;
        }
        match self.repository.update(task).await {
            Ok(()) => info!(
                task_id = %task.id(),
                status = task.status().as_str(),
                duration_secs = task.duration_secs(),
                "transfer task finished"
            ),
            Err(err) => log_write_failure(task.id(), &err),
        }
    }
}

fn log_write_failure(task_id: TaskId, err: &TaskRepositoryError) {
    if matches!(err, TaskRepositoryError::VersionConflict { .. }) {
        warn!(task_id = %task_id, "task changed concurrently; write skipped");
    } else {
        error!(task_id = %task_id, error = %err, "failed to persist task state");
    }
}

const fn rounded_secs(elapsed: Duration) -> u64 {
    elapsed.saturating_add(Duration::from_millis(500)).as_secs()
}
