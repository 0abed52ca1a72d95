//! `PostgreSQL` repository implementation for transfer tasks.

use super::{
    models::{TaskRow, TaskStatsRow},
    schema::tasks,
};
use crate::registry::domain::RegistryConfigId;
use crate::task::{
    domain::{PersistedTaskData, Task, TaskId, TaskStats, TaskStatus},
    ports::{TaskRepository, TaskRepositoryError, TaskRepositoryResult},
};
use crate::transfer::domain::TransferStep;
use async_trait::async_trait;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::{DatabaseErrorKind, Error as DieselError};

/// `PostgreSQL` connection pool type used by task adapters.
pub type TaskPgPool = Pool<ConnectionManager<PgConnection>>;

const TERMINAL_STATUSES: [&str; 3] = [
    TaskStatus::Completed.as_str(),
    TaskStatus::Failed.as_str(),
    TaskStatus::Cancelled.as_str(),
];

const STATS_QUERY: &str = concat!(
    "SELECT COUNT(*) AS total, ",
    "COUNT(*) FILTER (WHERE status = 'running') AS running, ",
    "COUNT(*) FILTER (WHERE status = 'pending') AS queued, ",
    "COUNT(*) FILTER (WHERE status = 'completed') AS succeeded, ",
    "COUNT(*) FILTER (WHERE status = 'failed') AS failed, ",
    "COUNT(*) FILTER (WHERE status = 'cancelled') AS cancelled, ",
    "(AVG(duration_secs) FILTER (WHERE status IN ('completed', 'failed') ",
    "AND duration_secs > 0))::float8 AS avg_duration ",
    "FROM tasks",
);

/// `PostgreSQL`-backed task repository.
#[derive(Debug, Clone)]
pub struct PostgresTaskRepository {
    pool: TaskPgPool,
}

impl PostgresTaskRepository {
    /// Creates a new repository from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: TaskPgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T>(&self, f: F) -> TaskRepositoryResult<T>
    where
        F: FnOnce(&mut PgConnection) -> TaskRepositoryResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(TaskRepositoryError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(TaskRepositoryError::persistence)?
    }
}

#[async_trait]
impl TaskRepository for PostgresTaskRepository {
    async fn store(&self, task: &Task) -> TaskRepositoryResult<()> {
        let task_id = task.id();
        let row = to_row(task)?;

        self.run_blocking(move |connection| {
            diesel::insert_into(tasks::table)
                .values(&row)
                .execute(connection)
                .map_err(|err| match err {
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                        TaskRepositoryError::DuplicateTask(task_id)
                    }
                    _ => TaskRepositoryError::persistence(err),
                })?;
            Ok(())
        })
        .await
    }

    async fn update(&self, task: &mut Task) -> TaskRepositoryResult<()> {
        let task_id = task.id();
        let expected = task.version();
        let mut next = task.clone();
        next.bump_version();
        let row = to_row(&next)?;
        let expected_column = to_i64(expected)?;

        self.run_blocking(move |connection| {
            let updated = diesel::update(
                tasks::table
                    .filter(tasks::id.eq(task_id.into_inner()))
                    .filter(tasks::version.eq(expected_column)),
            )
            .set(&row)
            .execute(connection)
            .map_err(TaskRepositoryError::persistence)?;
            if updated == 1 {
                return Ok(());
            }

            let exists = diesel::select(diesel::dsl::exists(
                tasks::table.filter(tasks::id.eq(task_id.into_inner())),
            ))
            .get_result::<bool>(connection)
            .map_err(TaskRepositoryError::persistence)?;
            if exists {
                Err(TaskRepositoryError::VersionConflict { task_id, expected })
            } else {
                Err(TaskRepositoryError::NotFound(task_id))
            }
        })
        .await?;

        *task = next;
        Ok(())
    }

    async fn find_by_id(&self, id: TaskId) -> TaskRepositoryResult<Option<Task>> {
        self.run_blocking(move |connection| {
            let row = tasks::table
                .find(id.into_inner())
                .select(TaskRow::as_select())
                .first::<TaskRow>(connection)
                .optional()
                .map_err(TaskRepositoryError::persistence)?;
            row.map(row_to_task).transpose()
        })
        .await
    }

    async fn find_latest_running(&self) -> TaskRepositoryResult<Option<Task>> {
        self.run_blocking(|connection| {
            let row = tasks::table
                .filter(tasks::status.eq(TaskStatus::Running.as_str()))
                .order(tasks::started_at.desc())
                .select(TaskRow::as_select())
                .first::<TaskRow>(connection)
                .optional()
                .map_err(TaskRepositoryError::persistence)?;
            row.map(row_to_task).transpose()
        })
        .await
    }

    async fn list_pending(&self) -> TaskRepositoryResult<Vec<Task>> {
        self.run_blocking(|connection| {
            let rows = tasks::table
                .filter(tasks::status.eq(TaskStatus::Pending.as_str()))
                .order(tasks::created_at.asc())
                .select(TaskRow::as_select())
                .load::<TaskRow>(connection)
                .map_err(TaskRepositoryError::persistence)?;
            rows.into_iter().map(row_to_task).collect()
        })
        .await
    }

    async fn list_recent_terminal(&self, limit: usize) -> TaskRepositoryResult<Vec<Task>> {
        let row_limit = to_i64(limit)?;
        self.run_blocking(move |connection| {
            let rows = tasks::table
                .filter(tasks::status.eq_any(TERMINAL_STATUSES))
                .order(tasks::completed_at.desc())
                .limit(row_limit)
                .select(TaskRow::as_select())
                .load::<TaskRow>(connection)
                .map_err(TaskRepositoryError::persistence)?;
            rows.into_iter().map(row_to_task).collect()
        })
        .await
    }

    async fn history(&self, limit: usize, offset: usize) -> TaskRepositoryResult<(Vec<Task>, u64)> {
        let page_limit = to_i64(limit)?;
        let page_offset = to_i64(offset)?;
        self.run_blocking(move |connection| {
            let total = tasks::table
                .filter(tasks::status.eq_any(TERMINAL_STATUSES))
                .count()
                .get_result::<i64>(connection)
                .map_err(TaskRepositoryError::persistence)?;
            let rows = tasks::table
                .filter(tasks::status.eq_any(TERMINAL_STATUSES))
                .order(tasks::created_at.desc())
                .limit(page_limit)
                .offset(page_offset)
                .select(TaskRow::as_select())
                .load::<TaskRow>(connection)
                .map_err(TaskRepositoryError::persistence)?;
            let tasks = rows
                .into_iter()
                .map(row_to_task)
                .collect::<TaskRepositoryResult<Vec<_>>>()?;
            Ok((tasks, to_u64(total)?))
        })
        .await
    }

    async fn stats(&self) -> TaskRepositoryResult<TaskStats> {
        self.run_blocking(|connection| {
            let row = diesel::sql_query(STATS_QUERY)
                .get_result::<TaskStatsRow>(connection)
                .map_err(TaskRepositoryError::persistence)?;
            Ok(TaskStats {
                total: to_u64(row.total)?,
                running: to_u64(row.running)?,
                queued: to_u64(row.queued)?,
                succeeded: to_u64(row.succeeded)?,
                failed: to_u64(row.failed)?,
                cancelled: to_u64(row.cancelled)?,
                avg_duration_secs: row.avg_duration,
            })
        })
        .await
    }

    async fn delete_terminal(&self) -> TaskRepositoryResult<u64> {
        self.run_blocking(|connection| {
            let deleted = diesel::delete(tasks::table.filter(tasks::status.eq_any(TERMINAL_STATUSES)))
                .execute(connection)
                .map_err(TaskRepositoryError::persistence)?;
            u64::try_from(deleted).map_err(TaskRepositoryError::persistence)
        })
        .await
    }
}

fn to_i64<T>(value: T) -> TaskRepositoryResult<i64>
where
    i64: TryFrom<T, Error = std::num::TryFromIntError>,
{
    i64::try_from(value).map_err(TaskRepositoryError::persistence)
}

fn to_u64(value: i64) -> TaskRepositoryResult<u64> {
    u64::try_from(value).map_err(TaskRepositoryError::persistence)
}

fn to_row(task: &Task) -> TaskRepositoryResult<TaskRow> {
    Ok(TaskRow {
        id: task.id().into_inner(),
        source_reference: task.source_reference().to_owned(),
        target_reference: task.target_reference().to_owned(),
        target_host: task.target_host().to_owned(),
        target_username: task.target_username().to_owned(),
        config_id: task.config_id().map(RegistryConfigId::into_inner),
        status: task.status().as_str().to_owned(),
        progress: i16::from(task.progress()),
        current_step: i16::from(task.step().ordinal()),
        step_message: task.step_message().to_owned(),
        error_message: task.error_message().map(str::to_owned),
        duration_secs: to_i64(task.duration_secs())?,
        created_at: task.created_at(),
        started_at: task.started_at(),
        completed_at: task.completed_at(),
        version: to_i64(task.version())?,
    })
}

fn row_to_task(row: TaskRow) -> TaskRepositoryResult<Task> {
    let status = TaskStatus::try_from(row.status.as_str()).map_err(TaskRepositoryError::persistence)?;
    let progress = u8::try_from(row.progress).map_err(TaskRepositoryError::persistence)?;
    let step = u8::try_from(row.current_step)
        .ok()
        .and_then(TransferStep::from_ordinal)
        .ok_or_else(|| {
            TaskRepositoryError::persistence(std::io::Error::other(format!(
                "unknown step ordinal {}",
                row.current_step
            )))
        })?;

    Ok(Task::from_persisted(PersistedTaskData {
        id: TaskId::from_uuid(row.id),
        source_reference: row.source_reference,
        target_reference: row.target_reference,
        target_host: row.target_host,
        target_username: row.target_username,
        config_id: row.config_id.map(RegistryConfigId::from_uuid),
        status,
        progress,
        step,
        step_message: row.step_message,
        error_message: row.error_message,
        duration_secs: to_u64(row.duration_secs)?,
        created_at: row.created_at,
        started_at: row.started_at,
        completed_at: row.completed_at,
        version: to_u64(row.version)?,
    }))
}
