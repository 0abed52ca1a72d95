//! Diesel row models for task persistence.

use super::schema::tasks;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Double, Nullable};

/// Query, insert, and update row for task records.
#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = tasks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(treat_none_as_null = true)]
pub struct TaskRow {
    /// Task identifier.
    pub id: uuid::Uuid,
    /// Source reference.
    pub source_reference: String,
    /// Destination reference.
    pub target_reference: String,
    /// Destination host.
    pub target_host: String,
    /// Destination username.
    pub target_username: String,
    /// Stored configuration identifier.
    pub config_id: Option<uuid::Uuid>,
    /// Lifecycle status.
    pub status: String,
    /// Progress percentage.
    pub progress: i16,
    /// Step ordinal.
    pub current_step: i16,
    /// Step message.
    pub step_message: String,
    /// Failure message.
    pub error_message: Option<String>,
    /// Duration in whole seconds.
    pub duration_secs: i64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Start timestamp.
    pub started_at: Option<DateTime<Utc>>,
    /// Terminal transition timestamp.
    pub completed_at: Option<DateTime<Utc>>,
    /// Optimistic concurrency version.
    pub version: i64,
}

/// Aggregate row returned by the statistics query.
#[derive(Debug, Clone, QueryableByName)]
pub struct TaskStatsRow {
    /// Every task.
    #[diesel(sql_type = BigInt)]
    pub total: i64,
    /// Running tasks.
    #[diesel(sql_type = BigInt)]
    pub running: i64,
    /// Pending tasks.
    #[diesel(sql_type = BigInt)]
    pub queued: i64,
    /// Completed tasks.
    #[diesel(sql_type = BigInt)]
    pub succeeded: i64,
    /// Failed tasks.
    #[diesel(sql_type = BigInt)]
    pub failed: i64,
    /// Cancelled tasks.
    #[diesel(sql_type = BigInt)]
    pub cancelled: i64,
    /// Mean duration over completed and failed tasks with positive duration.
    #[diesel(sql_type = Nullable<Double>)]
    pub avg_duration: Option<f64>,
}
