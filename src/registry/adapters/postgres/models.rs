//! Diesel row model for registry configurations.

use super::schema::registry_configs;
use chrono::{DateTime, Utc};
use diesel::prelude::*;

/// Query, insert, and update row for registry configurations.
#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = registry_configs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(treat_none_as_null = true)]
pub struct RegistryConfigRow {
    /// Configuration identifier.
    pub id: uuid::Uuid,
    /// Display name.
    pub name: String,
    /// Registry URL as entered.
    pub registry_url: String,
    /// Registry username.
    pub username: String,
    /// Encrypted password blob.
    pub password_encrypted: String,
    /// Verification status.
    pub status: String,
    /// Time of the last connectivity test.
    pub last_tested_at: Option<DateTime<Utc>>,
    /// Default flag.
    pub is_default: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}
