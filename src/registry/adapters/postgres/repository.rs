//! `PostgreSQL` repository implementation for registry configurations.

use super::{models::RegistryConfigRow, schema::registry_configs};
use crate::registry::{
    domain::{PersistedRegistryConfig, RegistryConfig, RegistryConfigId, VerificationStatus},
    ports::{
        RegistryConfigRepository, RegistryConfigRepositoryError, RegistryConfigRepositoryResult,
    },
};
use async_trait::async_trait;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::{DatabaseErrorKind, Error as DieselError};

/// `PostgreSQL` connection pool type used by registry adapters.
pub type RegistryPgPool = Pool<ConnectionManager<PgConnection>>;

/// `PostgreSQL`-backed registry configuration repository.
#[derive(Debug, Clone)]
pub struct PostgresRegistryConfigRepository {
    pool: RegistryPgPool,
}

impl PostgresRegistryConfigRepository {
    /// Creates a new repository from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: RegistryPgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T>(&self, f: F) -> RegistryConfigRepositoryResult<T>
    where
        F: FnOnce(&mut PgConnection) -> RegistryConfigRepositoryResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool
                .get()
                .map_err(RegistryConfigRepositoryError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(RegistryConfigRepositoryError::persistence)?
    }
}

#[async_trait]
impl RegistryConfigRepository for PostgresRegistryConfigRepository {
    async fn store(&self, config: &RegistryConfig) -> RegistryConfigRepositoryResult<()> {
        let config_id = config.id();
        let row = to_row(config);

        self.run_blocking(move |connection| {
            connection
                .transaction::<_, DieselError, _>(|tx| {
                    if row.is_default {
                        clear_defaults_except(tx, row.id)?;
                    }
                    diesel::insert_into(registry_configs::table)
                        .values(&row)
                        .execute(tx)?;
                    Ok(())
                })
                .map_err(|err| match err {
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                        RegistryConfigRepositoryError::DuplicateConfig(config_id)
                    }
                    _ => RegistryConfigRepositoryError::persistence(err),
                })
        })
        .await
    }

    async fn update(&self, config: &RegistryConfig) -> RegistryConfigRepositoryResult<()> {
        let config_id = config.id();
        let row = to_row(config);

        self.run_blocking(move |connection| {
            let updated = connection
                .transaction::<_, DieselError, _>(|tx| {
                    if row.is_default {
                        clear_defaults_except(tx, row.id)?;
                    }
                    diesel::update(registry_configs::table.find(row.id))
                        .set(&row)
                        .execute(tx)
                })
                .map_err(RegistryConfigRepositoryError::persistence)?;
            if updated == 0 {
                return Err(RegistryConfigRepositoryError::NotFound(config_id));
            }
            Ok(())
        })
        .await
    }

    async fn delete(&self, id: RegistryConfigId) -> RegistryConfigRepositoryResult<()> {
        self.run_blocking(move |connection| {
            let deleted = diesel::delete(registry_configs::table.find(id.into_inner()))
                .execute(connection)
                .map_err(RegistryConfigRepositoryError::persistence)?;
            if deleted == 0 {
                return Err(RegistryConfigRepositoryError::NotFound(id));
            }
            Ok(())
        })
        .await
    }

    async fn find_by_id(
        &self,
        id: RegistryConfigId,
    ) -> RegistryConfigRepositoryResult<Option<RegistryConfig>> {
        self.run_blocking(move |connection| {
            let row = registry_configs::table
                .find(id.into_inner())
                .select(RegistryConfigRow::as_select())
                .first::<RegistryConfigRow>(connection)
                .optional()
                .map_err(RegistryConfigRepositoryError::persistence)?;
            row.map(row_to_config).transpose()
        })
        .await
    }

    async fn list(&self) -> RegistryConfigRepositoryResult<Vec<RegistryConfig>> {
        self.run_blocking(|connection| {
            registry_configs::table
                .order((
                    registry_configs::is_default.desc(),
                    registry_configs::created_at.desc(),
                ))
                .select(RegistryConfigRow::as_select())
                .load::<RegistryConfigRow>(connection)
                .map_err(RegistryConfigRepositoryError::persistence)?
                .into_iter()
                .map(row_to_config)
                .collect()
        })
        .await
    }

    async fn find_default(&self) -> RegistryConfigRepositoryResult<Option<RegistryConfig>> {
        self.run_blocking(|connection| {
            let row = registry_configs::table
                .filter(registry_configs::is_default.eq(true))
                .select(RegistryConfigRow::as_select())
                .first::<RegistryConfigRow>(connection)
                .optional()
                .map_err(RegistryConfigRepositoryError::persistence)?;
            row.map(row_to_config).transpose()
        })
        .await
    }
}

fn clear_defaults_except(connection: &mut PgConnection, keep: uuid::Uuid) -> QueryResult<usize> {
    diesel::update(
        registry_configs::table
            .filter(registry_configs::is_default.eq(true))
            .filter(registry_configs::id.ne(keep)),
    )
    .set(registry_configs::is_default.eq(false))
    .execute(connection)
}

fn to_row(config: &RegistryConfig) -> RegistryConfigRow {
    RegistryConfigRow {
        id: config.id().into_inner(),
        name: config.name().to_owned(),
        registry_url: config.registry_url().to_owned(),
        username: config.username().to_owned(),
        password_encrypted: config.password_encrypted().to_owned(),
        status: config.status().as_str().to_owned(),
        last_tested_at: config.last_tested_at(),
        is_default: config.is_default(),
        created_at: config.created_at(),
    }
}

fn row_to_config(row: RegistryConfigRow) -> RegistryConfigRepositoryResult<RegistryConfig> {
    let status = VerificationStatus::try_from(row.status.as_str())
        .map_err(RegistryConfigRepositoryError::persistence)?;
    Ok(RegistryConfig::from_persisted(PersistedRegistryConfig {
        id: RegistryConfigId::from_uuid(row.id),
        name: row.name,
        registry_url: row.registry_url,
        username: row.username,
        password_encrypted: row.password_encrypted,
        status,
        last_tested_at: row.last_tested_at,
        is_default: row.is_default,
        created_at: row.created_at,
    }))
}
