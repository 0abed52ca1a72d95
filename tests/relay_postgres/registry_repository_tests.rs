//! Registry configuration repository behaviour against `PostgreSQL`.

use crate::relay_postgres::helpers::{PostgresContext, postgres, registry_config};
use eyre::ensure;
use image_relay::registry::{
    domain::{RegistryConfig, RegistryConfigId},
    ports::{RegistryConfigRepository, RegistryConfigRepositoryError},
};
use rstest::rstest;

#[rstest]
fn a_new_default_replaces_the_old_one(postgres: PostgresContext) -> eyre::Result<()> {
    let context = postgres;
    context.rt.block_on(async {
        let repository = context.registries();
        let first = registry_config("first", true);
        let second = registry_config("second", true);
        repository.store(&first).await?;
        repository.store(&second).await?;

        let default = repository.find_default().await?;
        let listed = repository.list().await?;

        ensure!(default.map(|found| found.id()) == Some(second.id()));
        ensure!(listed.iter().filter(|config| config.is_default()).count() == 1);
        ensure!(listed.first().map(RegistryConfig::id) == Some(second.id()));
        eyre::Ok(())
    })
}

#[rstest]
fn updates_persist_changed_fields(postgres: PostgresContext) -> eyre::Result<()> {
    let context = postgres;
    context.rt.block_on(async {
        let repository = context.registries();
        let mut config = registry_config("harbor", false);
        repository.store(&config).await?;

        config.set_default(true);
        repository.update(&config).await?;

        let stored = repository.find_by_id(config.id()).await?;
        ensure!(stored.as_ref().is_some_and(RegistryConfig::is_default));
        ensure!(stored.map(|found| found.name().to_owned()) == Some("harbor".to_owned()));
        eyre::Ok(())
    })
}

#[rstest]
fn deleting_an_unknown_configuration_is_not_found(postgres: PostgresContext) -> eyre::Result<()> {
    let context = postgres;
    context.rt.block_on(async {
        let repository = context.registries();
        let unknown = RegistryConfigId::new();

        let result = repository.delete(unknown).await;

        ensure!(matches!(
            result,
            Err(RegistryConfigRepositoryError::NotFound(id)) if id == unknown
        ));
        eyre::Ok(())
    })
}
