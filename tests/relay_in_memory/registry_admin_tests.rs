//! In-memory integration tests for registry configuration administration.

use super::helpers::{Relay, relay};
use image_relay::registry::{
    domain::{RegistryConfigId, VerificationStatus},
    services::{CreateRegistryConfigRequest, RegistryConfigError, UpdateRegistryConfigRequest},
};
use rstest::rstest;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn only_one_configuration_is_default(relay: Relay) -> Result<(), eyre::Report> {
    let first = relay
        .registries
        .create(
            CreateRegistryConfigRequest::new("Harbor", "https://harbor.example.com", "robot", "one")
                .as_default(),
        )
        .await?;
    let second = relay
        .registries
        .create(
            CreateRegistryConfigRequest::new("Quay", "https://quay.example.com", "bot", "two")
                .as_default(),
        )
        .await?;

    let listed = relay.registries.list().await?;
    let default = relay.registries.default_config().await?;

    eyre::ensure!(listed.len() == 2);
    eyre::ensure!(listed.iter().filter(|view| view.is_default).count() == 1);
    eyre::ensure!(listed.first().map(|view| view.id) == Some(second.id));
    eyre::ensure!(default.map(|view| view.id) == Some(second.id));
    eyre::ensure!(!relay.registries.get(first.id).await?.is_default);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn editing_resets_verification_and_keeps_password(
    relay: Relay,
) -> Result<(), eyre::Report> {
    let created = relay
        .registries
        .create(CreateRegistryConfigRequest::new(
            "Harbor",
            "https://harbor.example.com",
            "robot",
            "s3cret",
        ))
        .await?;
    let tested = relay.registries.record_test_result(created.id, true).await?;
    eyre::ensure!(tested.status == VerificationStatus::Verified);
    eyre::ensure!(tested.last_tested_at.is_some());

    let updated = relay
        .registries
        .update(
            created.id,
            UpdateRegistryConfigRequest::new("Harbor EU", "https://eu.harbor.example.com", "robot")
                .with_password(""),
        )
        .await?;

    eyre::ensure!(updated.name == "Harbor EU");
    eyre::ensure!(updated.status == VerificationStatus::Pending);
    eyre::ensure!(updated.has_password);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn missing_password_is_rejected(relay: Relay) {
    let result = relay
        .registries
        .create(CreateRegistryConfigRequest::new(
            "Harbor",
            "https://harbor.example.com",
            "robot",
            "",
        ))
        .await;

    assert!(matches!(result, Err(RegistryConfigError::MissingPassword)));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn deleting_an_unknown_configuration_is_not_found(relay: Relay) {
    let missing = RegistryConfigId::new();

    let result = relay.registries.delete(missing).await;

    assert!(matches!(result, Err(RegistryConfigError::NotFound(id)) if id == missing));
}
