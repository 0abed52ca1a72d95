//! Shared fixtures for in-memory integration tests.

use std::sync::Arc;
use std::time::Duration;

use image_relay::registry::{
    adapters::{AesGcmPasswordCipher, InMemoryRegistryConfigRepository},
    services::{CredentialResolver, RegistryConfigService},
};
use image_relay::task::{
    adapters::memory::InMemoryTaskRepository,
    domain::{Task, TaskId},
    services::{LifecycleConfig, TaskLifecycleService},
};
use image_relay::transfer::{adapters::InMemoryImageClient, services::TransferPipeline};
use mockable::DefaultClock;
use rstest::fixture;

/// Task service over in-memory adapters.
pub type TestTaskService = TaskLifecycleService<
    InMemoryTaskRepository,
    InMemoryRegistryConfigRepository,
    AesGcmPasswordCipher,
    InMemoryImageClient,
    DefaultClock,
>;

/// Registry administration service over in-memory adapters.
pub type TestAdminService =
    RegistryConfigService<InMemoryRegistryConfigRepository, AesGcmPasswordCipher, DefaultClock>;

/// Every service wired to one set of shared in-memory stores.
pub struct Relay {
    /// Task lifecycle service.
    pub tasks: TestTaskService,
    /// Registry configuration administration.
    pub registries: TestAdminService,
    /// Image client shared with the pipeline.
    pub images: InMemoryImageClient,
}

/// Provides a relay with default lifecycle settings.
#[fixture]
pub fn relay() -> Relay {
    let configs = Arc::new(InMemoryRegistryConfigRepository::new());
    let cipher = Arc::new(AesGcmPasswordCipher::new("integration-key"));
    let clock = Arc::new(DefaultClock);
    let images = InMemoryImageClient::new();
    let tasks = TaskLifecycleService::new(
        Arc::new(InMemoryTaskRepository::new()),
        CredentialResolver::new(Arc::clone(&configs), Arc::clone(&cipher)),
        TransferPipeline::new(Arc::new(images.clone())),
        Arc::clone(&clock),
        LifecycleConfig::default(),
    );
    let registries = RegistryConfigService::new(configs, cipher, clock);
    Relay {
        tasks,
        registries,
        images,
    }
}

/// Waits for the execution of `task_id` to finish and returns the task.
///
/// # Errors
///
/// Returns an error if the execution does not finish within a minute or
/// the task cannot be read back.
pub async fn settle(service: &TestTaskService, task_id: TaskId) -> Result<Task, eyre::Report> {
    tokio::time::timeout(Duration::from_secs(60), async {
        while service.is_executing(task_id) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await?;
    Ok(service.get_task(task_id).await?.task)
}
