//! Shared world state for transfer task BDD scenarios.

use std::sync::Arc;
use std::time::Duration;

use image_relay::registry::{
    adapters::{AesGcmPasswordCipher, InMemoryRegistryConfigRepository},
    services::{CredentialResolver, DestinationRequest},
};
use image_relay::task::{
    adapters::memory::InMemoryTaskRepository,
    domain::{Task, TaskId},
    services::{CreatedTask, LifecycleConfig, TaskLifecycleError, TaskLifecycleService},
};
use image_relay::transfer::{adapters::InMemoryImageClient, services::TransferPipeline};
use mockable::DefaultClock;
use rstest::fixture;

/// Service type used by the BDD world.
pub type TestTaskService = TaskLifecycleService<
    InMemoryTaskRepository,
    InMemoryRegistryConfigRepository,
    AesGcmPasswordCipher,
    InMemoryImageClient,
    DefaultClock,
>;

/// Upper bound on waiting for a background execution.
pub const WAIT_LIMIT: Duration = Duration::from_secs(30);

/// Scenario world for transfer task behaviour tests.
pub struct TransferWorld {
    /// Service under test.
    pub service: TestTaskService,
    /// Image client shared with the pipeline.
    pub images: InMemoryImageClient,
    /// Destination used by the next creation request.
    pub destination: Option<DestinationRequest>,
    /// Outcome of the last creation request.
    pub creation: Option<Result<CreatedTask, TaskLifecycleError>>,
    /// Outcome of the last cancellation request.
    pub cancellation: Option<Result<Task, TaskLifecycleError>>,
}

impl TransferWorld {
    /// Creates a world over fresh in-memory adapters.
    #[must_use]
    pub fn new() -> Self {
        let images = InMemoryImageClient::new();
        let service = TaskLifecycleService::new(
            Arc::new(InMemoryTaskRepository::new()),
            CredentialResolver::new(
                Arc::new(InMemoryRegistryConfigRepository::new()),
                Arc::new(AesGcmPasswordCipher::new("bdd-key")),
            ),
            TransferPipeline::new(Arc::new(images.clone())),
            Arc::new(DefaultClock),
            LifecycleConfig::default(),
        );

        Self {
            service,
            images,
            destination: None,
            creation: None,
            cancellation: None,
        }
    }

    /// Returns the identifier of the task created by the scenario.
    ///
    /// # Errors
    ///
    /// Returns an error when no task was created successfully.
    pub fn task_id(&self) -> Result<TaskId, eyre::Report> {
        match self.creation.as_ref() {
            Some(Ok(created)) => Ok(created.task_id),
            Some(Err(err)) => Err(eyre::eyre!("task creation failed: {err}")),
            None => Err(eyre::eyre!("no task was requested in this scenario")),
        }
    }
}

impl Default for TransferWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> TransferWorld {
    TransferWorld::default()
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
