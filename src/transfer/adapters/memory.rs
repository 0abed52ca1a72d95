//! In-memory image client for pipeline and lifecycle tests.

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::transfer::{
    domain::RegistryCredentials,
    ports::{ImageClient, ImageClientError, ImageClientResult, run_cancellable},
};

/// Operation kinds accepted by [`InMemoryImageClient`] fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageOperation {
    /// [`ImageClient::pull`].
    Pull,
    /// [`ImageClient::tag`].
    Tag,
    /// [`ImageClient::push`].
    Push,
    /// [`ImageClient::remove`].
    Remove,
}

/// One recorded client call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageCall {
    /// Operation invoked.
    pub operation: ImageOperation,
    /// Reference the operation acted on (the target for tags).
    pub reference: String,
}

/// An image accepted by [`ImageClient::push`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushedImage {
    /// Pushed reference.
    pub reference: String,
    /// Username presented to the registry.
    pub username: String,
}

/// Thread-safe image client that keeps "local" images in a set.
///
/// Pulls always succeed unless a failure is injected; tag, push, and remove
/// require the named image to be stored locally.
#[derive(Debug, Clone, Default)]
pub struct InMemoryImageClient {
    state: Arc<RwLock<InMemoryImageState>>,
}

#[derive(Debug, Default)]
struct InMemoryImageState {
    local: BTreeSet<String>,
    pushed: Vec<PushedImage>,
    calls: Vec<ImageCall>,
    failures: HashMap<ImageOperation, String>,
    delays: HashMap<ImageOperation, Duration>,
}

impl InMemoryImageClient {
    /// Creates a client with an empty local store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later `operation` fail with `message`.
    pub fn fail_on(&self, operation: ImageOperation, message: impl Into<String>) {
        self.write_state()
            .failures
            .insert(operation, message.into());
    }

    /// Makes every later `operation` wait `delay` before completing.
    ///
    /// The wait observes the cancellation token passed to the call.
    pub fn delay_on(&self, operation: ImageOperation, delay: Duration) {
        self.write_state().delays.insert(operation, delay);
    }

    /// Returns `true` when `reference` is stored locally.
    #[must_use]
    pub fn has_local(&self, reference: &str) -> bool {
        self.read_state().local.contains(reference)
    }

    /// Returns every locally stored reference in sorted order.
    #[must_use]
    pub fn local_images(&self) -> Vec<String> {
        self.read_state().local.iter().cloned().collect()
    }

    /// Returns every image accepted by a push, oldest first.
    #[must_use]
    pub fn pushed(&self) -> Vec<PushedImage> {
        self.read_state().pushed.clone()
    }

    /// Returns every call made so far, oldest first.
    #[must_use]
    pub fn calls(&self) -> Vec<ImageCall> {
        self.read_state().calls.clone()
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, InMemoryImageState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, InMemoryImageState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records the call, honours injected delays and failures, then applies
    /// `effect` to the store.
    async fn perform<F>(
        &self,
        cancel: &CancellationToken,
        operation: ImageOperation,
        reference: &str,
        effect: F,
    ) -> ImageClientResult<()>
    where
        F: FnOnce(&mut InMemoryImageState) -> ImageClientResult<()> + Send,
    {
        let (delay, failure) = {
            let mut state = self.write_state();
            state.calls.push(ImageCall {
                operation,
                reference: reference.to_owned(),
            });
            (
                state.delays.get(&operation).copied(),
                state.failures.get(&operation).cloned(),
            )
        };

        if let Some(delay) = delay {
            run_cancellable(cancel, async {
                tokio::time::sleep(delay).await;
                Ok(())
            })
            .await?;
        }
        if cancel.is_cancelled() {
            return Err(ImageClientError::Cancelled);
        }
        if let Some(message) = failure {
            return Err(ImageClientError::Rejected(message));
        }

        effect(&mut self.write_state())
    }
}

fn require_local(state: &InMemoryImageState, reference: &str) -> ImageClientResult<()> {
    if state.local.contains(reference) {
        Ok(())
    } else {
        Err(ImageClientError::NotFound(reference.to_owned()))
    }
}

#[async_trait]
impl ImageClient for InMemoryImageClient {
    async fn pull(&self, cancel: &CancellationToken, reference: &str) -> ImageClientResult<()> {
        self.perform(cancel, ImageOperation::Pull, reference, |state| {
            state.local.insert(reference.to_owned());
            Ok(())
        })
        .await
    }

    async fn tag(
        &self,
        cancel: &CancellationToken,
        source: &str,
        target: &str,
    ) -> ImageClientResult<()> {
        self.perform(cancel, ImageOperation::Tag, target, |state| {
            require_local(state, source)?;
            state.local.insert(target.to_owned());
            Ok(())
        })
        .await
    }

    async fn push(
        &self,
        cancel: &CancellationToken,
        reference: &str,
        credentials: &RegistryCredentials,
    ) -> ImageClientResult<()> {
        self.perform(cancel, ImageOperation::Push, reference, |state| {
            require_local(state, reference)?;
            state.pushed.push(PushedImage {
                reference: reference.to_owned(),
                username: credentials.username().to_owned(),
            });
            Ok(())
        })
        .await
    }

    async fn remove(&self, cancel: &CancellationToken, reference: &str) -> ImageClientResult<()> {
        self.perform(cancel, ImageOperation::Remove, reference, |state| {
            if state.local.remove(reference) {
                Ok(())
            } else {
                Err(ImageClientError::NotFound(reference.to_owned()))
            }
        })
        .await
    }
}
