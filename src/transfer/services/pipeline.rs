//! Pull, re-tag, push, and cleanup sequencing with push compensation.

use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::reference;
use crate::transfer::{
    domain::{RegistryCredentials, TransferError, TransferOutcome, TransferStep},
    ports::{ImageClient, ImageClientError, StepObserver},
};

/// Moves one image from its source registry to a destination registry.
#[derive(Clone)]
pub struct TransferPipeline<I>
where
    I: ImageClient,
{
    client: Arc<I>,
}

impl<I> TransferPipeline<I>
where
    I: ImageClient,
{
    /// Creates a pipeline over `client`.
    #[must_use]
    pub const fn new(client: Arc<I>) -> Self {
        Self { client }
    }

    /// Runs one transfer, reporting each step to `observer` as it begins.
    ///
    /// The source is normalised before pulling. When the push fails, the
    /// locally tagged target is removed and the pulled source is kept. After
    /// a successful push both local images are removed; failures there are
    /// logged and ignored.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::InvalidSource`] for a malformed source,
    /// [`TransferError::Cancelled`] once `cancel` fires, or the pull, tag, or
    /// push failure that stopped the transfer.
    pub async fn transfer(
        &self,
        cancel: &CancellationToken,
        source: &str,
        target: &str,
        credentials: &RegistryCredentials,
        observer: &dyn StepObserver,
    ) -> Result<TransferOutcome, TransferError> {
        let started = Instant::now();
        let normalized = reference::normalize(source).map_err(TransferError::InvalidSource)?;

        observer.step_started(TransferStep::Pull);
        debug!(source = %normalized, "pulling source image");
        self.client
            .pull(cancel, &normalized)
            .await
            .map_err(|err| step_error(TransferStep::Pull, err, |client_err| {
                TransferError::PullFailed {
                    reference: normalized.clone(),
                    source: client_err,
                }
            }))?;

        observer.step_started(TransferStep::Tag);
        self.client
            .tag(cancel, &normalized, target)
            .await
            .map_err(|err| step_error(TransferStep::Tag, err, |client_err| {
                TransferError::TagFailed {
                    from: normalized.clone(),
                    to: target.to_owned(),
                    source: client_err,
                }
            }))?;

        observer.step_started(TransferStep::Push);
        if let Err(err) = self.client.push(cancel, target, credentials).await {
            self.compensate(target).await;
            return Err(step_error(TransferStep::Push, err, |client_err| {
                TransferError::PushFailed {
                    reference: target.to_owned(),
                    source: client_err,
                }
            }));
        }

        observer.step_started(TransferStep::Cleanup);
        self.cleanup(&[normalized.as_str(), target]).await;

        observer.step_started(TransferStep::Complete);
        let duration_secs = rounded_secs(started.elapsed());
        info!(source = %normalized, target, duration_secs, "image transferred");
        Ok(TransferOutcome {
            source_reference: normalized,
            target_reference: target.to_owned(),
            duration_secs,
        })
    }

    /// Removes the local target after a failed push.
    ///
    /// Runs under a fresh token so that a cancelled transfer still releases
    /// what it tagged.
    async fn compensate(&self, target: &str) {
        if let Err(err) = self.client.remove(&CancellationToken::new(), target).await {
            warn!(target, error = %err, "failed to remove target after push failure");
        }
    }

    async fn cleanup(&self, references: &[&str]) {
        let token = CancellationToken::new();
        for reference in references {
            if let Err(err) = self.client.remove(&token, reference).await {
                warn!(reference, error = %err, "failed to remove local image");
            }
        }
    }
}

fn step_error(
    step: TransferStep,
    err: ImageClientError,
    wrap: impl FnOnce(ImageClientError) -> TransferError,
) -> TransferError {
    match err {
        ImageClientError::Cancelled => TransferError::Cancelled { step },
        other => wrap(other),
    }
}

/// Rounds to the nearest whole second.
fn rounded_secs(elapsed: std::time::Duration) -> u64 {
    (elapsed + std::time::Duration::from_millis(500)).as_secs()
}
