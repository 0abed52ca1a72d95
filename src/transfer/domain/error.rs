//! Error types for the transfer pipeline.

use super::TransferStep;
use crate::reference::ReferenceError;
use crate::transfer::ports::ImageClientError;
use thiserror::Error;

/// Errors returned by [`crate::transfer::services::TransferPipeline`].
#[derive(Debug, Error)]
pub enum TransferError {
    /// The source reference failed validation.
    #[error("invalid source image: {0}")]
    InvalidSource(#[source] ReferenceError),

    /// Pulling the source image failed.
    #[error("failed to pull image {reference}: {source}")]
    PullFailed {
        /// Normalised source reference.
        reference: String,
        /// Underlying client failure.
        source: ImageClientError,
    },

    /// Re-tagging the pulled image failed.
    #[error("failed to tag image {from} as {to}: {source}")]
    TagFailed {
        /// Normalised source reference.
        from: String,
        /// Target reference.
        to: String,
        /// Underlying client failure.
        source: ImageClientError,
    },

    /// Pushing to the destination failed.
    #[error("failed to push image {reference}: {source}")]
    PushFailed {
        /// Target reference.
        reference: String,
        /// Underlying client failure.
        source: ImageClientError,
    },

    /// The transfer's cancellation token fired during a step.
    #[error("transfer cancelled during {step:?} step")]
    Cancelled {
        /// Step that observed the cancellation.
        step: TransferStep,
    },
}
