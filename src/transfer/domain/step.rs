//! Transfer step enumeration and successful transfer outcome.

use serde::{Deserialize, Serialize};

/// Ordered stage of a transfer, used for progress reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStep {
    /// Preparing to start.
    Init,
    /// Pulling the source image.
    Pull,
    /// Re-tagging the pulled image under the target reference.
    Tag,
    /// Pushing to the destination registry.
    Push,
    /// Removing local artefacts.
    Cleanup,
    /// Transfer finished.
    Complete,
}

impl TransferStep {
    /// Returns the persisted ordinal (`0` for init through `5` for complete).
    #[must_use]
    pub const fn ordinal(self) -> u8 {
        match self {
            Self::Init => 0,
            Self::Pull => 1,
            Self::Tag => 2,
            Self::Push => 3,
            Self::Cleanup => 4,
            Self::Complete => 5,
        }
    }

    /// Looks up a step by its persisted ordinal.
    #[must_use]
    pub const fn from_ordinal(ordinal: u8) -> Option<Self> {
        match ordinal {
            0 => Some(Self::Init),
            1 => Some(Self::Pull),
            2 => Some(Self::Tag),
            3 => Some(Self::Push),
            4 => Some(Self::Cleanup),
            5 => Some(Self::Complete),
            _ => None,
        }
    }

    /// Returns the fixed human-readable message for the step.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::Init => "Preparing transfer...",
            Self::Pull => "Pulling source image...",
            Self::Tag => "Re-tagging image...",
            Self::Push => "Pushing to destination registry...",
            Self::Cleanup => "Cleaning up local images...",
            Self::Complete => "Transfer complete",
        }
    }

    /// Returns the progress percentage reported when the step begins.
    #[must_use]
    pub const fn progress(self) -> u8 {
        match self {
            Self::Init => 0,
            Self::Pull => 5,
            Self::Tag => 40,
            Self::Push => 60,
            Self::Cleanup => 90,
            Self::Complete => 100,
        }
    }
}

/// Result of a successful transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutcome {
    /// Canonical form of the pulled source reference.
    pub source_reference: String,
    /// Reference the image was pushed under.
    pub target_reference: String,
    /// Wall-clock duration in whole seconds, rounded to nearest.
    pub duration_secs: u64,
}
