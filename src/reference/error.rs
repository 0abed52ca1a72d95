//! Error types for image reference parsing.

use std::fmt;
use thiserror::Error;

/// Errors returned while parsing image references.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReferenceError {
    /// The reference is empty or structurally malformed.
    #[error("invalid image reference '{reference}': {reason}")]
    InvalidReference {
        /// The rejected input.
        reference: String,
        /// Why the input was rejected.
        reason: InvalidReferenceReason,
    },
}

impl ReferenceError {
    pub(crate) fn invalid(reference: &str, reason: InvalidReferenceReason) -> Self {
        Self::InvalidReference {
            reference: reference.to_owned(),
            reason,
        }
    }
}

/// Structural reason for rejecting a reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReferenceReason {
    /// The reference is empty.
    Empty,
    /// The reference contains a character outside `[A-Za-z0-9._/:-]`.
    ForbiddenCharacter(char),
    /// A `/`-delimited path segment is empty.
    EmptySegment,
    /// The reference ends with `:` and no tag.
    EmptyTag,
    /// A `:` appears outside the registry port or the tag separator.
    MisplacedColon,
}

impl fmt::Display for InvalidReferenceReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "reference must not be empty"),
            Self::ForbiddenCharacter(character) => {
                write!(f, "character {character:?} is not allowed")
            }
            Self::EmptySegment => write!(f, "path segments must not be empty"),
            Self::EmptyTag => write!(f, "tag must not be empty"),
            Self::MisplacedColon => {
                write!(f, "':' is only allowed in the registry host or before the tag")
            }
        }
    }
}
