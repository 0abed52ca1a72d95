//! Image reference parsing and canonical normalisation.
//!
//! A reference such as `registry.example.com/team/app:v2` is decomposed into
//! registry host, namespace, repository, and tag. Ambiguous inputs are never
//! rejected; they are resolved by a fixed precedence:
//!
//! - one path segment is an official image under `docker.io/library`
//! - two segments name a registry host only when the first contains `.` or
//!   `:`, otherwise a `docker.io` namespace
//! - three or more segments are `registry/namespace…/repository`
//!
//! The host heuristic misreads dot-less hosts such as `localhost/app` as a
//! namespace. That behaviour is kept for compatibility with existing stored
//! task records.

mod error;
mod image_reference;

pub use error::{InvalidReferenceReason, ReferenceError};
pub use image_reference::{
    DEFAULT_NAMESPACE, DEFAULT_REGISTRY, DEFAULT_TAG, ImageReference, TARGET_NAMESPACE_PREFIX,
    build_target_reference, extract_host, normalize, normalize_registry_host,
};
