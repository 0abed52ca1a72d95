//! Image transfer pipeline.
//!
//! Moves one image between registries by sequencing pull, re-tag, push, and
//! local cleanup against an [`ports::ImageClient`]. The module follows the
//! same hexagonal split as the rest of the crate:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - The pipeline service in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;
