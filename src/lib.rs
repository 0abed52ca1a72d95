//! Image relay: copies container images between registries as tracked,
//! cancellable background tasks.
//!
//! # Architecture
//!
//! The crate follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for external interactions
//! - **Adapters**: Concrete implementations of ports (database, registry
//!   client, encryption)
//! - **Services**: Orchestration over ports
//!
//! # Modules
//!
//! - [`reference`]: Image reference parsing and canonical normalisation
//! - [`transfer`]: Pull, re-tag, push, and cleanup of one image
//! - [`registry`]: Stored registry configurations and credential resolution
//! - [`task`]: Transfer task lifecycle, cancellation, and shutdown
//! - [`config`]: Environment-driven service configuration
//! - [`telemetry`]: Tracing subscriber setup

pub mod config;
pub mod reference;
pub mod registry;
pub mod task;
pub mod telemetry;
pub mod transfer;
