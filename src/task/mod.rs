//! Transfer task lifecycle.
//!
//! A task records one requested image transfer. Creating a task stores a
//! pending record and hands the transfer to a background execution, which
//! moves the record through `running` to `completed` or `failed`; a user
//! cancellation or service shutdown ends it as `cancelled` instead. Every
//! write is a compare-and-swap on the record's version, so once a task is
//! terminal no late writer can change it. The module follows hexagonal
//! architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;
