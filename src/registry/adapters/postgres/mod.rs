//! `PostgreSQL` adapter for registry configuration persistence.

mod models;
mod repository;
mod schema;

pub use repository::{PostgresRegistryConfigRepository, RegistryPgPool};
