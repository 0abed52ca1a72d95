//! Environment-driven service configuration.
//!
//! Values are read through a lookup function so callers (and tests) can
//! supply their own source instead of the process environment.

use std::time::Duration;
use thiserror::Error;

use crate::task::services::LifecycleConfig;

/// Connection string for `PostgreSQL`; in-memory stores are used when unset.
pub const DATABASE_URL_VAR: &str = "DATABASE_URL";
/// Secret from which the password encryption key is derived.
pub const ENCRYPTION_KEY_VAR: &str = "ENCRYPTION_KEY";
/// Default tracing filter directive.
pub const LOG_LEVEL_VAR: &str = "LOG_LEVEL";
/// Ceiling on one task execution, in seconds.
pub const TASK_TIMEOUT_VAR: &str = "TASK_TIMEOUT_SECS";
/// Number of terminal tasks in the dashboard listing.
pub const RECENT_LIMIT_VAR: &str = "RECENT_TASK_LIMIT";

const DEFAULT_ENCRYPTION_KEY: &str = "image-relay-secret-key";
const DEFAULT_LOG_LEVEL: &str = "info";

/// Errors raised while reading configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A variable was set to a value that does not parse.
    #[error("invalid value {value:?} for {variable}: {reason}")]
    InvalidValue {
        /// Variable name.
        variable: &'static str,
        /// Raw value supplied.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Settings for one service instance.
#[derive(Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// `PostgreSQL` connection string, if persistence is wanted.
    pub database_url: Option<String>,
    /// Secret for registry password encryption.
    pub encryption_key: String,
    /// Tracing filter used when `RUST_LOG` is unset.
    pub log_level: String,
    /// Ceiling on one task execution.
    pub task_timeout: Duration,
    /// Number of terminal tasks in the dashboard listing.
    pub recent_limit: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        let lifecycle = LifecycleConfig::default();
        Self {
            database_url: None,
            encryption_key: DEFAULT_ENCRYPTION_KEY.to_owned(),
            log_level: DEFAULT_LOG_LEVEL.to_owned(),
            task_timeout: lifecycle.task_timeout,
            recent_limit: lifecycle.recent_limit,
        }
    }
}

impl std::fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("database_url", &self.database_url.as_ref().map(|_| "<redacted>"))
            .field("encryption_key", &"<redacted>")
            .field("log_level", &self.log_level)
            .field("task_timeout", &self.task_timeout)
            .field("recent_limit", &self.recent_limit)
            .finish()
    }
}

impl ServiceConfig {
    /// Reads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] when a numeric variable does not
    /// parse or is zero.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads configuration through `lookup`; blank values count as unset.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] when a numeric variable does not
    /// parse or is zero.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };
        let defaults = Self::default();

        let task_timeout = match read(TASK_TIMEOUT_VAR) {
            Some(raw) => Duration::from_secs(positive(TASK_TIMEOUT_VAR, &raw)?),
            None => defaults.task_timeout,
        };
        let recent_limit = match read(RECENT_LIMIT_VAR) {
            Some(raw) => positive(RECENT_LIMIT_VAR, &raw)?,
            None => defaults.recent_limit,
        };

        Ok(Self {
            database_url: read(DATABASE_URL_VAR),
            encryption_key: read(ENCRYPTION_KEY_VAR).unwrap_or(defaults.encryption_key),
            log_level: read(LOG_LEVEL_VAR).unwrap_or(defaults.log_level),
            task_timeout,
            recent_limit,
        })
    }

    /// Returns the task lifecycle subset of the configuration.
    #[must_use]
    pub const fn lifecycle(&self) -> LifecycleConfig {
        LifecycleConfig {
            task_timeout: self.task_timeout,
            recent_limit: self.recent_limit,
        }
    }
}

fn positive<N>(variable: &'static str, raw: &str) -> Result<N, ConfigError>
where
    N: std::str::FromStr + Default + PartialEq,
    N::Err: std::fmt::Display,
{
    let invalid = |reason: String| ConfigError::InvalidValue {
        variable,
        value: raw.to_owned(),
        reason,
    };
    let parsed = raw.parse::<N>().map_err(|err| invalid(err.to_string()))?;
    if parsed == N::default() {
        return Err(invalid("must be greater than zero".to_owned()));
    }
    Ok(parsed)
}
