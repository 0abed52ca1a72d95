//! Scoped environment overrides for integration tests.

use std::env;
use std::ffi::OsString;
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

static ENV_MUTEX: OnceLock<Mutex<()>> = OnceLock::new();

/// Restores the overridden variables when dropped.
pub struct EnvVarGuard {
    previous: Vec<(OsString, Option<OsString>)>,
    _lock: MutexGuard<'static, ()>,
}

impl EnvVarGuard {
    /// Applies `changes`, removing a variable whose value is `None`.
    pub fn set_many(changes: &[(OsString, Option<OsString>)]) -> Self {
        let lock = ENV_MUTEX
            .get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let previous = changes
            .iter()
            .map(|(key, value)| {
                let prior = env::var_os(key);
                apply(key, value.as_ref());
                (key.clone(), prior)
            })
            .collect();
        Self {
            previous,
            _lock: lock,
        }
    }
}

impl Drop for EnvVarGuard {
    fn drop(&mut self) {
        for (key, value) in self.previous.drain(..).rev() {
            apply(&key, value.as_ref());
        }
    }
}

fn apply(key: &OsString, value: Option<&OsString>) {
    // SAFETY: ENV_MUTEX serialises every environment change made by the tests.
    unsafe {
        match value {
            Some(set) => env::set_var(key, set),
            None => env::remove_var(key),
        }
    }
}
