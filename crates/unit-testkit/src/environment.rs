//! Scoped environment variable overrides
//!
//! All process environment mutation made by the harness goes through
//! [`ScopedEnvironment`]. A scope snapshots every key it touches before
//! mutating anything, holds the process-wide environment lock while the
//! overrides are live, and puts every key back on restore or drop. Keys that
//! were unset beforehand are removed again, never left as empty strings.
//!
//! The lock is reentrant so scopes nest on one thread. Nested scopes restore
//! in LIFO order: the inner scope reverts to what the outer scope set, and
//! the outer scope reverts to the original state.
//!
//! ```rust,no_run
//! use unit_testkit::run_with_env;
//!
//! let home = run_with_env([("VAGRANT_HOME", "/tmp/sandbox/home")], || {
//!     std::env::var("VAGRANT_HOME").ok()
//! })
//! .unwrap();
//! assert_eq!(home.as_deref(), Some("/tmp/sandbox/home"));
//! ```

use crate::error::{RestoreFailure, Result, ScopedError, TestkitError};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use std::env;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

/// Process-wide lock serialising environment override windows
static ENV_LOCK: Lazy<ReentrantMutex<()>> = Lazy::new(|| ReentrantMutex::new(()));

/// Value a variable takes for the duration of a scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvValue {
    /// Set the variable to this value
    Set(OsString),
    /// Remove the variable
    Unset,
}

impl EnvValue {
    fn as_os_str(&self) -> Option<&OsStr> {
        match self {
            Self::Set(value) => Some(value.as_os_str()),
            Self::Unset => None,
        }
    }
}

impl From<&str> for EnvValue {
    fn from(value: &str) -> Self {
        Self::Set(value.into())
    }
}

impl From<String> for EnvValue {
    fn from(value: String) -> Self {
        Self::Set(value.into())
    }
}

impl From<&String> for EnvValue {
    fn from(value: &String) -> Self {
        Self::Set(value.into())
    }
}

impl From<OsString> for EnvValue {
    fn from(value: OsString) -> Self {
        Self::Set(value)
    }
}

impl From<&OsStr> for EnvValue {
    fn from(value: &OsStr) -> Self {
        Self::Set(value.to_os_string())
    }
}

impl From<&Path> for EnvValue {
    fn from(value: &Path) -> Self {
        Self::Set(value.as_os_str().to_os_string())
    }
}

impl From<PathBuf> for EnvValue {
    fn from(value: PathBuf) -> Self {
        Self::Set(value.into_os_string())
    }
}

impl From<Option<&str>> for EnvValue {
    fn from(value: Option<&str>) -> Self {
        value.map_or(Self::Unset, Self::from)
    }
}

impl From<Option<String>> for EnvValue {
    fn from(value: Option<String>) -> Self {
        value.map_or(Self::Unset, Self::from)
    }
}

/// RAII guard for a set of environment overrides
///
/// Created by [`ScopedEnvironment::apply`]. Call [`restore`](Self::restore)
/// to revert and observe failures; dropping an unrestored guard (including
/// during a panic) reverts as well and logs any failure.
#[must_use = "dropping the guard immediately reverts the overrides"]
pub struct ScopedEnvironment {
    /// Prior values in application order
    snapshot: Vec<(String, Option<OsString>)>,
    restored: bool,
    _lock: ReentrantMutexGuard<'static, ()>,
}

impl std::fmt::Debug for ScopedEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedEnvironment")
            .field("snapshot", &self.snapshot)
            .field("restored", &self.restored)
            .finish_non_exhaustive()
    }
}

impl ScopedEnvironment {
    /// Snapshot and then apply `overrides`
    ///
    /// Duplicate keys collapse with the last value winning. Every name and
    /// value is validated before the first mutation, so a rejected override
    /// leaves the environment untouched.
    pub fn apply<I, K, V>(overrides: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<EnvValue>,
    {
        let mut pending: IndexMap<String, EnvValue> = IndexMap::new();
        for (key, value) in overrides {
            pending.insert(key.into(), value.into());
        }

        for (key, value) in &pending {
            check_entry(key, value.as_os_str())
                .map_err(|reason| TestkitError::invalid_variable(key.as_str(), reason))?;
        }

        let lock = ENV_LOCK.lock();

        let snapshot: Vec<(String, Option<OsString>)> = pending
            .keys()
            .map(|key| (key.clone(), env::var_os(key)))
            .collect();

        for (key, value) in &pending {
            write_var(key, value.as_os_str());
            tracing::debug!(
                key = %key,
                unset = value.as_os_str().is_none(),
                "Applied environment override"
            );
        }

        Ok(Self {
            snapshot,
            restored: false,
            _lock: lock,
        })
    }

    /// Names of the variables this scope overrides, in application order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.snapshot.iter().map(|(key, _)| key.as_str())
    }

    /// Value a key had before this scope was applied
    ///
    /// Returns `None` for keys outside the scope and `Some(None)` for keys
    /// that were unset.
    pub fn prior_value(&self, key: &str) -> Option<Option<&OsStr>> {
        self.snapshot
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, prior)| prior.as_deref())
    }

    /// Revert every overridden key to its snapshot
    ///
    /// All keys are attempted even when some fail; the failures are returned
    /// together as `TestkitError::RestoreFailure`.
    pub fn restore(mut self) -> Result<()> {
        let failures = self.restore_all();
        if failures.is_empty() {
            Ok(())
        } else {
            Err(TestkitError::RestoreFailure { failures })
        }
    }

    fn restore_all(&mut self) -> Vec<RestoreFailure> {
        if self.restored {
            return Vec::new();
        }
        self.restored = true;

        let mut failures = Vec::new();
        for (key, prior) in self.snapshot.iter().rev() {
            let prior = prior.as_deref();
            if let Err(reason) = check_entry(key, prior) {
                failures.push(RestoreFailure {
                    key: key.clone(),
                    reason,
                });
                continue;
            }

            write_var(key, prior);

            if env::var_os(key).as_deref() != prior {
                failures.push(RestoreFailure {
                    key: key.clone(),
                    reason: "environment did not reflect the restored value".to_string(),
                });
                continue;
            }
            tracing::debug!(key = %key, was_set = prior.is_some(), "Restored environment variable");
        }
        failures
    }
}

impl Drop for ScopedEnvironment {
    fn drop(&mut self) {
        for failure in self.restore_all() {
            tracing::error!(
                key = %failure.key,
                reason = %failure.reason,
                "Failed to restore environment variable"
            );
        }
    }
}

/// Run `action` with `overrides` applied, then restore unconditionally
///
/// A panic in `action` propagates after the environment has been restored.
/// If the action completes but restoration fails, the restore failure is
/// returned.
pub fn run_with_env<I, K, V, F, T>(overrides: I, action: F) -> Result<T>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<EnvValue>,
    F: FnOnce() -> T,
{
    let scope = ScopedEnvironment::apply(overrides)?;
    let value = action();
    scope.restore()?;
    Ok(value)
}

/// Like [`run_with_env`] for actions that can fail
///
/// The action's error is returned unchanged in [`ScopedError::Action`]. A
/// restore failure after a failed action is attached to it instead of
/// replacing it.
pub fn try_run_with_env<I, K, V, F, T, E>(
    overrides: I,
    action: F,
) -> std::result::Result<T, ScopedError<E>>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<EnvValue>,
    F: FnOnce() -> std::result::Result<T, E>,
{
    let scope = ScopedEnvironment::apply(overrides).map_err(ScopedError::Setup)?;
    let outcome = action();
    let restored = scope.restore();

    match (outcome, restored) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(err)) => Err(ScopedError::Restore(err)),
        (Err(source), restored) => {
            let restore = restored.err();
            if let Some(err) = &restore {
                tracing::error!(error = %err, "Environment restore failed after action failure");
            }
            Err(ScopedError::Action { source, restore })
        }
    }
}

fn check_entry(key: &str, value: Option<&OsStr>) -> std::result::Result<(), String> {
    if key.is_empty() {
        return Err("name is empty".to_string());
    }
    if key.contains('=') {
        return Err("name contains '='".to_string());
    }
    if key.contains('\0') {
        return Err("name contains a NUL byte".to_string());
    }
    if let Some(value) = value {
        if value.as_encoded_bytes().contains(&0) {
            return Err("value contains a NUL byte".to_string());
        }
    }
    Ok(())
}

fn write_var(key: &str, value: Option<&OsStr>) {
    match value {
        Some(value) => env::set_var(key, value),
        None => env::remove_var(key),
    }
}
