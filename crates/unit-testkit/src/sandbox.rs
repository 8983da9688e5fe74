//! Sandbox construction
//!
//! The harness only owns construction of a sandbox and a slot for caller
//! setup; what a sandbox contains is up to the implementing type.
//! [`IsolatedEnvironment`] is the stock implementation: a private directory
//! tree that tests populate before pointing the system under test at it.

use crate::error::{Result, TestkitError};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A self-contained fixture context for one test
pub trait Sandbox: Sized {
    /// Build a fresh, independent instance
    fn create() -> Result<Self>;
}

/// Constructs sandboxes and runs caller setup against them
#[derive(Debug, Clone, Copy, Default)]
pub struct SandboxFactory;

impl SandboxFactory {
    /// Construct a new sandbox with no further setup
    pub fn new_sandbox<S: Sandbox>() -> Result<S> {
        S::create()
    }

    /// Construct a new sandbox and hand it to `setup` before returning it
    pub fn new_sandbox_with<S, F>(setup: F) -> Result<S>
    where
        S: Sandbox,
        F: FnOnce(&mut S),
    {
        let mut sandbox = S::create()?;
        setup(&mut sandbox);
        Ok(sandbox)
    }
}

/// Isolated filesystem root with `home/` and `tmp/` subdirectories
///
/// The whole tree is removed when the value is dropped.
#[derive(Debug)]
pub struct IsolatedEnvironment {
    root: TempDir,
    home: PathBuf,
    tmp: PathBuf,
}

impl Sandbox for IsolatedEnvironment {
    fn create() -> Result<Self> {
        let root = tempfile::Builder::new()
            .prefix("vagrant-unit-env")
            .tempdir()
            .map_err(|e| TestkitError::from_io(&e, "create isolated environment"))?;

        let home = root.path().join("home");
        let tmp = root.path().join("tmp");
        for dir in [&home, &tmp] {
            std::fs::create_dir(dir)
                .map_err(|e| TestkitError::from_io(&e, format!("create {}", dir.display())))?;
        }

        tracing::debug!(root = %root.path().display(), "Created isolated environment");
        Ok(Self { root, home, tmp })
    }
}

impl IsolatedEnvironment {
    /// Root directory of the sandbox
    pub fn root(&self) -> &Path {
        self.root.path()
    }

    /// Directory standing in for the user's home
    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Scratch directory inside the sandbox
    pub fn tmp(&self) -> &Path {
        &self.tmp
    }

    /// Write `contents` to `relative` under the root, creating parents
    ///
    /// Absolute paths and `..` components are refused so fixtures cannot
    /// escape the sandbox.
    pub fn write_file(
        &self,
        relative: impl AsRef<Path>,
        contents: impl AsRef<[u8]>,
    ) -> Result<PathBuf> {
        let relative = relative.as_ref();
        if relative.is_absolute()
            || relative
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(TestkitError::io(format!(
                "{} is outside the isolated environment",
                relative.display()
            )));
        }

        let path = self.root.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| TestkitError::from_io(&e, format!("create {}", parent.display())))?;
        }
        std::fs::write(&path, contents)
            .map_err(|e| TestkitError::from_io(&e, format!("write {}", path.display())))?;
        Ok(path)
    }

    /// Overrides that point `HOME` and `TMPDIR` into the sandbox
    ///
    /// Intended for `run_with_env`.
    pub fn env_overrides(&self) -> Vec<(&'static str, PathBuf)> {
        vec![("HOME", self.home.clone()), ("TMPDIR", self.tmp.clone())]
    }
}
