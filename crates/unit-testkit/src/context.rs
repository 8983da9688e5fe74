//! Per-test fixture context
//!
//! `UnitTestContext` bundles the run registry, sandbox construction and
//! environment overrides that a unit test needs. Construct one at the top of
//! a test; the run begins immediately and ends on [`UnitTestContext::finish`]
//! or when the context is dropped.
//!
//! ```rust,no_run
//! use unit_testkit::UnitTestContext;
//!
//! let mut ctx = UnitTestContext::new();
//! let env = ctx
//!     .isolated_environment_with(|env| {
//!         env.write_file("Vagrantfile", "# empty").unwrap();
//!     })
//!     .unwrap();
//! let config = ctx.temporary_file(Some(b"box = 'precise64'")).unwrap();
//! let home = ctx
//!     .with_temp_env(env.env_overrides(), || std::env::var_os("HOME"))
//!     .unwrap();
//! assert_eq!(home.as_deref(), Some(env.home().as_os_str()));
//! assert!(config.exists());
//! ctx.finish().unwrap();
//! ```

use crate::config::TestkitConfig;
use crate::environment::{run_with_env, EnvValue};
use crate::error::Result;
use crate::run_state::TestRunState;
use crate::sandbox::{IsolatedEnvironment, SandboxFactory};
use std::path::PathBuf;

/// Fixture context for a single unit test
#[derive(Debug)]
pub struct UnitTestContext {
    run: TestRunState,
}

impl Default for UnitTestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitTestContext {
    /// Begin a run with the default configuration
    pub fn new() -> Self {
        Self::with_config(TestkitConfig::default())
    }

    /// Begin a run with `config`
    pub fn with_config(config: TestkitConfig) -> Self {
        let mut run = TestRunState::with_config(config);
        run.begin_run();
        Self { run }
    }

    /// The run registry backing this context
    pub fn run(&self) -> &TestRunState {
        &self.run
    }

    /// A fresh isolated environment
    pub fn isolated_environment(&self) -> Result<IsolatedEnvironment> {
        SandboxFactory::new_sandbox()
    }

    /// A fresh isolated environment, populated by `setup` before return
    pub fn isolated_environment_with<F>(&self, setup: F) -> Result<IsolatedEnvironment>
    where
        F: FnOnce(&mut IsolatedEnvironment),
    {
        SandboxFactory::new_sandbox_with(setup)
    }

    /// Temp file kept on disk until the run ends
    pub fn temporary_file(&mut self, contents: Option<&[u8]>) -> Result<PathBuf> {
        self.run.temporary_file(contents)
    }

    /// Run `action` with temporary environment overrides
    pub fn with_temp_env<I, K, V, F, T>(&self, overrides: I, action: F) -> Result<T>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<EnvValue>,
        F: FnOnce() -> T,
    {
        run_with_env(overrides, action)
    }

    /// End the run, releasing every retained temp file
    pub fn finish(mut self) -> Result<()> {
        self.run.end_run()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn run_is_active_until_finish() {
        let dir = TempDir::new().unwrap();
        let config = TestkitConfig::default().with_temp_dir(dir.path());
        let mut ctx = UnitTestContext::with_config(config);
        assert!(ctx.run().is_active());

        let path = ctx.temporary_file(Some(b"data")).unwrap();
        assert!(path.exists());

        ctx.finish().unwrap();
        assert!(!path.exists());
    }
}
