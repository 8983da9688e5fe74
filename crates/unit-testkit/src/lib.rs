//! Unit Test Support Infrastructure
//!
//! Fixture glue that keeps unit tests away from the developer's real
//! filesystem and environment. It provides isolated sandboxes, temp files
//! whose lifetime is tied to the test run, and scoped environment variable
//! overrides that are restored on every exit path.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
//!
//! # Usage
//!
//! Add this to your crate's `Cargo.toml` dev-dependencies:
//! ```toml
//! [dev-dependencies]
//! unit-testkit = { path = "../unit-testkit" }
//! ```
//!
//! Then in your tests:
//! ```rust,no_run
//! use unit_testkit::*;
//!
//! #[test]
//! fn my_test() {
//!     let mut ctx = UnitTestContext::new();
//!     let vagrantfile = ctx.temporary_file(Some(b"Vagrant.configure(\"2\") {}")).unwrap();
//!     let seen = run_with_env([("VAGRANT_VAGRANTFILE", vagrantfile.as_path())], || {
//!         std::env::var_os("VAGRANT_VAGRANTFILE")
//!     })
//!     .unwrap();
//!     assert_eq!(seen.as_deref(), Some(vagrantfile.as_os_str()));
//!     ctx.finish().unwrap();
//! }
//! ```

pub mod config;
pub mod context;
pub mod environment;
pub mod error;
pub mod logging;
pub mod run_state;
pub mod sandbox;
pub mod temp_file;

// Re-export commonly used items
pub use config::{TestkitConfig, DEFAULT_TEMP_PREFIX};
pub use context::UnitTestContext;
pub use environment::{run_with_env, try_run_with_env, EnvValue, ScopedEnvironment};
pub use error::{CleanupFailure, RestoreFailure, Result, ScopedError, TestkitError};
pub use logging::{init_test_logging, init_test_logging_with};
pub use run_state::TestRunState;
pub use sandbox::{IsolatedEnvironment, Sandbox, SandboxFactory};
pub use temp_file::RetainedTempFile;
