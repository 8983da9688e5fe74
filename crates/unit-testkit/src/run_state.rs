//! Per-test run registry
//!
//! Owns every [`RetainedTempFile`] created during one test. Files are
//! released together, in creation order, when the run ends.
//!
//! # Lifecycle
//!
//! `begin_run` → any number of `track`/`temporary_file` → `end_run`. A state
//! dropped while still active ends its run and logs any cleanup failures.

use crate::config::TestkitConfig;
use crate::error::{CleanupFailure, Result, TestkitError};
use crate::temp_file::RetainedTempFile;
use std::path::{Path, PathBuf};

/// Registry of retained temp files for a single test run
#[derive(Debug, Default)]
pub struct TestRunState {
    config: TestkitConfig,
    files: Vec<RetainedTempFile>,
    active: bool,
}

impl TestRunState {
    /// Create an inactive registry using the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an inactive registry using `config` for temp files
    pub fn with_config(config: TestkitConfig) -> Self {
        Self {
            config,
            files: Vec::new(),
            active: false,
        }
    }

    /// Configuration used for temp files in this run
    pub fn config(&self) -> &TestkitConfig {
        &self.config
    }

    /// Start a run with an empty registry
    ///
    /// Handles left over from a run that was never ended are released first.
    pub fn begin_run(&mut self) {
        if !self.files.is_empty() {
            tracing::warn!(
                leftover = self.files.len(),
                "Beginning a run with handles from a previous run"
            );
            for failure in self.release_all() {
                tracing::warn!(
                    path = %failure.path.display(),
                    reason = %failure.reason,
                    "Failed to release leftover temp file"
                );
            }
        }
        self.active = true;
        tracing::debug!("Test run started");
    }

    /// Whether a run is in progress
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Number of tracked files
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether no files are tracked
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Paths of tracked files in creation order
    pub fn tracked_paths(&self) -> impl Iterator<Item = &Path> {
        self.files.iter().map(RetainedTempFile::path)
    }

    /// Retain `file` until the run ends
    ///
    /// Fails with `NoActiveRun` outside a run; the file is released rather
    /// than leaked in that case.
    pub fn track(&mut self, file: RetainedTempFile) -> Result<()> {
        if !self.active {
            let path = file.path().display().to_string();
            if let Err(e) = file.release() {
                tracing::warn!(path = %path, error = %e, "Failed to release untracked temp file");
            }
            return Err(TestkitError::NoActiveRun);
        }
        self.files.push(file);
        Ok(())
    }

    /// Create a temp file and retain it for the rest of the run
    ///
    /// Only the path is handed back; the file stays on disk until `end_run`.
    pub fn temporary_file(&mut self, contents: Option<&[u8]>) -> Result<PathBuf> {
        if !self.active {
            return Err(TestkitError::NoActiveRun);
        }
        let file = RetainedTempFile::create(&self.config, contents)?;
        let path = file.path().to_path_buf();
        self.track(file)?;
        Ok(path)
    }

    /// Release every tracked file in creation order
    ///
    /// A failed release does not stop the others; all failures are reported
    /// together. The run is inactive afterwards regardless.
    pub fn end_run(&mut self) -> Result<()> {
        self.active = false;
        let released = self.files.len();
        let failures = self.release_all();
        tracing::debug!(released, failed = failures.len(), "Test run ended");

        if failures.is_empty() {
            Ok(())
        } else {
            Err(TestkitError::Cleanup { failures })
        }
    }

    fn release_all(&mut self) -> Vec<CleanupFailure> {
        let mut failures = Vec::new();
        for file in self.files.drain(..) {
            let path = file.path().to_path_buf();
            if let Err(e) = file.release() {
                tracing::warn!(path = %path.display(), error = %e, "Failed to release temp file");
                failures.push(CleanupFailure {
                    path,
                    reason: e.to_string(),
                });
            }
        }
        failures
    }
}

impl Drop for TestRunState {
    fn drop(&mut self) {
        if self.active || !self.files.is_empty() {
            if let Err(err) = self.end_run() {
                tracing::warn!(error = %err, "Cleanup failed while dropping test run");
            }
        }
    }
}
