//! Retained temporary files
//!
//! `tempfile` removes a `NamedTempFile` as soon as it is dropped. Fixture
//! files need to outlive the helper that created them, so the file is kept
//! on creation and removal happens only through [`RetainedTempFile::release`],
//! which the run registry calls at teardown.

use crate::config::TestkitConfig;
use crate::error::{Result, TestkitError};
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// A temp file whose lifetime is owned by the test run
#[derive(Debug)]
pub struct RetainedTempFile {
    file: File,
    path: PathBuf,
    len: u64,
}

impl RetainedTempFile {
    /// Create a new uniquely named temp file, optionally seeded with `contents`
    ///
    /// Contents are flushed and synced before this returns, so the returned
    /// path can be opened and read immediately.
    pub fn create(config: &TestkitConfig, contents: Option<&[u8]>) -> Result<Self> {
        let dir = config.resolved_temp_dir();

        let mut builder = tempfile::Builder::new();
        builder.prefix(&config.temp_prefix);
        if let Some(suffix) = &config.temp_suffix {
            builder.suffix(suffix);
        }

        let named = builder.tempfile_in(&dir).map_err(|e| {
            TestkitError::from_io(&e, format!("create temp file in {}", dir.display()))
        })?;

        let (mut file, path) = named.keep().map_err(|e| {
            TestkitError::from_io(&e.error, format!("retain temp file in {}", dir.display()))
        })?;

        let path = match absolute(path) {
            Ok(path) => path,
            Err((path, e)) => {
                let _ = std::fs::remove_file(&path);
                return Err(TestkitError::from_io(&e, "resolve temp file path"));
            }
        };

        let mut len = 0;
        if let Some(contents) = contents {
            if let Err(e) = write_synced(&mut file, contents) {
                drop(file);
                let _ = std::fs::remove_file(&path);
                return Err(TestkitError::from_io(
                    &e,
                    format!("write temp file {}", path.display()),
                ));
            }
            len = contents.len() as u64;
        }

        tracing::debug!(path = %path.display(), bytes = len, "Created retained temp file");
        Ok(Self { file, path, len })
    }

    /// Absolute path of the file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of bytes written at creation
    pub fn initial_len(&self) -> u64 {
        self.len
    }

    /// Close the handle and unlink the file
    pub fn release(self) -> io::Result<()> {
        let Self { file, path, .. } = self;
        // Windows refuses to unlink files with open handles.
        drop(file);
        std::fs::remove_file(&path)?;
        tracing::debug!(path = %path.display(), "Released retained temp file");
        Ok(())
    }
}

fn write_synced(file: &mut File, contents: &[u8]) -> io::Result<()> {
    file.write_all(contents)?;
    file.flush()?;
    file.sync_all()
}

fn absolute(path: PathBuf) -> std::result::Result<PathBuf, (PathBuf, io::Error)> {
    if path.is_absolute() {
        return Ok(path);
    }
    match std::env::current_dir() {
        Ok(cwd) => Ok(cwd.join(path)),
        Err(e) => Err((path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> TestkitConfig {
        TestkitConfig::default().with_temp_dir(dir.path())
    }

    #[test]
    fn contents_are_visible_immediately() {
        let dir = TempDir::new().unwrap();
        let file = RetainedTempFile::create(&config_in(&dir), Some(b"hello")).unwrap();

        assert!(file.path().is_absolute());
        assert_eq!(std::fs::read(file.path()).unwrap(), b"hello");
        assert_eq!(file.initial_len(), 5);
        file.release().unwrap();
    }

    #[test]
    fn empty_file_without_contents() {
        let dir = TempDir::new().unwrap();
        let file = RetainedTempFile::create(&config_in(&dir), None).unwrap();

        assert_eq!(std::fs::metadata(file.path()).unwrap().len(), 0);
        file.release().unwrap();
    }

    #[test]
    fn name_uses_prefix_and_suffix() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir).with_temp_suffix(".rb");
        let file = RetainedTempFile::create(&config, None).unwrap();

        let name = file.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("vagrant-unit"), "unexpected name {name}");
        assert!(name.ends_with(".rb"), "unexpected name {name}");
        assert_eq!(file.path().parent(), Some(dir.path()));
        file.release().unwrap();
    }

    #[test]
    fn names_are_unique() {
        let dir = TempDir::new().unwrap();
        let a = RetainedTempFile::create(&config_in(&dir), None).unwrap();
        let b = RetainedTempFile::create(&config_in(&dir), None).unwrap();
        assert_ne!(a.path(), b.path());
        a.release().unwrap();
        b.release().unwrap();
    }

    #[test]
    fn release_removes_the_file() {
        let dir = TempDir::new().unwrap();
        let file = RetainedTempFile::create(&config_in(&dir), Some(b"x")).unwrap();
        let path = file.path().to_path_buf();

        file.release().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn release_of_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let file = RetainedTempFile::create(&config_in(&dir), None).unwrap();
        std::fs::remove_file(file.path()).unwrap();

        let err = file.release().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn missing_directory_is_not_retried() {
        let dir = TempDir::new().unwrap();
        let config = TestkitConfig::default().with_temp_dir(dir.path().join("missing"));

        let err = RetainedTempFile::create(&config, Some(b"x")).unwrap_err();
        assert!(matches!(err, TestkitError::Io { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn unwritable_directory_is_permission_denied() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let locked = dir.path().join("locked");
        std::fs::create_dir(&locked).unwrap();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o500)).unwrap();

        let config = TestkitConfig::default().with_temp_dir(&locked);
        let result = RetainedTempFile::create(&config, None);

        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o700)).unwrap();
        // Root ignores directory permissions.
        if let Err(err) = result {
            assert!(err.is_permission_denied(), "unexpected error {err}");
        }
    }
}
