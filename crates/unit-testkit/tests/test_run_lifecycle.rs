#![allow(missing_docs)]
#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Run registry, retained temp file and sandbox integration tests

use std::path::PathBuf;
use tempfile::TempDir;
use unit_testkit::{
    init_test_logging, IsolatedEnvironment, RetainedTempFile, Sandbox, SandboxFactory,
    TestRunState, TestkitConfig, TestkitError, UnitTestContext,
};

fn scratch_config(dir: &TempDir) -> TestkitConfig {
    TestkitConfig::default().with_temp_dir(dir.path())
}

/// Path-only handout: nothing but the registry keeps the file alive
fn make_fixture(run: &mut TestRunState, contents: &str) -> PathBuf {
    run.temporary_file(Some(contents.as_bytes())).unwrap()
}

#[test]
fn hello_is_readable_immediately() {
    init_test_logging();
    let mut run = TestRunState::new();
    run.begin_run();

    let path = run.temporary_file(Some(b"hello")).unwrap();

    assert!(path.is_absolute());
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello");
    run.end_run().unwrap();
}

#[test]
fn default_files_land_in_host_temp_dir_with_prefix() {
    let mut run = TestRunState::new();
    run.begin_run();

    let path = run.temporary_file(None).unwrap();
    let name = path.file_name().unwrap().to_string_lossy().into_owned();

    assert!(name.starts_with(unit_testkit::DEFAULT_TEMP_PREFIX));
    run.end_run().unwrap();
    assert!(!path.exists());
}

#[test]
fn file_outlives_the_creating_scope() {
    let dir = TempDir::new().unwrap();
    let mut run = TestRunState::with_config(scratch_config(&dir));
    run.begin_run();

    let path = make_fixture(&mut run, "config.vm.box = \"precise64\"");

    assert!(path.exists());
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "config.vm.box = \"precise64\""
    );

    run.end_run().unwrap();
    assert!(!path.exists());
}

#[test]
fn one_failed_release_does_not_mask_the_others() {
    let dir = TempDir::new().unwrap();
    let mut run = TestRunState::with_config(scratch_config(&dir));
    run.begin_run();

    let paths: Vec<_> = ["one", "two", "three"]
        .into_iter()
        .map(|c| make_fixture(&mut run, c))
        .collect();
    std::fs::remove_file(&paths[1]).unwrap();

    let err = run.end_run().unwrap_err();

    let failures = match err {
        TestkitError::Cleanup { failures } => failures,
        other => panic!("expected cleanup failure, got {other}"),
    };
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].path, paths[1]);
    assert!(!paths[0].exists());
    assert!(!paths[2].exists());
}

#[test]
fn track_accepts_externally_created_files() {
    let dir = TempDir::new().unwrap();
    let config = scratch_config(&dir);
    let mut run = TestRunState::with_config(config.clone());
    run.begin_run();

    let file = RetainedTempFile::create(&config, Some(b"box metadata")).unwrap();
    let path = file.path().to_path_buf();
    run.track(file).unwrap();

    assert_eq!(run.tracked_paths().collect::<Vec<_>>(), vec![path.as_path()]);
    run.end_run().unwrap();
    assert!(!path.exists());
}

#[test]
fn runs_are_not_shared_between_tests() {
    let dir = TempDir::new().unwrap();
    let mut first = TestRunState::with_config(scratch_config(&dir));
    let mut second = TestRunState::with_config(scratch_config(&dir));
    first.begin_run();
    second.begin_run();

    let kept = make_fixture(&mut second, "kept");
    make_fixture(&mut first, "gone");
    first.end_run().unwrap();

    assert!(kept.exists());
    assert_eq!(second.len(), 1);
    second.end_run().unwrap();
}

#[test]
fn sandboxes_do_not_share_state() {
    let a = SandboxFactory::new_sandbox_with(|env: &mut IsolatedEnvironment| {
        env.write_file("Vagrantfile", "# a").unwrap();
    })
    .unwrap();
    let b: IsolatedEnvironment = SandboxFactory::new_sandbox().unwrap();

    assert!(a.root().join("Vagrantfile").exists());
    assert!(!b.root().join("Vagrantfile").exists());
}

#[derive(Debug, Default)]
struct CountingSandbox {
    setup_calls: usize,
    notes: Vec<String>,
}

impl Sandbox for CountingSandbox {
    fn create() -> unit_testkit::Result<Self> {
        Ok(Self::default())
    }
}

#[test]
fn custom_sandbox_setup_runs_once_per_instance() {
    let configured = SandboxFactory::new_sandbox_with(|s: &mut CountingSandbox| {
        s.setup_calls += 1;
        s.notes.push("configured".into());
    })
    .unwrap();
    let plain: CountingSandbox = SandboxFactory::new_sandbox().unwrap();

    assert_eq!(configured.setup_calls, 1);
    assert_eq!(configured.notes, vec!["configured".to_string()]);
    assert_eq!(plain.setup_calls, 0);
    assert!(plain.notes.is_empty());
}

#[test]
fn context_ties_everything_to_one_run() {
    let dir = TempDir::new().unwrap();
    let mut ctx = UnitTestContext::with_config(scratch_config(&dir));

    let env = ctx
        .isolated_environment_with(|env| {
            env.write_file("boxes/base/metadata.json", "{\"provider\":\"virtualbox\"}")
                .unwrap();
        })
        .unwrap();
    let first = ctx.temporary_file(Some(b"a")).unwrap();
    let second = ctx.temporary_file(None).unwrap();

    assert!(env.root().join("boxes/base/metadata.json").exists());
    assert_eq!(ctx.run().len(), 2);

    ctx.finish().unwrap();
    assert!(!first.exists());
    assert!(!second.exists());
}

#[test]
fn dropped_context_still_cleans_up() {
    let dir = TempDir::new().unwrap();
    let path = {
        let mut ctx = UnitTestContext::with_config(scratch_config(&dir));
        ctx.temporary_file(Some(b"transient")).unwrap()
    };
    assert!(!path.exists());
}
