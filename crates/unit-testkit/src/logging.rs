//! Test logging bootstrap
//!
//! Installs a `tracing` fmt subscriber that writes through the libtest
//! capture so harness diagnostics only show up for failing tests.

use crate::config::TestkitConfig;
use tracing_subscriber::EnvFilter;

/// Install the test subscriber with the default filter
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_test_logging() {
    init_test_logging_with(&TestkitConfig::default());
}

/// Install the test subscriber, falling back to `config.log_filter` when
/// `RUST_LOG` is unset or unparsable
pub fn init_test_logging_with(config: &TestkitConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_filter.as_str()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_test_writer()
        .try_init();
}
