//! Shared setup for the integration suites.

/// Installs the test logger once per process; `RUST_LOG` controls verbosity.
pub fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}
