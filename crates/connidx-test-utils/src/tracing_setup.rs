//! Tracing initialisation helpers for tests.
//!
//! The subscriber is installed at most once per process; later calls are
//! ignored, so every test may call these freely.

use tracing_subscriber::EnvFilter;

/// Default directives: indexer internals at debug, everything else at info.
pub const DEFAULT_TEST_FILTER: &str = "info,connidx_core=debug";

/// Install a test-writer subscriber honouring `RUST_LOG`, falling back to
/// [`DEFAULT_TEST_FILTER`].
///
/// ```ignore
/// #[tokio::test]
/// async fn my_test() {
///     connidx_test_utils::tracing_setup::init_test_tracing();
///     tracing::info!("visible when RUST_LOG=info");
/// }
/// ```
pub fn init_test_tracing() {
    init_test_tracing_with(DEFAULT_TEST_FILTER);
}

/// Like [`init_test_tracing`] with explicit fallback directives.
pub fn init_test_tracing_with(directives: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives)),
        )
        .with_test_writer()
        .try_init();
}
