//! Test harness helpers.

use std::sync::Once;

static INIT_LOGGING: Once = Once::new();

/// Route `tracing` output to the test writer.
///
/// Honours `RUST_LOG` and defaults to `hostlink_registry=debug`. Safe to call
/// from every test; only the first call installs the subscriber.
pub fn init_test_logging() {
    INIT_LOGGING.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("hostlink_registry=debug"));
        // Another harness may already own the global subscriber.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
        tracing::debug!("test logging initialized");
    });
}
