use rstest::fixture;

/// Install a test-writer subscriber. `RUST_LOG` overrides the default
/// `warn` level.
#[fixture]
pub fn tracing_setup() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
