//! Shared helpers for the crate's tests.
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

/// Install a fmt subscriber once per test binary; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("cloister=debug".parse().unwrap())
                .add_directive("test=debug".parse().unwrap()),
        )
        .with_span_events(FmtSpan::CLOSE)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_target(false)
        .with_test_writer()
        .try_init();
}
