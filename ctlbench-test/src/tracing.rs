//! Logging setup for tests.

use tracing_subscriber::EnvFilter;

/// Crates whose events are captured at every level.
const CRATE_NAMES: &[&str] = &["ctlbench_scenario", "ctlbench_runner", "ctlbench_test"];

/// Initialize the logger for testing.
///
/// Events are written to the output captured by the test runner, so they only show up for
/// failing tests or with `--nocapture`. Unless `RUST_LOG` says otherwise, only errors from
/// dependencies are shown, while the ctlbench crates log everything down to `TRACE`.
///
/// Calling this more than once is harmless.
///
/// # Example
///
/// ```
/// ctlbench_test::tracing::init();
/// ```
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        CRATE_NAMES
            .iter()
            .fold(EnvFilter::new("ERROR"), |filter, name| {
                filter.add_directive(format!("{name}=TRACE").parse().unwrap())
            })
    });

    tracing_subscriber::fmt::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_test_writer()
        .compact()
        .try_init()
        .ok();
}
