pub mod builders;
pub mod fake_launcher;
pub mod recording_listener;

use std::sync::Once;
use std::time::Duration;

use suiterun::logging::LOG_ENV;
use tracing_subscriber::{fmt, EnvFilter};

static INIT: Once = Once::new();

/// Initialise tracing once per test binary, output captured per test.
///
/// Takes directives from `SUITERUN_LOG` (same syntax as the binary), then
/// `RUST_LOG`, else `info`:
/// `SUITERUN_LOG=suiterun::engine=trace cargo test -- --nocapture`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV)
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Budget for any single orchestrated run in tests.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Run a future under [`TEST_TIMEOUT`], failing the test when it hangs.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(TEST_TIMEOUT, f)
        .await
        .expect("test timed out; a run or worker did not finish")
}
