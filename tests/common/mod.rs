#![allow(dead_code)]

use std::sync::Arc;

use suiterun::engine::{InMemoryRunTracker, Orchestrator, RunOptions};
use suiterun::exec::EnvironmentLauncher;
use suiterun::suite::{Surrounder, TestUnit};

pub use suiterun_test_utils::builders;
pub use suiterun_test_utils::fake_launcher::{FakeBehaviour, FakeLauncher, FakeRecord};
pub use suiterun_test_utils::recording_listener::{ListenerEvent, RecordingListener};
pub use suiterun_test_utils::{init_tracing, with_timeout};

/// Run `units` to the end and return the listener that saw it.
pub async fn run_units<L: EnvironmentLauncher + 'static>(
    launcher: L,
    surrounder: impl Surrounder + 'static,
    units: Vec<TestUnit>,
    options: RunOptions,
) -> RecordingListener {
    let listener = RecordingListener::new();
    let orchestrator = Orchestrator::new(
        launcher,
        surrounder,
        listener.clone(),
        Arc::new(InMemoryRunTracker::new()),
        options,
    );
    with_timeout(orchestrator.run(units)).await;
    listener
}

/// Environment name the fake builders' descriptor of `kind` reports under.
pub fn env_name(kind: &str) -> String {
    builders::env(kind).name()
}
