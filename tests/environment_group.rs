mod common;
use crate::common::builders::{env, unit};
use crate::common::{init_tracing, with_timeout, FakeLauncher};

use std::time::Duration;

use tokio::sync::mpsc;
use suiterun::engine::EnvironmentEvent;
use suiterun::exec::{EnvironmentGroup, ExecutionLogs, HandleState};

fn stopped(environment: &str) -> EnvironmentEvent {
    EnvironmentEvent::Stopped {
        environment: environment.to_string(),
        cause: None,
    }
}

#[tokio::test]
async fn force_terminate_kills_only_that_environment() {
    init_tracing();

    let launcher = FakeLauncher::new();
    let record = launcher.record();
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let group = EnvironmentGroup::new(launcher, events_tx, ExecutionLogs::new(), Duration::from_secs(1));
    let registry = group.registry();

    let mut first = group.start_environment(&env("slim")).await.unwrap();
    let second = group.start_environment(&env("fit")).await.unwrap();
    assert_eq!(registry.active(), vec![first.name().to_string(), second.name().to_string()]);

    assert!(first.force_terminate());
    assert!(!first.force_terminate(), "second kill delivers nothing");

    let event = with_timeout(events_rx.recv()).await;
    assert_eq!(event, Some(stopped(first.name())));
    assert_eq!(first.state(), HandleState::Terminated);
    assert!(first.submit(unit("late", "slim")).await.is_err());

    assert_eq!(registry.active(), vec![second.name().to_string()]);
    assert!(!registry.is_closed());
    assert_eq!(second.state(), HandleState::Ready);
    assert_eq!(record.lock().unwrap().killed, vec![first.name().to_string()]);
}

#[tokio::test]
async fn group_kill_all_is_idempotent_and_kills_late_starts() {
    init_tracing();

    let launcher = FakeLauncher::new();
    let record = launcher.record();
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let group = EnvironmentGroup::new(launcher, events_tx, ExecutionLogs::new(), Duration::from_secs(1));

    let a = group.start_environment(&env("slim")).await.unwrap();
    let b = group.start_environment(&env("fit")).await.unwrap();

    assert_eq!(group.kill_all(), 2);
    assert_eq!(group.kill_all(), 0);

    let late = group.start_environment(&env("late")).await.unwrap();

    let mut stopped_names = Vec::new();
    for _ in 0..3 {
        match with_timeout(events_rx.recv()).await {
            Some(EnvironmentEvent::Stopped { environment, cause: None }) => {
                stopped_names.push(environment)
            }
            other => panic!("expected a clean stop, got {other:?}"),
        }
    }
    stopped_names.sort();

    let mut expected = vec![a.name().to_string(), b.name().to_string(), late.name().to_string()];
    expected.sort();
    assert_eq!(stopped_names, expected);

    for environment in [&a, &b, &late] {
        assert_eq!(environment.state(), HandleState::Terminated);
    }
    assert!(group.registry().active().is_empty());

    let mut killed = record.lock().unwrap().killed.clone();
    killed.sort();
    assert_eq!(killed, expected);
}
