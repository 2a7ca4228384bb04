mod common;
use crate::common::builders::{setup, teardown, unit};
use crate::common::{
    env_name, init_tracing, run_units, with_timeout, FakeBehaviour, FakeLauncher, ListenerEvent,
    RecordingListener,
};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use suiterun::engine::{InMemoryRunTracker, Orchestrator, RunOptions};
use suiterun::suite::{
    Assertion, FixtureSurrounder, NoopSurrounder, Surrounder, TestSummary, TestUnit,
};
use suiterun::types::AssertionOutcome;

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn three_units_in_one_environment_report_in_order() {
    init_tracing();

    let launcher = FakeLauncher::new();
    let record = launcher.record();
    let units = vec![unit("a", "slim"), unit("b", "slim"), unit("c", "slim")];

    let listener = run_units(launcher, NoopSurrounder, units, RunOptions::default()).await;

    let env = env_name("slim");
    let mut expected = vec![
        ListenerEvent::TrackingId("0".to_string()),
        ListenerEvent::Announced(3),
        ListenerEvent::EnvironmentStarted(env.clone()),
    ];
    for name in ["a", "b", "c"] {
        expected.push(ListenerEvent::UnitStarted(name.to_string()));
        expected.push(ListenerEvent::Output(format!("running {name}\n")));
    }

    let events = listener.events();
    // Completion events carry measured times; compare everything else.
    let without_times: Vec<ListenerEvent> = events
        .iter()
        .filter(|e| {
            !matches!(e, ListenerEvent::UnitComplete { .. } | ListenerEvent::RunComplete(_))
        })
        .cloned()
        .collect();
    assert_eq!(without_times, expected);

    assert_eq!(listener.completed_units(), names(&["a", "b", "c"]));
    assert!(matches!(events.last(), Some(ListenerEvent::RunComplete(_))));
    assert_eq!(listener.error_count(), 0);

    let record = record.lock().unwrap();
    assert_eq!(record.launched, vec![env.clone()]);
    assert_eq!(record.submitted, names(&["a", "b", "c"]));
    assert_eq!(record.ended, vec![env]);
    assert!(record.killed.is_empty());
}

#[tokio::test]
async fn each_unit_starts_before_it_completes() {
    init_tracing();

    let units = vec![unit("a", "slim"), unit("b", "slim")];
    let listener = run_units(FakeLauncher::new(), NoopSurrounder, units, RunOptions::default()).await;

    let mut open: Option<String> = None;
    for event in listener.events() {
        match event {
            ListenerEvent::UnitStarted(name) => {
                assert!(open.is_none(), "{name} started while another unit was running");
                open = Some(name);
            }
            ListenerEvent::UnitComplete { unit, .. } => {
                assert_eq!(open.take(), Some(unit));
            }
            _ => {}
        }
    }
    assert!(open.is_none());
}

#[tokio::test]
async fn environments_run_in_first_seen_order() {
    init_tracing();

    let launcher = FakeLauncher::new();
    let record = launcher.record();
    let units = vec![unit("a", "x"), unit("b", "y"), unit("c", "x")];

    let listener = run_units(launcher, NoopSurrounder, units, RunOptions::default()).await;

    assert_eq!(listener.completed_units(), names(&["a", "c", "b"]));
    assert_eq!(
        record.lock().unwrap().launched,
        vec![env_name("x"), env_name("y")]
    );
}

#[tokio::test]
async fn environment_failing_to_start_skips_only_its_units() {
    init_tracing();

    let launcher = FakeLauncher::new().with_behaviour("x", FakeBehaviour::FailToStart);
    let record = launcher.record();
    let units = vec![unit("a", "x"), unit("b", "y")];

    let listener = run_units(launcher, NoopSurrounder, units, RunOptions::default()).await;

    assert_eq!(listener.announced(), Some(2));
    assert_eq!(listener.started_units(), names(&["b"]));
    assert_eq!(listener.completed_units(), names(&["b"]));
    assert_eq!(listener.error_count(), 0);
    assert!(listener.run_complete().is_some());

    let started: Vec<ListenerEvent> = listener
        .events()
        .into_iter()
        .filter(|e| matches!(e, ListenerEvent::EnvironmentStarted(_)))
        .collect();
    assert_eq!(started, vec![ListenerEvent::EnvironmentStarted(env_name("y"))]);

    let logs = listener.logs().expect("logs handed to listener");
    let failed = logs.get(&env_name("x")).expect("start failure is logged");
    assert!(failed.has_exceptions());

    assert_eq!(record.lock().unwrap().submitted, names(&["b"]));
}

#[derive(Default)]
struct CountingSurrounder {
    calls: Arc<AtomicUsize>,
}

impl Surrounder for CountingSurrounder {
    fn surround(&self, units: Vec<TestUnit>) -> Vec<TestUnit> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        units
    }
}

#[tokio::test]
async fn empty_unit_list_starts_nothing() {
    init_tracing();

    let launcher = FakeLauncher::new();
    let record = launcher.record();
    let surrounder = CountingSurrounder::default();
    let calls = Arc::clone(&surrounder.calls);

    let listener = run_units(launcher, surrounder, Vec::new(), RunOptions::default()).await;

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(listener.announced(), Some(0));
    assert!(listener.run_complete().is_some());
    assert!(record.lock().unwrap().launched.is_empty());
}

#[tokio::test]
async fn fixtures_are_spliced_in_but_not_counted() {
    init_tracing();

    let units = vec![
        setup("Up", "slim"),
        unit("a", "slim").with_setup("Up").with_teardown("Down"),
        unit("b", "slim").with_setup("Up").with_teardown("Down"),
        unit("c", "slim"),
        teardown("Down", "slim"),
    ];
    let surrounder = FixtureSurrounder::from_units(&units);

    let listener = run_units(FakeLauncher::new(), surrounder, units, RunOptions::default()).await;

    assert_eq!(listener.announced(), Some(3));
    assert_eq!(
        listener.completed_units(),
        names(&["Up", "a", "b", "Down", "c"])
    );
}

#[tokio::test]
async fn silent_unit_is_started_right_before_it_completes() {
    init_tracing();

    let launcher =
        FakeLauncher::new().with_behaviour("slim", FakeBehaviour::Silent(TestSummary::new(2, 0, 0, 0)));
    let units = vec![unit("a", "slim"), unit("b", "slim")];

    let listener = run_units(launcher, NoopSurrounder, units, RunOptions::default()).await;

    let per_unit: Vec<ListenerEvent> = listener
        .events()
        .into_iter()
        .filter(|e| {
            matches!(e, ListenerEvent::UnitStarted(_) | ListenerEvent::UnitComplete { .. })
        })
        .collect();

    assert_eq!(per_unit.len(), 4);
    assert_eq!(per_unit[0], ListenerEvent::UnitStarted("a".to_string()));
    assert!(matches!(&per_unit[1], ListenerEvent::UnitComplete { unit, summary, .. }
        if unit == "a" && *summary == TestSummary::new(2, 0, 0, 0)));
    assert_eq!(per_unit[2], ListenerEvent::UnitStarted("b".to_string()));
}

#[tokio::test]
async fn total_elapsed_covers_every_unit() {
    init_tracing();

    let launcher = FakeLauncher::new().with_unit_delay(Duration::from_millis(10));
    let units = vec![unit("a", "slim"), unit("b", "slim"), unit("c", "slim")];

    let listener = run_units(launcher, NoopSurrounder, units, RunOptions::default()).await;

    let total = listener.run_complete().expect("run completed");
    let sum: Duration = listener.unit_elapsed().into_iter().sum();
    assert!(total >= sum, "total {total:?} < sum of units {sum:?}");
    assert!(total >= Duration::from_millis(30));
}

#[tokio::test]
async fn worker_fault_aborts_the_run() {
    init_tracing();

    let launcher = FakeLauncher::new().with_behaviour(
        "slim",
        FakeBehaviour::Fault {
            after: 1,
            cause: "worker crashed".to_string(),
        },
    );
    let record = launcher.record();
    let units = vec![
        unit("a", "slim"),
        unit("b", "slim"),
        unit("c", "slim"),
        unit("d", "other"),
    ];

    let listener = run_units(launcher, NoopSurrounder, units, RunOptions::default()).await;

    assert_eq!(listener.error_count(), 1);
    assert!(listener.run_complete().is_none());
    assert_eq!(listener.completed_units(), names(&["a"]));
    assert_eq!(record.lock().unwrap().launched, vec![env_name("slim")]);

    let logs = listener.logs().expect("logs handed to listener");
    let log = logs.get(&env_name("slim")).expect("worker logged its fault");
    assert_eq!(log.exceptions, vec!["worker crashed".to_string()]);
}

#[tokio::test]
async fn completion_without_pending_unit_aborts_the_run() {
    init_tracing();

    let launcher = FakeLauncher::new().with_behaviour("slim", FakeBehaviour::ExtraCompletion);
    let listener = run_units(
        launcher,
        NoopSurrounder,
        vec![unit("a", "slim")],
        RunOptions::default(),
    )
    .await;

    assert_eq!(listener.completed_units(), names(&["a"]));
    assert_eq!(listener.error_count(), 1);
    assert!(listener.run_complete().is_none());
}

#[tokio::test]
async fn assertions_are_forwarded_between_start_and_completion() {
    init_tracing();

    let launcher = FakeLauncher::new().with_behaviour(
        "slim",
        FakeBehaviour::Checks(vec![AssertionOutcome::Right, AssertionOutcome::Wrong]),
    );
    let units = vec![unit("a", "slim"), unit("b", "slim")];

    let listener = run_units(launcher, NoopSurrounder, units, RunOptions::default()).await;

    assert_eq!(listener.error_count(), 0);
    assert_eq!(
        listener.assertions(),
        vec![
            ("a".to_string(), Assertion::new(AssertionOutcome::Right, "a check 0")),
            ("a".to_string(), Assertion::new(AssertionOutcome::Wrong, "a check 1")),
            ("b".to_string(), Assertion::new(AssertionOutcome::Right, "b check 0")),
            ("b".to_string(), Assertion::new(AssertionOutcome::Wrong, "b check 1")),
        ]
    );

    let per_unit: Vec<String> = listener
        .events()
        .into_iter()
        .filter_map(|e| match e {
            ListenerEvent::UnitStarted(name) => Some(format!("start {name}")),
            ListenerEvent::Output(_) => Some("output".to_string()),
            ListenerEvent::Assertion { assertion, .. } => Some(assertion.description),
            ListenerEvent::UnitComplete { unit, summary, .. } => {
                Some(format!("complete {unit} ({summary})"))
            }
            _ => None,
        })
        .collect();
    assert_eq!(
        per_unit,
        vec![
            "start a",
            "output",
            "a check 0",
            "a check 1",
            "complete a (1 right, 1 wrong, 0 ignored, 0 exceptions)",
            "start b",
            "output",
            "b check 0",
            "b check 1",
            "complete b (1 right, 1 wrong, 0 ignored, 0 exceptions)",
        ]
    );
}

#[tokio::test]
async fn exceptions_are_reported_against_their_unit() {
    init_tracing();

    let launcher =
        FakeLauncher::new().with_behaviour("slim", FakeBehaviour::Raise("division by zero".to_string()));
    let listener = run_units(
        launcher,
        NoopSurrounder,
        vec![unit("a", "slim")],
        RunOptions::default(),
    )
    .await;

    let events = listener.events();
    let raised = events
        .iter()
        .position(|e| {
            *e == ListenerEvent::Exception {
                unit: "a".to_string(),
                detail: "division by zero".to_string(),
            }
        })
        .expect("exception forwarded");
    let completed = events
        .iter()
        .position(|e| matches!(e, ListenerEvent::UnitComplete { .. }))
        .expect("unit completed");
    assert!(raised < completed);
    assert!(listener.run_complete().is_some());
}

#[tokio::test]
async fn assertion_with_no_unit_pending_aborts_the_run() {
    init_tracing();

    let launcher = FakeLauncher::new().with_behaviour("slim", FakeBehaviour::AssertionAfterCompletion);
    let listener = run_units(
        launcher,
        NoopSurrounder,
        vec![unit("a", "slim")],
        RunOptions::default(),
    )
    .await;

    assert_eq!(listener.completed_units(), names(&["a"]));
    assert!(listener.assertions().is_empty());
    assert_eq!(listener.error_count(), 1);
    assert!(listener.run_complete().is_none());
}

#[tokio::test]
async fn debug_option_forces_debug_environments() {
    init_tracing();

    let launcher = FakeLauncher::new();
    let record = launcher.record();
    let options = RunOptions {
        debug: true,
        ..RunOptions::default()
    };

    run_units(launcher, NoopSurrounder, vec![unit("a", "slim")], options).await;

    let launched = record.lock().unwrap().launched.clone();
    assert_eq!(launched, vec![debug_env_name("slim")]);
}

fn debug_env_name(kind: &str) -> String {
    crate::common::builders::env(kind).with_debug(true).name()
}

#[tokio::test]
async fn run_is_tracked_while_it_runs_only() {
    init_tracing();

    let tracker = Arc::new(InMemoryRunTracker::new());
    let listener = RecordingListener::new();
    let orchestrator = Orchestrator::new(
        FakeLauncher::new(),
        NoopSurrounder,
        listener.clone(),
        tracker.clone(),
        RunOptions::default(),
    );

    with_timeout(orchestrator.run(vec![unit("a", "slim")])).await;

    assert_eq!(listener.events()[0], ListenerEvent::TrackingId("0".to_string()));
    assert!(tracker.running_ids().is_empty());
}
