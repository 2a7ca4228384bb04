use std::sync::{Arc, Mutex};
use std::time::Duration;

use suiterun::engine::{ResultsListener, Stopwatch};
use suiterun::exec::ExecutionLogs;
use suiterun::suite::{Assertion, TestSummary, TestUnit};

/// One listener call, in the order the orchestrator made it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerEvent {
    TrackingId(String),
    Announced(usize),
    EnvironmentStarted(String),
    UnitStarted(String),
    Output(String),
    Assertion {
        unit: String,
        assertion: Assertion,
    },
    Exception {
        unit: String,
        detail: String,
    },
    UnitComplete {
        unit: String,
        summary: TestSummary,
        elapsed: Duration,
    },
    RunComplete(Duration),
    ErrorOccurred,
}

/// Listener that records every call. Clones share the record, so a test
/// can keep one clone while the orchestrator owns the other.
#[derive(Debug, Clone, Default)]
pub struct RecordingListener {
    events: Arc<Mutex<Vec<ListenerEvent>>>,
    logs: Arc<Mutex<Option<ExecutionLogs>>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ListenerEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn logs(&self) -> Option<ExecutionLogs> {
        self.logs.lock().unwrap().clone()
    }

    pub fn started_units(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ListenerEvent::UnitStarted(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    pub fn completed_units(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ListenerEvent::UnitComplete { unit, .. } => Some(unit),
                _ => None,
            })
            .collect()
    }

    /// Assertions as `(unit, assertion)`, in the order they were reported.
    pub fn assertions(&self) -> Vec<(String, Assertion)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ListenerEvent::Assertion { unit, assertion } => Some((unit, assertion)),
                _ => None,
            })
            .collect()
    }

    pub fn unit_elapsed(&self) -> Vec<Duration> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ListenerEvent::UnitComplete { elapsed, .. } => Some(elapsed),
                _ => None,
            })
            .collect()
    }

    pub fn announced(&self) -> Option<usize> {
        self.events().into_iter().find_map(|e| match e {
            ListenerEvent::Announced(n) => Some(n),
            _ => None,
        })
    }

    pub fn run_complete(&self) -> Option<Duration> {
        self.events().into_iter().find_map(|e| match e {
            ListenerEvent::RunComplete(total) => Some(total),
            _ => None,
        })
    }

    pub fn error_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, ListenerEvent::ErrorOccurred))
            .count()
    }

    fn push(&self, event: ListenerEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl ResultsListener for RecordingListener {
    fn set_log_and_tracking_id(&mut self, tracking_id: &str, logs: ExecutionLogs) {
        *self.logs.lock().unwrap() = Some(logs);
        self.push(ListenerEvent::TrackingId(tracking_id.to_string()));
    }

    fn announce_total_tests(&mut self, total: usize) {
        self.push(ListenerEvent::Announced(total));
    }

    fn environment_started(&mut self, environment: &str) {
        self.push(ListenerEvent::EnvironmentStarted(environment.to_string()));
    }

    fn unit_started(&mut self, unit: &TestUnit, _clock: &Stopwatch) {
        self.push(ListenerEvent::UnitStarted(unit.name.clone()));
    }

    fn output_chunk(&mut self, output: &str) {
        self.push(ListenerEvent::Output(output.to_string()));
    }

    fn assertion_verified(&mut self, unit: &TestUnit, assertion: &Assertion) {
        self.push(ListenerEvent::Assertion {
            unit: unit.name.clone(),
            assertion: assertion.clone(),
        });
    }

    fn exception_occurred(&mut self, unit: &TestUnit, detail: &str) {
        self.push(ListenerEvent::Exception {
            unit: unit.name.clone(),
            detail: detail.to_string(),
        });
    }

    fn unit_complete(&mut self, unit: &TestUnit, summary: &TestSummary, elapsed: Duration) {
        self.push(ListenerEvent::UnitComplete {
            unit: unit.name.clone(),
            summary: *summary,
            elapsed,
        });
    }

    fn run_complete(&mut self, total_elapsed: Duration) {
        self.push(ListenerEvent::RunComplete(total_elapsed));
    }

    fn error_occurred(&mut self) {
        self.push(ListenerEvent::ErrorOccurred);
    }
}
