// src/engine/listener.rs

//! Where the orchestrator reports a run.

use std::io::Write;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::engine::timing::Stopwatch;
use crate::exec::ExecutionLogs;
use crate::suite::{Assertion, TestSummary, TestUnit};
use crate::types::AssertionOutcome;

/// Receives the progress of a run, in order, from the orchestrator task.
pub trait ResultsListener: Send {
    /// The run's tracking id and its aggregate execution log. The log keeps
    /// growing while the run goes on.
    fn set_log_and_tracking_id(&mut self, tracking_id: &str, logs: ExecutionLogs);

    fn announce_total_tests(&mut self, total: usize);

    fn environment_started(&mut self, environment: &str);

    fn unit_started(&mut self, unit: &TestUnit, clock: &Stopwatch);

    fn output_chunk(&mut self, output: &str);

    /// `unit`, the unit the worker is on, checked an assertion.
    fn assertion_verified(&mut self, unit: &TestUnit, assertion: &Assertion);

    /// An exception was raised inside `unit`.
    fn exception_occurred(&mut self, unit: &TestUnit, detail: &str);

    fn unit_complete(&mut self, unit: &TestUnit, summary: &TestSummary, elapsed: Duration);

    fn run_complete(&mut self, total_elapsed: Duration);

    fn error_occurred(&mut self);
}

/// Listener used by the `suiterun` binary: one line per unit on the
/// writer, worker output passed through, a summary at the end.
pub struct ConsoleListener<W: Write + Send> {
    out: W,
    echo_output: bool,
    totals: TestSummary,
    announced: usize,
    completed: usize,
    failed_units: Vec<String>,
    logs: Option<ExecutionLogs>,
    errored: bool,
    finished: bool,
}

impl ConsoleListener<std::io::Stdout> {
    pub fn stdout(echo_output: bool) -> Self {
        Self::new(std::io::stdout(), echo_output)
    }
}

impl<W: Write + Send> ConsoleListener<W> {
    pub fn new(out: W, echo_output: bool) -> Self {
        Self {
            out,
            echo_output,
            totals: TestSummary::default(),
            announced: 0,
            completed: 0,
            failed_units: Vec::new(),
            logs: None,
            errored: false,
            finished: false,
        }
    }

    /// True when the run finished and every unit passed.
    pub fn is_success(&self) -> bool {
        self.finished && !self.errored && self.failed_units.is_empty()
    }

    pub fn totals(&self) -> TestSummary {
        self.totals
    }

    pub fn failed_units(&self) -> &[String] {
        &self.failed_units
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, line: String) {
        if let Err(e) = writeln!(self.out, "{line}") {
            warn!(error = %e, "failed to write run report");
        }
    }
}

impl<W: Write + Send> ResultsListener for ConsoleListener<W> {
    fn set_log_and_tracking_id(&mut self, tracking_id: &str, logs: ExecutionLogs) {
        info!(tracking_id, "run registered");
        self.logs = Some(logs);
    }

    fn announce_total_tests(&mut self, total: usize) {
        self.announced = total;
        self.emit(format!("running {total} units"));
    }

    fn environment_started(&mut self, environment: &str) {
        self.emit(format!("== {environment}"));
    }

    fn unit_started(&mut self, unit: &TestUnit, _clock: &Stopwatch) {
        info!(unit = %unit.name, "unit started");
    }

    fn output_chunk(&mut self, output: &str) {
        if self.echo_output {
            if let Err(e) = self.out.write_all(output.as_bytes()) {
                warn!(error = %e, "failed to echo worker output");
            }
        }
    }

    fn assertion_verified(&mut self, unit: &TestUnit, assertion: &Assertion) {
        match assertion.outcome {
            AssertionOutcome::Wrong => {
                self.emit(format!("        wrong in {}: {}", unit.name, assertion.description))
            }
            outcome => {
                debug!(unit = %unit.name, %outcome, description = %assertion.description, "assertion")
            }
        }
    }

    fn exception_occurred(&mut self, unit: &TestUnit, detail: &str) {
        self.emit(format!("        exception in {}: {detail}", unit.name));
    }

    fn unit_complete(&mut self, unit: &TestUnit, summary: &TestSummary, elapsed: Duration) {
        self.completed += 1;
        self.totals.add(summary);

        let verdict = if summary.is_passing() { "ok" } else { "FAILED" };
        if !summary.is_passing() {
            self.failed_units.push(unit.name.clone());
        }

        self.emit(format!(
            "{verdict:>6} {} ({summary}) in {}ms",
            unit.name,
            elapsed.as_millis()
        ));
    }

    fn run_complete(&mut self, total_elapsed: Duration) {
        self.finished = true;

        let worker_faults = self.logs.as_ref().is_some_and(ExecutionLogs::has_exceptions);
        self.emit(format!(
            "{} of {} units completed in {}ms: {}",
            self.completed,
            self.announced,
            total_elapsed.as_millis(),
            self.totals
        ));
        if worker_faults {
            self.emit("some environments reported errors; see the log".to_string());
        }
    }

    fn error_occurred(&mut self) {
        self.errored = true;
        self.emit("run aborted by an error".to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suite::EnvironmentDescriptor;

    fn unit(name: &str) -> TestUnit {
        TestUnit::new(name, name, EnvironmentDescriptor::new("k", "w"))
    }

    fn report(listener: ConsoleListener<Vec<u8>>) -> String {
        String::from_utf8(listener.into_inner()).unwrap()
    }

    #[test]
    fn reports_units_and_summary() {
        let mut listener = ConsoleListener::new(Vec::new(), false);
        listener.announce_total_tests(2);
        listener.unit_complete(&unit("a"), &TestSummary::new(2, 0, 0, 0), Duration::from_millis(3));
        listener.unit_complete(&unit("b"), &TestSummary::new(0, 1, 0, 0), Duration::from_millis(4));
        listener.run_complete(Duration::from_millis(10));

        assert!(!listener.is_success());
        assert_eq!(listener.failed_units(), ["b".to_string()]);
        assert_eq!(listener.totals(), TestSummary::new(2, 1, 0, 0));

        let text = report(listener);
        assert!(text.contains("running 2 units"));
        assert!(text.contains("ok a"));
        assert!(text.contains("FAILED b"));
        assert!(text.contains("2 of 2 units completed"));
    }

    #[test]
    fn echoes_output_only_when_asked() {
        let mut quiet = ConsoleListener::new(Vec::new(), false);
        quiet.output_chunk("hello\n");
        assert!(report(quiet).is_empty());

        let mut loud = ConsoleListener::new(Vec::new(), true);
        loud.output_chunk("hello\n");
        assert_eq!(report(loud), "hello\n");
    }

    #[test]
    fn reports_wrong_assertions_and_exceptions_only() {
        let mut listener = ConsoleListener::new(Vec::new(), false);
        let a = unit("a");
        listener.assertion_verified(&a, &Assertion::new(AssertionOutcome::Right, "x is 1"));
        listener.assertion_verified(&a, &Assertion::new(AssertionOutcome::Ignore, "skipped"));
        listener.assertion_verified(&a, &Assertion::new(AssertionOutcome::Wrong, "y is 2"));
        listener.exception_occurred(&a, "boom");

        let text = report(listener);
        assert_eq!(text, "        wrong in a: y is 2\n        exception in a: boom\n");
    }

    #[test]
    fn huge_worker_counts_do_not_overflow_totals() {
        let mut listener = ConsoleListener::new(Vec::new(), false);
        listener.unit_complete(&unit("a"), &TestSummary::new(u32::MAX, 0, 0, 0), Duration::ZERO);
        listener.unit_complete(&unit("b"), &TestSummary::new(1, 0, 0, 0), Duration::ZERO);
        assert_eq!(listener.totals(), TestSummary::new(u32::MAX, 0, 0, 0));
    }

    #[test]
    fn aborted_run_is_not_a_success() {
        let mut listener = ConsoleListener::new(Vec::new(), false);
        listener.error_occurred();
        assert!(!listener.is_success());
    }
}
