// src/exec/protocol.rs

//! Line protocol spoken with worker processes.
//!
//! To the worker (stdin):
//! - `RUN\t<name>\t<source>` once per submitted unit
//! - `BYE` after the last unit
//!
//! From the worker (stdout):
//! - `@@complete <right> <wrong> <ignores> <exceptions>` ends the oldest
//!   unit that has not completed yet
//! - `@@assert <right|wrong|ignore> <description>` reports one checked
//!   assertion of the unit currently running
//! - `@@exception <description>` reports an exception raised inside the
//!   unit currently running
//! - anything else is output of the unit currently running
//!
//! A marker only counts when it is followed by whitespace or the end of
//! the line, so `@@completed 3 checks` is plain output.

use crate::errors::{Result, SuiterunError};
use crate::suite::{Assertion, TestSummary, TestUnit};
use crate::types::AssertionOutcome;

pub const COMPLETE_MARKER: &str = "@@complete";
pub const ASSERT_MARKER: &str = "@@assert";
pub const EXCEPTION_MARKER: &str = "@@exception";
pub const BYE: &str = "BYE\n";

/// One line received from a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerLine {
    Output(String),
    Complete(TestSummary),
    Assertion(Assertion),
    Exception(String),
}

/// Encode the submission of `unit`. Tabs and newlines inside fields are
/// replaced by spaces so one unit always stays on one line.
pub fn encode_run(unit: &TestUnit) -> String {
    format!("RUN\t{}\t{}\n", sanitize(&unit.name), sanitize(&unit.source))
}

fn sanitize(field: &str) -> String {
    field.replace(['\t', '\n', '\r'], " ")
}

/// Parse one stdout line (without its line terminator).
pub fn parse_line(line: &str) -> Result<WorkerLine> {
    if let Some(rest) = strip_marker(line, COMPLETE_MARKER) {
        return parse_completion(line, rest);
    }
    if let Some(rest) = strip_marker(line, ASSERT_MARKER) {
        return parse_assertion(line, rest);
    }
    if let Some(rest) = strip_marker(line, EXCEPTION_MARKER) {
        return Ok(WorkerLine::Exception(rest.trim().to_string()));
    }
    Ok(WorkerLine::Output(format!("{line}\n")))
}

fn strip_marker<'a>(line: &'a str, marker: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(marker)?;
    (rest.is_empty() || rest.starts_with(char::is_whitespace)).then_some(rest)
}

fn parse_completion(line: &str, rest: &str) -> Result<WorkerLine> {
    let counts: Vec<u32> = rest
        .split_whitespace()
        .map(str::parse)
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| malformed("completion", line, &format!("{e}")))?;

    match counts.as_slice() {
        [right, wrong, ignores, exceptions] => Ok(WorkerLine::Complete(TestSummary::new(
            *right,
            *wrong,
            *ignores,
            *exceptions,
        ))),
        _ => Err(malformed("completion", line, "expected four counts")),
    }
}

fn parse_assertion(line: &str, rest: &str) -> Result<WorkerLine> {
    let rest = rest.trim_start();
    let (outcome, description) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    let outcome: AssertionOutcome = outcome
        .parse()
        .map_err(|e: String| malformed("assertion", line, &e))?;

    Ok(WorkerLine::Assertion(Assertion::new(outcome, description.trim())))
}

fn malformed(kind: &str, line: &str, reason: &str) -> SuiterunError {
    SuiterunError::ProtocolViolation(format!("malformed {kind} line {line:?}: {reason}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suite::EnvironmentDescriptor;

    #[test]
    fn run_line_keeps_one_unit_per_line() {
        let unit = TestUnit::new("Suite.Page\tOne", "pages/one\n.txt", EnvironmentDescriptor::new("k", "c"));
        assert_eq!(encode_run(&unit), "RUN\tSuite.Page One\tpages/one .txt\n");
    }

    #[test]
    fn completion_line_parses_counts() {
        assert_eq!(
            parse_line("@@complete 3 1 0 2").unwrap(),
            WorkerLine::Complete(TestSummary::new(3, 1, 0, 2))
        );
    }

    #[test]
    fn other_lines_are_output_chunks() {
        assert_eq!(
            parse_line("  check passed").unwrap(),
            WorkerLine::Output("  check passed\n".to_string())
        );
    }

    #[test]
    fn malformed_completion_is_a_protocol_violation() {
        for line in ["@@complete 1 2", "@@complete a b c d", "@@complete 1 2 3 4 5"] {
            match parse_line(line) {
                Err(SuiterunError::ProtocolViolation(msg)) => assert!(msg.contains("malformed")),
                other => panic!("expected protocol violation for {line:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn marker_must_end_at_a_word_boundary() {
        for line in ["@@completed 3 checks", "@@complete:", "@@asserted ok", "@@exceptional day"] {
            assert_eq!(
                parse_line(line).unwrap(),
                WorkerLine::Output(format!("{line}\n")),
                "{line:?} should be plain output"
            );
        }
        assert_eq!(
            parse_line("@@complete\t0 0 1 0").unwrap(),
            WorkerLine::Complete(TestSummary::new(0, 0, 1, 0))
        );
    }

    #[test]
    fn assertion_line_carries_outcome_and_description() {
        assert_eq!(
            parse_line("@@assert wrong  expected 3 but was 4 ").unwrap(),
            WorkerLine::Assertion(Assertion::new(AssertionOutcome::Wrong, "expected 3 but was 4"))
        );
        assert_eq!(
            parse_line("@@assert ignore").unwrap(),
            WorkerLine::Assertion(Assertion::new(AssertionOutcome::Ignore, ""))
        );
    }

    #[test]
    fn unknown_assertion_outcome_is_a_protocol_violation() {
        for line in ["@@assert", "@@assert maybe fine"] {
            match parse_line(line) {
                Err(SuiterunError::ProtocolViolation(msg)) => {
                    assert!(msg.contains("malformed assertion"), "{msg}")
                }
                other => panic!("expected protocol violation for {line:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn exception_line_keeps_its_text() {
        assert_eq!(
            parse_line("@@exception  NullPointerException at row 2").unwrap(),
            WorkerLine::Exception("NullPointerException at row 2".to_string())
        );
    }
}
