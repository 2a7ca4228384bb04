// src/engine/mod.rs

//! Orchestration engine for suiterun.
//!
//! This module ties together:
//! - the dispatch queue correlating worker signals with submitted units
//! - run control (stop flag, run tracking, kill-all on stop)
//! - timing of units and runs
//! - the results listener the run reports to
//! - the orchestrator that drives a whole run group by group
//!
//! Workers never call into the orchestrator. They send
//! [`EnvironmentEvent`]s over the run's channel and the orchestrator task
//! consumes them, so the dispatch queue has a single owner.

use std::time::Duration;

use crate::suite::{Assertion, TestSummary};

/// Events flowing from environment workers to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvironmentEvent {
    /// A piece of output of the unit the worker is on.
    OutputChunk { environment: String, output: String },
    /// The worker checked an assertion of the unit it is on.
    AssertionVerified {
        environment: String,
        assertion: Assertion,
    },
    /// An exception was raised inside the unit the worker is on.
    ExceptionOccurred { environment: String, detail: String },
    /// The worker finished its oldest pending unit.
    UnitComplete {
        environment: String,
        summary: TestSummary,
    },
    /// The worker sent something the protocol does not allow.
    ProtocolFault { environment: String, detail: String },
    /// The worker is gone. `cause` is set when it went away abnormally.
    Stopped {
        environment: String,
        cause: Option<String>,
    },
}

/// Knobs of a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Start every environment with its debug flag set.
    pub debug: bool,
    /// Upper bound on how long the drain wait goes without re-checking the
    /// queue and the stop flag.
    pub poll_interval: Duration,
    /// How long a worker may take to exit after end of input before it is
    /// killed.
    pub shutdown_timeout: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            debug: false,
            poll_interval: Duration::from_millis(50),
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

pub mod control;
pub mod dispatch;
pub mod listener;
pub mod orchestrator;
pub mod timing;

pub use control::{InMemoryRunTracker, RunControl, RunTracker, StopSignal, Stoppable};
pub use dispatch::DispatchQueue;
pub use listener::{ConsoleListener, ResultsListener};
pub use orchestrator::Orchestrator;
pub use timing::{ClockState, Stopwatch};
