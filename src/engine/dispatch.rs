// src/engine/dispatch.rs

//! FIFO correlation of worker signals with submitted units.

use std::collections::VecDeque;
use std::time::Duration;

use tracing::{debug, trace};

use crate::engine::timing::Stopwatch;
use crate::errors::{Result, SuiterunError};
use crate::suite::{TestSummary, TestUnit};

#[derive(Debug)]
struct Dispatched {
    seq: u64,
    unit: TestUnit,
    clock: Stopwatch,
}

/// A unit the worker has started on.
#[derive(Debug, Clone)]
pub struct UnitStarted {
    pub unit: TestUnit,
    pub clock: Stopwatch,
}

/// A unit the worker has finished.
#[derive(Debug, Clone)]
pub struct UnitCompleted {
    pub unit: TestUnit,
    pub summary: TestSummary,
    pub elapsed: Duration,
}

/// What a completion signal resolved to.
#[derive(Debug, Clone)]
pub struct Completion {
    /// Set when the unit finished without emitting any output first; it
    /// is reported as started right before it is reported complete.
    pub started: Option<UnitStarted>,
    pub completed: UnitCompleted,
}

/// Units submitted to a worker whose completion has not arrived yet.
///
/// Workers give no explicit "unit started" signal. The head of the queue
/// is the unit being worked on, and the first output chunk seen for a new
/// head marks its start. A completion signal always belongs to the head.
#[derive(Debug, Default)]
pub struct DispatchQueue {
    pending: VecDeque<Dispatched>,
    next_seq: u64,
    /// Sequence number of the unit last reported as started.
    active: Option<u64>,
}

impl DispatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `unit`; returns its sequence number within the run.
    pub fn enqueue(&mut self, unit: TestUnit) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        trace!(unit = %unit.name, seq, "enqueued unit");
        self.pending.push_back(Dispatched {
            seq,
            unit,
            clock: Stopwatch::new(),
        });
        seq
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// The unit the worker is on, if any.
    pub fn head(&self) -> Option<&TestUnit> {
        self.pending.front().map(|d| &d.unit)
    }

    /// An output chunk (or another in-unit signal) arrived. If it is the
    /// first for the current head, the head starts and is returned.
    pub fn on_output_chunk(&mut self) -> Option<UnitStarted> {
        self.start_head_if_new()
    }

    /// A completion signal arrived: remove the head and stop its clock.
    ///
    /// A completion with nothing pending means the worker broke the
    /// protocol; that is an error, never silently ignored.
    pub fn on_unit_complete(&mut self, summary: TestSummary) -> Result<Completion> {
        let started = self.start_head_if_new();

        let Some(mut done) = self.pending.pop_front() else {
            return Err(SuiterunError::ProtocolViolation(format!(
                "completion signal ({summary}) with no unit pending"
            )));
        };

        let elapsed = done.clock.stop();
        debug!(unit = %done.unit.name, elapsed_ms = elapsed.as_millis() as u64, "unit complete");

        Ok(Completion {
            started,
            completed: UnitCompleted {
                unit: done.unit,
                summary,
                elapsed,
            },
        })
    }

    fn start_head_if_new(&mut self) -> Option<UnitStarted> {
        let head = self.pending.front_mut()?;
        if self.active == Some(head.seq) {
            return None;
        }

        self.active = Some(head.seq);
        head.clock.start();
        debug!(unit = %head.unit.name, seq = head.seq, "unit started");

        Some(UnitStarted {
            unit: head.unit.clone(),
            clock: head.clock,
        })
    }
}
