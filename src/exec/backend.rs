// src/exec/backend.rs

//! Pluggable environment backend abstraction.
//!
//! The environment group talks to an `EnvironmentLauncher` instead of
//! spawning processes itself. Production code uses
//! [`ProcessLauncher`](super::process::ProcessLauncher); tests can provide a
//! launcher whose workers answer submissions directly with
//! `EnvironmentEvent`s.
//!
//! A launched worker is driven through the `WorkerChannel` it returns and
//! reports back exclusively through the event channel in its
//! [`LaunchContext`]:
//! - zero or more `OutputChunk`s followed by exactly one `UnitComplete` per
//!   submitted unit, in submission order
//! - one `Stopped` when the worker is gone, after its `ExecutionLog` was
//!   added to the run's logs
//!
//! A worker must also honour the kill receiver at any time.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use tokio::sync::{mpsc, oneshot};

use crate::engine::EnvironmentEvent;
use crate::errors::Result;
use crate::exec::log::{ExecutionLog, ExecutionLogs};
use crate::suite::{EnvironmentDescriptor, TestUnit};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Lifecycle of one worker.
///
/// `Uninitialized -> Starting -> Ready -> Draining -> Terminated`; a forced
/// kill jumps straight to `Terminated` from any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    Uninitialized,
    Starting,
    Ready,
    Draining,
    Terminated,
}

impl fmt::Display for HandleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HandleState::Uninitialized => "uninitialized",
            HandleState::Starting => "starting",
            HandleState::Ready => "ready",
            HandleState::Draining => "draining",
            HandleState::Terminated => "terminated",
        };
        f.write_str(s)
    }
}

/// Everything a launcher needs to wire a new worker into the run.
#[derive(Debug)]
pub struct LaunchContext {
    /// Name the environment is reported and logged under.
    pub name: String,
    /// Where the worker sends its output, completions and stop notice.
    pub events: mpsc::UnboundedSender<EnvironmentEvent>,
    /// Fires when the run wants the worker gone immediately.
    pub kill: oneshot::Receiver<()>,
    /// Aggregate the worker's execution log goes into when it ends.
    pub logs: ExecutionLogs,
}

/// Result of a launch attempt that did not fail at the I/O level.
pub enum LaunchOutcome {
    Started(Box<dyn WorkerChannel>),
    /// The environment could not be started (e.g. misconfigured); the log
    /// explains why.
    NotStarted(ExecutionLog),
}

impl fmt::Debug for LaunchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaunchOutcome::Started(worker) => {
                f.debug_tuple("Started").field(&worker.state()).finish()
            }
            LaunchOutcome::NotStarted(log) => f.debug_tuple("NotStarted").field(log).finish(),
        }
    }
}

/// Trait abstracting how environment workers are started.
pub trait EnvironmentLauncher: Send + Sync {
    /// Start a worker for `descriptor`.
    ///
    /// Normal failure to start is `Ok(LaunchOutcome::NotStarted(..))`;
    /// `Err` is reserved for I/O-level faults.
    fn launch(
        &self,
        descriptor: EnvironmentDescriptor,
        ctx: LaunchContext,
    ) -> BoxFuture<'_, Result<LaunchOutcome>>;
}

/// Input side of one started worker.
pub trait WorkerChannel: Send {
    /// Hand one unit to the worker. Fire-and-forget: the result arrives on
    /// the event channel.
    fn submit(&mut self, unit: TestUnit) -> BoxFuture<'_, Result<()>>;

    /// Tell the worker no more units follow and wait for it to exit.
    fn end_of_input(&mut self) -> BoxFuture<'_, Result<()>>;

    fn state(&self) -> HandleState;
}
