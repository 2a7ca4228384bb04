// src/exec/mod.rs

//! Environment execution layer.
//!
//! This module is responsible for the worker processes of a run: starting
//! them, feeding them units, and getting their output back to the
//! orchestrator as `EnvironmentEvent`s.
//!
//! - [`backend`] provides the `EnvironmentLauncher` / `WorkerChannel` traits
//!   the rest of the crate talks to, so tests can swap in fake workers.
//! - [`group`] owns the environments of one run and their kill switches.
//! - [`process`] is the production launcher using `tokio::process::Command`.
//! - [`protocol`] is the line protocol spoken with worker processes.
//! - [`log`] collects per-environment execution logs.

pub mod backend;
pub mod group;
pub mod log;
pub mod process;
pub mod protocol;

pub use backend::{
    BoxFuture, EnvironmentLauncher, HandleState, LaunchContext, LaunchOutcome, WorkerChannel,
};
pub use group::{EnvironmentGroup, KillRegistry, KillSwitch, StartedEnvironment};
pub use log::{ExecutionLog, ExecutionLogs};
pub use process::ProcessLauncher;
