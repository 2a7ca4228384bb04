// src/exec/group.rs

//! The set of environments started for one run.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use indexmap::IndexMap;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::engine::EnvironmentEvent;
use crate::errors::{Result, SuiterunError};
use crate::exec::backend::{
    EnvironmentLauncher, HandleState, LaunchContext, LaunchOutcome, WorkerChannel,
};
use crate::exec::log::ExecutionLogs;
use crate::suite::{EnvironmentDescriptor, TestUnit};

/// One-shot trigger that force-terminates a single worker.
///
/// Clones share the trigger; only the first `fire` does anything.
#[derive(Debug, Clone)]
pub struct KillSwitch {
    tx: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

impl KillSwitch {
    pub fn new() -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        let switch = Self {
            tx: Arc::new(Mutex::new(Some(tx))),
        };
        (switch, rx)
    }

    /// Fire the switch. Returns true if this call delivered the kill.
    pub fn fire(&self) -> bool {
        let sender = self
            .tx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();

        match sender {
            Some(tx) => tx.send(()).is_ok(),
            None => false,
        }
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    active: IndexMap<String, KillSwitch>,
    closed: bool,
}

/// Kill switches of all active environments of a run.
///
/// Shared between the orchestrator (which registers environments as it
/// starts them) and the run's stop path (which may call [`kill_all`] from
/// any thread). Once `kill_all` ran, the registry is closed: anything
/// registered afterwards is killed on arrival.
///
/// [`kill_all`]: KillRegistry::kill_all
#[derive(Debug, Default)]
pub struct KillRegistry {
    state: Mutex<RegistryState>,
}

impl KillRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn track(&self, name: &str, switch: KillSwitch) -> Result<()> {
        let mut state = self.lock();

        if state.active.contains_key(name) {
            return Err(SuiterunError::EnvironmentAlreadyActive(name.to_string()));
        }

        if state.closed {
            debug!(environment = %name, "run already killed; terminating new environment");
            switch.fire();
            return Ok(());
        }

        state.active.insert(name.to_string(), switch);
        Ok(())
    }

    pub(crate) fn release(&self, name: &str) {
        self.lock().active.shift_remove(name);
    }

    /// Force-terminate every tracked environment and close the registry.
    ///
    /// Returns how many environments were killed by this call; a second
    /// call finds nothing left and returns 0.
    pub fn kill_all(&self) -> usize {
        let switches: Vec<(String, KillSwitch)> = {
            let mut state = self.lock();
            state.closed = true;
            state.active.drain(..).collect()
        };

        let mut killed = 0;
        for (name, switch) in switches {
            if switch.fire() {
                info!(environment = %name, "force-terminated environment");
                killed += 1;
            }
        }
        killed
    }

    /// Names of environments currently tracked, in start order.
    pub fn active(&self) -> Vec<String> {
        self.lock().active.keys().cloned().collect()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Starts environments for a run and keeps their kill switches.
pub struct EnvironmentGroup<L: EnvironmentLauncher> {
    launcher: L,
    registry: Arc<KillRegistry>,
    events: mpsc::UnboundedSender<EnvironmentEvent>,
    logs: ExecutionLogs,
    shutdown_timeout: Duration,
}

impl<L: EnvironmentLauncher> EnvironmentGroup<L> {
    pub fn new(
        launcher: L,
        events: mpsc::UnboundedSender<EnvironmentEvent>,
        logs: ExecutionLogs,
        shutdown_timeout: Duration,
    ) -> Self {
        Self {
            launcher,
            registry: Arc::new(KillRegistry::new()),
            events,
            logs,
            shutdown_timeout,
        }
    }

    /// Registry shared with whoever needs to kill the group.
    pub fn registry(&self) -> Arc<KillRegistry> {
        Arc::clone(&self.registry)
    }

    /// Start the environment described by `descriptor`.
    ///
    /// An environment that fails to start is not an error: its log is
    /// recorded and the returned handle reports
    /// `is_successfully_started() == false`.
    pub async fn start_environment(
        &self,
        descriptor: &EnvironmentDescriptor,
    ) -> Result<StartedEnvironment> {
        let name = descriptor.name();
        let (kill, kill_rx) = KillSwitch::new();
        self.registry.track(&name, kill.clone())?;

        info!(environment = %name, "starting environment");

        let ctx = LaunchContext {
            name: name.clone(),
            events: self.events.clone(),
            kill: kill_rx,
            logs: self.logs.clone(),
        };

        let outcome = match self.launcher.launch(descriptor.clone(), ctx).await {
            Ok(outcome) => outcome,
            Err(err) => {
                self.registry.release(&name);
                return Err(err);
            }
        };

        let worker = match outcome {
            LaunchOutcome::Started(worker) => Some(worker),
            LaunchOutcome::NotStarted(log) => {
                warn!(
                    environment = %name,
                    exceptions = ?log.exceptions,
                    "environment failed to start"
                );
                self.registry.release(&name);
                self.logs.add(name.clone(), log);
                None
            }
        };

        Ok(StartedEnvironment {
            name,
            worker,
            kill,
            registry: Arc::clone(&self.registry),
            shutdown_timeout: self.shutdown_timeout,
        })
    }

    /// Force-terminate every active environment. Idempotent.
    pub fn kill_all(&self) -> usize {
        self.registry.kill_all()
    }
}

/// Handle for one environment of the run.
pub struct StartedEnvironment {
    name: String,
    worker: Option<Box<dyn WorkerChannel>>,
    kill: KillSwitch,
    registry: Arc<KillRegistry>,
    shutdown_timeout: Duration,
}

impl std::fmt::Debug for StartedEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StartedEnvironment")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl StartedEnvironment {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_successfully_started(&self) -> bool {
        self.worker.is_some()
    }

    pub fn state(&self) -> HandleState {
        self.worker
            .as_ref()
            .map_or(HandleState::Terminated, |w| w.state())
    }

    /// Hand `unit` to the worker.
    pub async fn submit(&mut self, unit: TestUnit) -> Result<()> {
        let Some(worker) = self.worker.as_mut() else {
            return Err(SuiterunError::ConfigError(format!(
                "cannot submit '{}' to environment '{}': it never started",
                unit.name, self.name
            )));
        };

        debug!(environment = %self.name, unit = %unit.name, "submitting unit");
        worker.submit(unit).await
    }

    /// Graceful shutdown: signal end of input and wait for the worker to
    /// exit. A worker that outlives the shutdown timeout is killed.
    pub async fn end_of_input(&mut self) -> Result<()> {
        let result = match self.worker.as_mut() {
            Some(worker) => {
                debug!(environment = %self.name, "signalling end of input");
                match tokio::time::timeout(self.shutdown_timeout, worker.end_of_input()).await {
                    Ok(result) => result,
                    Err(_) => {
                        warn!(
                            environment = %self.name,
                            timeout_ms = self.shutdown_timeout.as_millis() as u64,
                            "worker did not exit after end of input; killing it"
                        );
                        self.kill.fire();
                        Ok(())
                    }
                }
            }
            None => Ok(()),
        };

        self.registry.release(&self.name);
        result
    }

    /// Kill the worker right away, bypassing graceful shutdown.
    pub fn force_terminate(&mut self) -> bool {
        self.registry.release(&self.name);
        self.kill.fire()
    }
}
