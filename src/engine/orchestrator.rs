// src/engine/orchestrator.rs

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use crate::engine::control::{RunControl, RunTracker, Stoppable};
use crate::engine::dispatch::DispatchQueue;
use crate::engine::listener::ResultsListener;
use crate::engine::timing::Stopwatch;
use crate::engine::{EnvironmentEvent, RunOptions};
use crate::errors::{Result, SuiterunError};
use crate::exec::{EnvironmentGroup, EnvironmentLauncher, ExecutionLogs, StartedEnvironment};
use crate::suite::{EnvironmentDescriptor, Surrounder, TestUnit, UnitGroups};

/// Runs a list of units, one environment at a time, and reports
/// everything to a `ResultsListener`.
///
/// Environments are started strictly one after another, which is why a
/// single dispatch queue serves the whole run.
pub struct Orchestrator<L: EnvironmentLauncher, R: ResultsListener> {
    group: EnvironmentGroup<L>,
    surrounder: Box<dyn Surrounder>,
    listener: R,
    control: Arc<RunControl>,
    queue: DispatchQueue,
    events_rx: mpsc::UnboundedReceiver<EnvironmentEvent>,
    logs: ExecutionLogs,
    options: RunOptions,
    total_clock: Stopwatch,
}

impl<L: EnvironmentLauncher, R: ResultsListener> fmt::Debug for Orchestrator<L, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("control", &self.control)
            .field("queue", &self.queue)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<L: EnvironmentLauncher, R: ResultsListener> Orchestrator<L, R> {
    pub fn new(
        launcher: L,
        surrounder: impl Surrounder + 'static,
        listener: R,
        tracker: Arc<dyn RunTracker>,
        options: RunOptions,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let logs = ExecutionLogs::new();
        let group = EnvironmentGroup::new(launcher, events_tx, logs.clone(), options.shutdown_timeout);
        let control = RunControl::new(group.registry(), tracker);

        Self {
            group,
            surrounder: Box::new(surrounder),
            listener,
            control,
            queue: DispatchQueue::new(),
            events_rx,
            logs,
            options,
            total_clock: Stopwatch::new(),
        }
    }

    /// Handle for stopping this run from elsewhere.
    pub fn control(&self) -> Arc<RunControl> {
        Arc::clone(&self.control)
    }

    /// The run's aggregate execution log.
    pub fn logs(&self) -> ExecutionLogs {
        self.logs.clone()
    }

    /// Execute `units` and hand the listener back.
    ///
    /// Never fails: an error aborts the run, is reported through
    /// `error_occurred`, and stops it.
    pub async fn run(mut self, units: Vec<TestUnit>) -> R {
        match self.execute_units(units).await {
            Ok(()) => self.all_testing_complete(),
            Err(err) => self.abort(err),
        }
        self.listener
    }

    async fn execute_units(&mut self, units: Vec<TestUnit>) -> Result<()> {
        let tracking_id = self.control.register();
        self.listener
            .set_log_and_tracking_id(&tracking_id, self.logs.clone());

        let groups = self.make_groups(&units);
        self.announce_total_tests(&groups);

        for (descriptor, group_units) in groups {
            self.run_group(&descriptor, group_units).await?;
        }

        self.control.deregister();
        Ok(())
    }

    fn make_groups(&self, units: &[TestUnit]) -> UnitGroups {
        let mut groups = UnitGroups::from_units(units, self.options.debug);
        if !units.is_empty() {
            groups.surround_with(self.surrounder.as_ref());
        }
        groups
    }

    fn announce_total_tests(&mut self, groups: &UnitGroups) {
        let total = groups.scheduled_count();
        info!(total, environments = groups.len(), "announcing units to run");
        self.listener.announce_total_tests(total);
        self.total_clock.start();
    }

    async fn run_group(
        &mut self,
        descriptor: &EnvironmentDescriptor,
        units: Vec<TestUnit>,
    ) -> Result<()> {
        if self.control.is_stopped() {
            debug!(environment = %descriptor, "run stopped; not starting environment");
            return Ok(());
        }

        let mut environment = self.group.start_environment(descriptor).await?;

        let executed = self.execute_group(&mut environment, units).await;
        let finished = self.finish_environment(&mut environment).await;

        executed.and(finished)
    }

    async fn execute_group(
        &mut self,
        environment: &mut StartedEnvironment,
        units: Vec<TestUnit>,
    ) -> Result<()> {
        if !environment.is_successfully_started() {
            info!(environment = %environment.name(), "environment did not start; skipping its units");
            return Ok(());
        }

        self.listener.environment_started(environment.name());

        for unit in units {
            if self.control.is_stopped() {
                info!(environment = %environment.name(), "run stopped; not submitting remaining units");
                break;
            }
            self.queue.enqueue(unit.clone());
            environment.submit(unit).await?;
            self.handle_ready_events()?;
        }

        self.wait_for_results().await
    }

    /// Always-run cleanup after a group: graceful end of input unless the
    /// run was stopped (then the environment was killed already).
    async fn finish_environment(&mut self, environment: &mut StartedEnvironment) -> Result<()> {
        if self.control.is_stopped() {
            return Ok(());
        }

        environment.end_of_input().await?;
        self.handle_ready_events()
    }

    /// Block until every submitted unit has completed or the run stops.
    async fn wait_for_results(&mut self) -> Result<()> {
        while !self.queue.is_empty() && !self.control.is_stopped() {
            tokio::select! {
                event = self.events_rx.recv() => match event {
                    Some(event) => self.handle_event(event)?,
                    None => {
                        return Err(anyhow::anyhow!("environment event channel closed").into());
                    }
                },
                _ = self.control.stopped() => {}
                _ = tokio::time::sleep(self.options.poll_interval) => {
                    trace!(pending = self.queue.len(), "still waiting for results");
                }
            }
        }

        if !self.queue.is_empty() {
            debug!(pending = self.queue.len(), "stopped with units still pending");
        }
        Ok(())
    }

    /// Process every event that has already arrived, without waiting.
    fn handle_ready_events(&mut self) -> Result<()> {
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event)?;
        }
        Ok(())
    }

    fn handle_event(&mut self, event: EnvironmentEvent) -> Result<()> {
        match event {
            EnvironmentEvent::OutputChunk { environment, output } => {
                trace!(environment = %environment, bytes = output.len(), "output chunk");
                if let Some(started) = self.queue.on_output_chunk() {
                    self.listener.unit_started(&started.unit, &started.clock);
                }
                self.listener.output_chunk(&output);
            }
            EnvironmentEvent::AssertionVerified {
                environment,
                assertion,
            } => {
                let unit = self.unit_in_progress(&environment, "assertion")?;
                self.listener.assertion_verified(&unit, &assertion);
            }
            EnvironmentEvent::ExceptionOccurred {
                environment,
                detail,
            } => {
                let unit = self.unit_in_progress(&environment, "exception")?;
                self.listener.exception_occurred(&unit, &detail);
            }
            EnvironmentEvent::UnitComplete {
                environment,
                summary,
            } => {
                let completion = self.queue.on_unit_complete(summary).map_err(|err| {
                    error!(environment = %environment, error = %err, "unexpected completion signal");
                    err
                })?;
                if let Some(started) = completion.started {
                    self.listener.unit_started(&started.unit, &started.clock);
                }
                let done = completion.completed;
                self.listener
                    .unit_complete(&done.unit, &done.summary, done.elapsed);
            }
            EnvironmentEvent::ProtocolFault {
                environment,
                detail,
            } => {
                return Err(SuiterunError::ProtocolViolation(format!(
                    "environment '{environment}': {detail}"
                )));
            }
            EnvironmentEvent::Stopped { environment, cause } => match cause {
                Some(cause) => {
                    return Err(SuiterunError::WorkerFault { environment, cause });
                }
                None => debug!(environment = %environment, "environment stopped"),
            },
        }
        Ok(())
    }

    /// The unit an in-unit signal belongs to: the head of the queue,
    /// reported as started if nothing was heard from it before.
    fn unit_in_progress(&mut self, environment: &str, signal: &str) -> Result<TestUnit> {
        if let Some(started) = self.queue.on_output_chunk() {
            self.listener.unit_started(&started.unit, &started.clock);
        }
        self.queue.head().cloned().ok_or_else(|| {
            error!(environment = %environment, signal, "in-unit signal with no unit pending");
            SuiterunError::ProtocolViolation(format!(
                "environment '{environment}': {signal} with no unit pending"
            ))
        })
    }

    fn all_testing_complete(&mut self) {
        let total = self.total_clock.stop();
        info!(elapsed_ms = total.as_millis() as u64, "all testing complete");
        self.listener.run_complete(total);
    }

    fn abort(&mut self, err: SuiterunError) {
        error!(error = %err, "test run aborted");
        self.listener.error_occurred();
        self.control.stop();
        if !self.queue.is_empty() {
            warn!(pending = self.queue.len(), "abandoning units without results");
        }
    }
}
