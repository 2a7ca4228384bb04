use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use suiterun::engine::EnvironmentEvent;
use suiterun::errors::Result;
use suiterun::exec::{
    BoxFuture, EnvironmentLauncher, ExecutionLog, ExecutionLogs, HandleState, LaunchContext,
    LaunchOutcome, WorkerChannel,
};
use suiterun::suite::{Assertion, EnvironmentDescriptor, TestSummary, TestUnit};
use suiterun::types::AssertionOutcome;

/// How the fake workers of one environment kind behave.
#[derive(Debug, Clone)]
pub enum FakeBehaviour {
    /// Print one line, then report `summary` for every unit.
    Complete(TestSummary),
    /// Report `summary` for every unit without printing anything.
    Silent(TestSummary),
    /// The environment never starts.
    FailToStart,
    /// Answer the first `n` units, then accept units but never answer.
    CompleteFirst(usize),
    /// Answer `after` units, then die with `cause` on the next one.
    Fault { after: usize, cause: String },
    /// Report two completions for the first unit.
    ExtraCompletion,
    /// Print one line, check one assertion per outcome (described as
    /// `"<unit> check <i>"`), then complete with the matching counts.
    Checks(Vec<AssertionOutcome>),
    /// Print one line, raise an exception with this text, then complete
    /// with one exception counted.
    Raise(String),
    /// Complete every unit, then check an assertion after it.
    AssertionAfterCompletion,
}

/// What the fake workers saw. Names are environment names for
/// `launched`/`ended`/`killed` and unit names for `submitted`.
#[derive(Debug, Clone, Default)]
pub struct FakeRecord {
    pub launched: Vec<String>,
    pub submitted: Vec<String>,
    pub ended: Vec<String>,
    pub killed: Vec<String>,
}

/// A fake launcher that:
/// - looks up a [`FakeBehaviour`] by environment kind
/// - records launches, submissions, graceful ends and kills
/// - answers submissions with `EnvironmentEvent`s from a per-worker task
pub struct FakeLauncher {
    behaviours: HashMap<String, FakeBehaviour>,
    default: FakeBehaviour,
    unit_delay: Duration,
    record: Arc<Mutex<FakeRecord>>,
}

impl FakeLauncher {
    pub fn new() -> Self {
        Self {
            behaviours: HashMap::new(),
            default: FakeBehaviour::Complete(TestSummary::new(1, 0, 0, 0)),
            unit_delay: Duration::ZERO,
            record: Arc::new(Mutex::new(FakeRecord::default())),
        }
    }

    pub fn with_behaviour(mut self, kind: &str, behaviour: FakeBehaviour) -> Self {
        self.behaviours.insert(kind.to_string(), behaviour);
        self
    }

    /// Time each worker spends on a unit before answering.
    pub fn with_unit_delay(mut self, delay: Duration) -> Self {
        self.unit_delay = delay;
        self
    }

    /// Shared handle to what the workers saw; stays valid after the
    /// launcher moved into an orchestrator.
    pub fn record(&self) -> Arc<Mutex<FakeRecord>> {
        Arc::clone(&self.record)
    }

    fn behaviour_for(&self, descriptor: &EnvironmentDescriptor) -> FakeBehaviour {
        self.behaviours
            .get(descriptor.kind())
            .cloned()
            .unwrap_or_else(|| self.default.clone())
    }
}

impl Default for FakeLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvironmentLauncher for FakeLauncher {
    fn launch(
        &self,
        descriptor: EnvironmentDescriptor,
        ctx: LaunchContext,
    ) -> BoxFuture<'_, Result<LaunchOutcome>> {
        let behaviour = self.behaviour_for(&descriptor);
        let record = Arc::clone(&self.record);
        let unit_delay = self.unit_delay;

        Box::pin(async move {
            if let FakeBehaviour::FailToStart = behaviour {
                let mut log = ExecutionLog::new(descriptor.command());
                log.add_exception(format!("fake environment '{}' refused to start", ctx.name));
                return Ok(LaunchOutcome::NotStarted(log));
            }

            record.lock().unwrap().launched.push(ctx.name.clone());

            let LaunchContext {
                name,
                events,
                kill,
                logs,
            } = ctx;
            let state = Arc::new(Mutex::new(HandleState::Ready));
            let (units_tx, units_rx) = mpsc::unbounded_channel();

            let responder = tokio::spawn(respond(
                Responder {
                    name: name.clone(),
                    behaviour,
                    events: events.clone(),
                    state: Arc::clone(&state),
                    logs: logs.clone(),
                    unit_delay,
                },
                units_rx,
            ));

            {
                let name = name.clone();
                let events = events.clone();
                let state = Arc::clone(&state);
                let record = Arc::clone(&record);
                let logs = logs.clone();
                tokio::spawn(async move {
                    if kill.await.is_err() {
                        return;
                    }
                    if terminate(&state) {
                        record.lock().unwrap().killed.push(name.clone());
                        logs.add(name.clone(), ExecutionLog::new("fake"));
                        let _ = events.send(EnvironmentEvent::Stopped {
                            environment: name,
                            cause: None,
                        });
                    }
                });
            }

            let worker = FakeWorker {
                name,
                units_tx: Some(units_tx),
                responder: Some(responder),
                events,
                state,
                record,
                logs,
            };
            Ok(LaunchOutcome::Started(Box::new(worker)))
        })
    }
}

/// Move to `Terminated`; true if this call did it.
fn terminate(state: &Mutex<HandleState>) -> bool {
    let mut state = state.lock().unwrap();
    if *state == HandleState::Terminated {
        return false;
    }
    *state = HandleState::Terminated;
    true
}

fn is_terminated(state: &Mutex<HandleState>) -> bool {
    *state.lock().unwrap() == HandleState::Terminated
}

struct Responder {
    name: String,
    behaviour: FakeBehaviour,
    events: mpsc::UnboundedSender<EnvironmentEvent>,
    state: Arc<Mutex<HandleState>>,
    logs: ExecutionLogs,
    unit_delay: Duration,
}

async fn respond(r: Responder, mut units_rx: mpsc::UnboundedReceiver<TestUnit>) {
    let mut answered = 0usize;

    while let Some(unit) = units_rx.recv().await {
        if !r.unit_delay.is_zero() {
            tokio::time::sleep(r.unit_delay).await;
        }
        if is_terminated(&r.state) {
            return;
        }

        let complete = |summary| EnvironmentEvent::UnitComplete {
            environment: r.name.clone(),
            summary,
        };

        match &r.behaviour {
            FakeBehaviour::Complete(summary) => {
                let _ = r.events.send(EnvironmentEvent::OutputChunk {
                    environment: r.name.clone(),
                    output: format!("running {}\n", unit.name),
                });
                let _ = r.events.send(complete(*summary));
            }
            FakeBehaviour::Silent(summary) => {
                let _ = r.events.send(complete(*summary));
            }
            FakeBehaviour::CompleteFirst(n) => {
                if answered < *n {
                    let _ = r.events.send(complete(TestSummary::new(1, 0, 0, 0)));
                }
            }
            FakeBehaviour::Fault { after, cause } => {
                if answered >= *after {
                    if terminate(&r.state) {
                        let mut log = ExecutionLog::new("fake");
                        log.add_exception(cause.clone());
                        r.logs.add(r.name.clone(), log);
                        let _ = r.events.send(EnvironmentEvent::Stopped {
                            environment: r.name.clone(),
                            cause: Some(cause.clone()),
                        });
                    }
                    return;
                }
                let _ = r.events.send(complete(TestSummary::new(1, 0, 0, 0)));
            }
            FakeBehaviour::ExtraCompletion => {
                let _ = r.events.send(complete(TestSummary::new(1, 0, 0, 0)));
                if answered == 0 {
                    let _ = r.events.send(complete(TestSummary::new(1, 0, 0, 0)));
                }
            }
            FakeBehaviour::Checks(outcomes) => {
                let _ = r.events.send(EnvironmentEvent::OutputChunk {
                    environment: r.name.clone(),
                    output: format!("running {}\n", unit.name),
                });
                let mut summary = TestSummary::default();
                for (i, outcome) in outcomes.iter().enumerate() {
                    let counted = match outcome {
                        AssertionOutcome::Right => TestSummary::new(1, 0, 0, 0),
                        AssertionOutcome::Wrong => TestSummary::new(0, 1, 0, 0),
                        AssertionOutcome::Ignore => TestSummary::new(0, 0, 1, 0),
                    };
                    summary.add(&counted);
                    let _ = r.events.send(EnvironmentEvent::AssertionVerified {
                        environment: r.name.clone(),
                        assertion: Assertion::new(*outcome, format!("{} check {i}", unit.name)),
                    });
                }
                let _ = r.events.send(complete(summary));
            }
            FakeBehaviour::Raise(detail) => {
                let _ = r.events.send(EnvironmentEvent::OutputChunk {
                    environment: r.name.clone(),
                    output: format!("running {}\n", unit.name),
                });
                let _ = r.events.send(EnvironmentEvent::ExceptionOccurred {
                    environment: r.name.clone(),
                    detail: detail.clone(),
                });
                let _ = r.events.send(complete(TestSummary::new(0, 0, 0, 1)));
            }
            FakeBehaviour::AssertionAfterCompletion => {
                let _ = r.events.send(complete(TestSummary::new(1, 0, 0, 0)));
                let _ = r.events.send(EnvironmentEvent::AssertionVerified {
                    environment: r.name.clone(),
                    assertion: Assertion::new(AssertionOutcome::Right, "late"),
                });
            }
            FakeBehaviour::FailToStart => unreachable!("never started"),
        }
        answered += 1;
    }
}

struct FakeWorker {
    name: String,
    units_tx: Option<mpsc::UnboundedSender<TestUnit>>,
    responder: Option<JoinHandle<()>>,
    events: mpsc::UnboundedSender<EnvironmentEvent>,
    state: Arc<Mutex<HandleState>>,
    record: Arc<Mutex<FakeRecord>>,
    logs: ExecutionLogs,
}

impl WorkerChannel for FakeWorker {
    fn submit(&mut self, unit: TestUnit) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let state = self.state();
            if state != HandleState::Ready {
                return Err(anyhow::anyhow!(
                    "cannot submit '{}' to '{}' in state {state}",
                    unit.name,
                    self.name
                )
                .into());
            }

            self.record.lock().unwrap().submitted.push(unit.name.clone());
            if let Some(tx) = self.units_tx.as_ref() {
                let _ = tx.send(unit);
            }
            Ok(())
        })
    }

    fn end_of_input(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            {
                let mut state = self.state.lock().unwrap();
                if *state == HandleState::Ready {
                    *state = HandleState::Draining;
                }
            }

            // Dropping the sender lets the responder finish what is queued.
            self.units_tx = None;
            if let Some(responder) = self.responder.take() {
                responder.await.map_err(anyhow::Error::from)?;
            }

            if terminate(&self.state) {
                self.record.lock().unwrap().ended.push(self.name.clone());
                self.logs.add(self.name.clone(), ExecutionLog::new("fake"));
                let _ = self.events.send(EnvironmentEvent::Stopped {
                    environment: self.name.clone(),
                    cause: None,
                });
            }
            Ok(())
        })
    }

    fn state(&self) -> HandleState {
        *self.state.lock().unwrap()
    }
}
