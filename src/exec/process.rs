// src/exec/process.rs

//! Environment workers running as OS processes.

use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::engine::EnvironmentEvent;
use crate::errors::Result;
use crate::exec::backend::{
    BoxFuture, EnvironmentLauncher, HandleState, LaunchContext, LaunchOutcome, WorkerChannel,
};
use crate::exec::log::{ExecutionLog, ExecutionLogs};
use crate::exec::protocol::{self, WorkerLine};
use crate::suite::{EnvironmentDescriptor, TestUnit};

/// How long to keep reading a dead worker's pipes. A grandchild that
/// inherited them must not keep the run waiting.
const PIPE_DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Launches each environment's command through the platform shell and
/// speaks the [`protocol`] over its stdin/stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessLauncher;

impl ProcessLauncher {
    pub fn new() -> Self {
        Self
    }
}

impl EnvironmentLauncher for ProcessLauncher {
    fn launch(
        &self,
        descriptor: EnvironmentDescriptor,
        ctx: LaunchContext,
    ) -> BoxFuture<'_, Result<LaunchOutcome>> {
        Box::pin(launch_process(descriptor, ctx))
    }
}

async fn launch_process(
    descriptor: EnvironmentDescriptor,
    ctx: LaunchContext,
) -> Result<LaunchOutcome> {
    let state = Arc::new(Mutex::new(HandleState::Starting));
    let mut log = ExecutionLog::new(descriptor.command());

    if descriptor.command().trim().is_empty() {
        log.add_exception(format!("environment '{}' has no command", ctx.name));
        return Ok(LaunchOutcome::NotStarted(log));
    }

    info!(
        environment = %ctx.name,
        cmd = %descriptor.command(),
        debug = descriptor.is_debug(),
        "spawning environment process"
    );

    let mut cmd = shell_command(descriptor.command());
    cmd.env("SUITERUN_ENVIRONMENT", &ctx.name);
    if descriptor.is_debug() {
        cmd.env("SUITERUN_DEBUG", "1");
    }
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) if is_start_failure(&e) => {
            warn!(environment = %ctx.name, error = %e, "could not spawn environment process");
            log.add_exception(format!("spawning '{}': {e}", descriptor.command()));
            return Ok(LaunchOutcome::NotStarted(log));
        }
        Err(e) => {
            return Err(anyhow::Error::new(e)
                .context(format!("spawning process for environment '{}'", ctx.name))
                .into());
        }
    };

    let stdin = child
        .stdin
        .take()
        .context("environment process has no stdin pipe")?;
    let stdout = child
        .stdout
        .take()
        .context("environment process has no stdout pipe")?;
    let stderr = child
        .stderr
        .take()
        .context("environment process has no stderr pipe")?;

    let stdout_task = spawn_stdout_reader(ctx.name.clone(), stdout, ctx.events.clone());
    let stderr_task = spawn_stderr_reader(ctx.name.clone(), stderr);

    set_state(&state, HandleState::Ready);

    let supervisor = tokio::spawn(supervise(
        Supervised {
            name: ctx.name.clone(),
            child,
            log,
            state: Arc::clone(&state),
            events: ctx.events,
            logs: ctx.logs,
            stdout_task,
            stderr_task,
        },
        ctx.kill,
    ));

    Ok(LaunchOutcome::Started(Box::new(ProcessWorker {
        name: ctx.name,
        stdin: Some(stdin),
        state,
        supervisor: Some(supervisor),
    })))
}

/// Build a shell command appropriate for the platform.
fn shell_command(command: &str) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(command);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(command);
        c
    }
}

fn is_start_failure(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied
    )
}

fn set_state(state: &Mutex<HandleState>, next: HandleState) {
    *state.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = next;
}

fn get_state(state: &Mutex<HandleState>) -> HandleState {
    *state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// What the stdout reader saw before the pipe closed.
#[derive(Debug, Default)]
struct StdoutCapture {
    text: String,
    fault: Option<String>,
}

/// Forward stdout lines as output chunks and protocol signals.
///
/// Output is opaque test content, so bytes that are not UTF-8 are decoded
/// lossily instead of ending the read. A malformed protocol line is a
/// fault: the reader reports it once, stops forwarding, and the fault ends
/// up in the worker's log.
fn spawn_stdout_reader(
    name: String,
    stdout: ChildStdout,
    events: mpsc::UnboundedSender<EnvironmentEvent>,
) -> JoinHandle<StdoutCapture> {
    tokio::spawn(async move {
        let mut capture = StdoutCapture::default();
        let mut reader = BufReader::new(stdout);
        let mut buf = Vec::new();

        loop {
            let line = match read_lossy_line(&mut reader, &mut buf).await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    capture.fault = Some(format!("reading worker stdout: {e}"));
                    break;
                }
            };

            capture.text.push_str(&line);
            capture.text.push('\n');

            if capture.fault.is_some() {
                continue;
            }

            let environment = name.clone();
            let event = match protocol::parse_line(&line) {
                Ok(WorkerLine::Output(output)) => EnvironmentEvent::OutputChunk { environment, output },
                Ok(WorkerLine::Complete(summary)) => EnvironmentEvent::UnitComplete { environment, summary },
                Ok(WorkerLine::Assertion(assertion)) => {
                    EnvironmentEvent::AssertionVerified { environment, assertion }
                }
                Ok(WorkerLine::Exception(detail)) => {
                    EnvironmentEvent::ExceptionOccurred { environment, detail }
                }
                Err(e) => {
                    error!(environment = %name, error = %e, "worker broke the protocol");
                    capture.fault = Some(e.to_string());
                    EnvironmentEvent::ProtocolFault {
                        environment,
                        detail: e.to_string(),
                    }
                }
            };

            if events.send(event).is_err() {
                debug!(environment = %name, "event channel closed; dropping worker output");
            }
        }

        capture
    })
}

/// Read one line, without its `\n` or `\r\n`, replacing invalid UTF-8.
/// `None` at end of stream.
async fn read_lossy_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<Option<String>>
where
    R: AsyncBufReadExt + Unpin,
{
    buf.clear();
    if reader.read_until(b'\n', buf).await? == 0 {
        return Ok(None);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }
    Ok(Some(String::from_utf8_lossy(buf).into_owned()))
}

/// Always consume stderr so buffers don't fill; it ends up in the log.
fn spawn_stderr_reader(name: String, stderr: ChildStderr) -> JoinHandle<String> {
    tokio::spawn(async move {
        let mut text = String::new();
        let mut reader = BufReader::new(stderr);
        let mut buf = Vec::new();

        while let Ok(Some(line)) = read_lossy_line(&mut reader, &mut buf).await {
            debug!(environment = %name, "stderr: {}", line);
            text.push_str(&line);
            text.push('\n');
        }

        text
    })
}

struct Supervised {
    name: String,
    child: Child,
    log: ExecutionLog,
    state: Arc<Mutex<HandleState>>,
    events: mpsc::UnboundedSender<EnvironmentEvent>,
    logs: ExecutionLogs,
    stdout_task: JoinHandle<StdoutCapture>,
    stderr_task: JoinHandle<String>,
}

/// Wait for the worker to exit (or kill it when asked), then record its
/// log and announce that it stopped.
async fn supervise(mut s: Supervised, mut kill_rx: oneshot::Receiver<()>) {
    let mut killed = false;

    let status = tokio::select! {
        status = s.child.wait() => status,
        kill = &mut kill_rx => {
            match kill {
                Ok(()) => {
                    killed = true;
                    info!(environment = %s.name, "kill requested; terminating environment process");
                    set_state(&s.state, HandleState::Terminated);
                    if let Err(e) = s.child.start_kill() {
                        warn!(environment = %s.name, error = %e, "failed to kill environment process");
                    }
                }
                Err(_) => {
                    debug!(environment = %s.name, "kill switch dropped; waiting for normal exit");
                }
            }
            s.child.wait().await
        }
    };

    let drained_gracefully = get_state(&s.state) == HandleState::Draining;
    set_state(&s.state, HandleState::Terminated);

    let stdout = tokio::time::timeout(PIPE_DRAIN_GRACE, s.stdout_task)
        .await
        .ok()
        .and_then(|joined| joined.ok())
        .unwrap_or_default();
    let stderr = tokio::time::timeout(PIPE_DRAIN_GRACE, s.stderr_task)
        .await
        .ok()
        .and_then(|joined| joined.ok())
        .unwrap_or_default();

    let mut log = s.log;
    log.stdout = stdout.text;
    log.stderr = stderr;
    log.exit_code = status.as_ref().ok().and_then(ExitStatus::code);

    let cause = if killed {
        stdout.fault
    } else {
        exit_fault(&status, stdout.fault, drained_gracefully)
    };

    match &cause {
        Some(cause) => {
            warn!(environment = %s.name, cause = %cause, "environment stopped abnormally");
            log.add_exception(cause.clone());
        }
        None => {
            info!(
                environment = %s.name,
                exit_code = ?log.exit_code,
                killed,
                "environment process exited"
            );
        }
    }

    s.logs.add(s.name.clone(), log);

    let _ = s.events.send(EnvironmentEvent::Stopped {
        environment: s.name,
        cause,
    });
}

fn exit_fault(
    status: &std::io::Result<ExitStatus>,
    protocol_fault: Option<String>,
    drained_gracefully: bool,
) -> Option<String> {
    if let Some(fault) = protocol_fault {
        return Some(fault);
    }
    match status {
        Err(e) => Some(format!("waiting for worker process: {e}")),
        Ok(status) if !drained_gracefully => {
            Some(format!("worker exited before end of input ({status})"))
        }
        Ok(_) => None,
    }
}

/// Input side of a worker process.
struct ProcessWorker {
    name: String,
    stdin: Option<ChildStdin>,
    state: Arc<Mutex<HandleState>>,
    supervisor: Option<JoinHandle<()>>,
}

impl ProcessWorker {
    async fn write_line(&mut self, line: &str) -> std::io::Result<()> {
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "worker stdin already closed",
            ));
        };
        stdin.write_all(line.as_bytes()).await?;
        stdin.flush().await
    }
}

impl WorkerChannel for ProcessWorker {
    fn submit(&mut self, unit: TestUnit) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let state = get_state(&self.state);
            if state != HandleState::Ready {
                return Err(anyhow::anyhow!(
                    "cannot submit '{}' to environment '{}' in state {state}",
                    unit.name,
                    self.name
                )
                .into());
            }

            let line = protocol::encode_run(&unit);
            self.write_line(&line).await.with_context(|| {
                format!("submitting '{}' to environment '{}'", unit.name, self.name)
            })?;
            Ok(())
        })
    }

    fn end_of_input(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if get_state(&self.state) == HandleState::Ready {
                set_state(&self.state, HandleState::Draining);
            }

            match self.write_line(protocol::BYE).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                    debug!(environment = %self.name, "worker already closed its stdin");
                }
                Err(e) => {
                    return Err(anyhow::Error::new(e)
                        .context(format!("signalling end of input to '{}'", self.name))
                        .into());
                }
            }
            // Closing stdin is the second half of the goodbye.
            self.stdin = None;

            if let Some(supervisor) = self.supervisor.take() {
                supervisor
                    .await
                    .with_context(|| format!("supervisor of '{}' panicked", self.name))?;
            }
            Ok(())
        })
    }

    fn state(&self) -> HandleState {
        get_state(&self.state)
    }
}
