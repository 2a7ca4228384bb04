// src/engine/control.rs

//! Stopping a run: the stop flag, run tracking, and the stop transition.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Notify;
use tracing::{debug, info};

use crate::exec::KillRegistry;

/// Something an external controller can cancel.
pub trait Stoppable: Send + Sync {
    fn stop(&self);
}

/// Registry of in-flight runs, so they can be found and cancelled by id.
pub trait RunTracker: Send + Sync {
    fn register(&self, run: Arc<dyn Stoppable>) -> String;
    /// Forget `id`. Unknown ids are ignored.
    fn deregister(&self, id: &str);
}

/// Write-once-true stop flag with a wake-up for whoever waits on it.
#[derive(Debug, Default)]
pub struct StopSignal {
    stopped: AtomicBool,
    notify: Notify,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Raise the flag. Returns true only for the call that raised it.
    pub fn trigger(&self) -> bool {
        let first = !self.stopped.swap(true, Ordering::AcqRel);
        if first {
            // notify_one keeps a permit if nobody is waiting yet.
            self.notify.notify_one();
        }
        first
    }

    /// Resolves once the flag is raised.
    pub async fn stopped(&self) {
        if self.is_stopped() {
            return;
        }
        self.notify.notified().await;
    }
}

/// Stop state of one run.
///
/// Shared between the orchestrator task and anyone allowed to cancel the
/// run (Ctrl-C handler, run tracker). `stop` may be called from any thread
/// at any time.
pub struct RunControl {
    signal: StopSignal,
    kills: Arc<KillRegistry>,
    tracker: Arc<dyn RunTracker>,
    tracking_id: Mutex<Option<String>>,
}

impl fmt::Debug for RunControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunControl")
            .field("stopped", &self.is_stopped())
            .field("tracking_id", &*self.lock_id())
            .field("kills", &self.kills)
            .finish_non_exhaustive()
    }
}

impl RunControl {
    pub fn new(kills: Arc<KillRegistry>, tracker: Arc<dyn RunTracker>) -> Arc<Self> {
        Arc::new(Self {
            signal: StopSignal::new(),
            kills,
            tracker,
            tracking_id: Mutex::new(None),
        })
    }

    /// Register this run with the tracker and remember the id.
    pub fn register(self: &Arc<Self>) -> String {
        let run: Arc<dyn Stoppable> = self.clone();
        let id = self.tracker.register(run);
        *self.lock_id() = Some(id.clone());
        debug!(tracking_id = %id, "registered run");
        id
    }

    pub fn deregister(&self) {
        let id = self.lock_id().clone();
        if let Some(id) = id {
            self.tracker.deregister(&id);
        }
    }

    pub fn tracking_id(&self) -> Option<String> {
        self.lock_id().clone()
    }

    pub fn is_stopped(&self) -> bool {
        self.signal.is_stopped()
    }

    /// Resolves once the run is stopped.
    pub async fn stopped(&self) {
        self.signal.stopped().await
    }

    fn lock_id(&self) -> MutexGuard<'_, Option<String>> {
        self.tracking_id.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Stoppable for RunControl {
    /// Running -> stopped: raise the flag, leave the tracker, kill the
    /// environment group. Repeated calls only deregister again.
    fn stop(&self) {
        let first = self.signal.trigger();
        self.deregister();

        if first {
            let killed = self.kills.kill_all();
            info!(killed, "run stopped");
        }
    }
}

/// In-process [`RunTracker`] handing out sequential ids.
#[derive(Default)]
pub struct InMemoryRunTracker {
    next_id: AtomicU64,
    runs: Mutex<BTreeMap<String, Arc<dyn Stoppable>>>,
}

impl fmt::Debug for InMemoryRunTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryRunTracker")
            .field("running", &self.running_ids())
            .finish()
    }
}

impl InMemoryRunTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn running_ids(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    /// Stop the run registered under `id`. Returns false for unknown ids.
    pub fn stop(&self, id: &str) -> bool {
        // Take the run out before stopping it: stop() deregisters, which
        // needs the lock again.
        let run = self.lock().get(id).cloned();
        match run {
            Some(run) => {
                run.stop();
                true
            }
            None => false,
        }
    }

    pub fn stop_all(&self) {
        let runs: Vec<Arc<dyn Stoppable>> = self.lock().values().cloned().collect();
        for run in runs {
            run.stop();
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Arc<dyn Stoppable>>> {
        self.runs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl RunTracker for InMemoryRunTracker {
    fn register(&self, run: Arc<dyn Stoppable>) -> String {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed).to_string();
        self.lock().insert(id.clone(), run);
        id
    }

    fn deregister(&self, id: &str) {
        self.lock().remove(id);
    }
}
