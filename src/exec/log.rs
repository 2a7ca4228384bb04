// src/exec/log.rs

//! Per-environment execution logs and their run-wide aggregate.

use std::sync::{Arc, Mutex, MutexGuard};

use indexmap::IndexMap;

/// Diagnostics captured for one environment process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionLog {
    pub command: String,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub exceptions: Vec<String>,
}

impl ExecutionLog {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Self::default()
        }
    }

    pub fn add_exception(&mut self, message: impl Into<String>) {
        self.exceptions.push(message.into());
    }

    pub fn has_exceptions(&self) -> bool {
        !self.exceptions.is_empty()
    }
}

/// Aggregate of all execution logs of a run, keyed by environment name.
///
/// Cheap to clone; every clone sees the same entries. The listener receives
/// one at the start of the run, and workers that are killed late still land
/// their log here.
#[derive(Debug, Clone, Default)]
pub struct ExecutionLogs {
    inner: Arc<Mutex<IndexMap<String, ExecutionLog>>>,
}

impl ExecutionLogs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the log of `environment`. A second log for the same name
    /// replaces the first.
    pub fn add(&self, environment: impl Into<String>, log: ExecutionLog) {
        self.lock().insert(environment.into(), log);
    }

    pub fn get(&self, environment: &str) -> Option<ExecutionLog> {
        self.lock().get(environment).cloned()
    }

    pub fn environments(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn has_exceptions(&self) -> bool {
        self.lock().values().any(ExecutionLog::has_exceptions)
    }

    fn lock(&self) -> MutexGuard<'_, IndexMap<String, ExecutionLog>> {
        // A panicking writer cannot leave a half-inserted entry behind.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_entries_in_insertion_order() {
        let logs = ExecutionLogs::new();
        let seen_by_listener = logs.clone();

        logs.add("b", ExecutionLog::new("run-b"));
        logs.add("a", ExecutionLog::new("run-a"));

        assert_eq!(seen_by_listener.environments(), vec!["b", "a"]);
        assert_eq!(seen_by_listener.get("a").unwrap().command, "run-a");
    }

    #[test]
    fn exceptions_are_visible_in_aggregate() {
        let logs = ExecutionLogs::new();
        let mut log = ExecutionLog::new("boom");
        assert!(!log.has_exceptions());
        log.add_exception("could not start");
        logs.add("env", log);

        assert!(logs.has_exceptions());
        assert_eq!(logs.len(), 1);
    }
}
