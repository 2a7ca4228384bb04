// src/suite/unit.rs

//! Test units and the per-unit summary reported by workers.

use std::fmt;

use crate::suite::EnvironmentDescriptor;
use crate::types::{AssertionOutcome, UnitRole};

/// One schedulable piece of work.
///
/// `source` is an opaque reference to the unit's definition; the worker
/// knows how to resolve it, the orchestrator never looks inside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestUnit {
    pub name: String,
    pub source: String,
    pub environment: EnvironmentDescriptor,
    pub role: UnitRole,
    /// Name of the suite setup that must run before this unit, if any.
    pub setup: Option<String>,
    /// Name of the suite teardown that must run after this unit, if any.
    pub teardown: Option<String>,
}

impl TestUnit {
    pub fn new(
        name: impl Into<String>,
        source: impl Into<String>,
        environment: EnvironmentDescriptor,
    ) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            environment,
            role: UnitRole::Test,
            setup: None,
            teardown: None,
        }
    }

    pub fn with_role(mut self, role: UnitRole) -> Self {
        self.role = role;
        self
    }

    pub fn with_setup(mut self, setup: impl Into<String>) -> Self {
        self.setup = Some(setup.into());
        self
    }

    pub fn with_teardown(mut self, teardown: impl Into<String>) -> Self {
        self.teardown = Some(teardown.into());
        self
    }

    pub fn is_suite_fixture(&self) -> bool {
        self.role.is_suite_fixture()
    }
}

impl fmt::Display for TestUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Counts reported by a worker when it finishes one unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TestSummary {
    pub right: u32,
    pub wrong: u32,
    pub ignores: u32,
    pub exceptions: u32,
}

impl TestSummary {
    pub fn new(right: u32, wrong: u32, ignores: u32, exceptions: u32) -> Self {
        Self {
            right,
            wrong,
            ignores,
            exceptions,
        }
    }

    pub fn is_passing(&self) -> bool {
        self.wrong == 0 && self.exceptions == 0
    }

    /// Accumulate another summary into this one. Counts come from workers,
    /// so they stick at `u32::MAX` instead of overflowing.
    pub fn add(&mut self, other: &TestSummary) {
        self.right = self.right.saturating_add(other.right);
        self.wrong = self.wrong.saturating_add(other.wrong);
        self.ignores = self.ignores.saturating_add(other.ignores);
        self.exceptions = self.exceptions.saturating_add(other.exceptions);
    }
}

/// One assertion a worker checked while running a unit. `description`
/// is whatever the worker said about it; the orchestrator passes it on
/// untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assertion {
    pub outcome: AssertionOutcome,
    pub description: String,
}

impl Assertion {
    pub fn new(outcome: AssertionOutcome, description: impl Into<String>) -> Self {
        Self {
            outcome,
            description: description.into(),
        }
    }
}

impl fmt::Display for TestSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} right, {} wrong, {} ignored, {} exceptions",
            self.right, self.wrong, self.ignores, self.exceptions
        )
    }
}
