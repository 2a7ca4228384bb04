// src/suite/surround.rs

//! Splicing suite setup/teardown units around the units of one environment.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::suite::TestUnit;
use crate::types::UnitRole;

/// Decides where suite setup and teardown units run within one
/// environment's unit sequence.
pub trait Surrounder: Send + Sync {
    /// Return `units` with setup/teardown units inserted. An empty input
    /// must produce an empty output.
    fn surround(&self, units: Vec<TestUnit>) -> Vec<TestUnit>;
}

/// Surrounder that inserts nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSurrounder;

impl Surrounder for NoopSurrounder {
    fn surround(&self, units: Vec<TestUnit>) -> Vec<TestUnit> {
        units
    }
}

/// Surrounds contiguous runs of units that name the same suite setup and
/// teardown.
///
/// For `[a(S,T), b(S,T), c, d(S,T)]` the result is
/// `[S, a, b, T, c, S, d, T]`. Fixture copies take the environment of the
/// unit they surround, so a setup shared by two environments runs once in
/// each.
#[derive(Debug, Clone, Default)]
pub struct FixtureSurrounder {
    fixtures: HashMap<String, TestUnit>,
}

impl FixtureSurrounder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect every suite setup/teardown unit in `units` by name.
    pub fn from_units(units: &[TestUnit]) -> Self {
        let fixtures = units
            .iter()
            .filter(|u| u.is_suite_fixture())
            .map(|u| (u.name.clone(), u.clone()))
            .collect();
        Self { fixtures }
    }

    pub fn with_fixture(mut self, fixture: TestUnit) -> Self {
        self.fixtures.insert(fixture.name.clone(), fixture);
        self
    }

    fn fixture_for(&self, name: &str, role: UnitRole, owner: &TestUnit) -> Option<TestUnit> {
        match self.fixtures.get(name) {
            Some(fixture) if fixture.role == role => {
                let mut copy = fixture.clone();
                copy.environment = owner.environment.clone();
                Some(copy)
            }
            Some(fixture) => {
                warn!(
                    unit = %owner.name,
                    fixture = %name,
                    expected = %role,
                    actual = %fixture.role,
                    "fixture has the wrong role; not inserting it"
                );
                None
            }
            None => {
                warn!(unit = %owner.name, fixture = %name, "unknown fixture; not inserting it");
                None
            }
        }
    }

    fn push_run(&self, run: &mut Vec<TestUnit>, out: &mut Vec<TestUnit>) {
        let Some(first) = run.first() else {
            return;
        };

        let setup = first
            .setup
            .as_deref()
            .and_then(|name| self.fixture_for(name, UnitRole::SuiteSetup, first));
        let teardown = first
            .teardown
            .as_deref()
            .and_then(|name| self.fixture_for(name, UnitRole::SuiteTeardown, first));

        if let Some(setup) = setup {
            debug!(setup = %setup.name, units = run.len(), "inserting suite setup");
            out.push(setup);
        }
        out.append(run);
        if let Some(teardown) = teardown {
            debug!(teardown = %teardown.name, "inserting suite teardown");
            out.push(teardown);
        }
    }
}

impl Surrounder for FixtureSurrounder {
    fn surround(&self, units: Vec<TestUnit>) -> Vec<TestUnit> {
        let mut out = Vec::with_capacity(units.len());
        let mut run: Vec<TestUnit> = Vec::new();

        for unit in units {
            let same_fixtures = run
                .first()
                .is_some_and(|head| head.setup == unit.setup && head.teardown == unit.teardown);
            if !same_fixtures {
                self.push_run(&mut run, &mut out);
            }
            run.push(unit);
        }
        self.push_run(&mut run, &mut out);

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suite::EnvironmentDescriptor;

    fn env(kind: &str) -> EnvironmentDescriptor {
        EnvironmentDescriptor::new(kind, "worker")
    }

    fn surrounder() -> FixtureSurrounder {
        FixtureSurrounder::new()
            .with_fixture(TestUnit::new("S", "S.txt", env("any")).with_role(UnitRole::SuiteSetup))
            .with_fixture(TestUnit::new("T", "T.txt", env("any")).with_role(UnitRole::SuiteTeardown))
    }

    fn names(units: &[TestUnit]) -> Vec<&str> {
        units.iter().map(|u| u.name.as_str()).collect()
    }

    #[test]
    fn surrounds_each_contiguous_run() {
        let units = vec![
            TestUnit::new("a", "a", env("x")).with_setup("S").with_teardown("T"),
            TestUnit::new("b", "b", env("x")).with_setup("S").with_teardown("T"),
            TestUnit::new("c", "c", env("x")),
            TestUnit::new("d", "d", env("x")).with_setup("S").with_teardown("T"),
        ];

        let out = surrounder().surround(units);

        assert_eq!(names(&out), vec!["S", "a", "b", "T", "c", "S", "d", "T"]);
    }

    #[test]
    fn fixture_copies_take_the_group_environment() {
        let units = vec![TestUnit::new("a", "a", env("x")).with_setup("S")];

        let out = surrounder().surround(units);

        assert_eq!(names(&out), vec!["S", "a"]);
        assert_eq!(out[0].environment, env("x"));
    }

    #[test]
    fn empty_input_stays_empty() {
        assert!(surrounder().surround(Vec::new()).is_empty());
    }

    #[test]
    fn unknown_or_mismatched_fixtures_are_skipped() {
        let units = vec![
            TestUnit::new("a", "a", env("x")).with_setup("Missing"),
            TestUnit::new("b", "b", env("x")).with_setup("T"),
        ];

        let out = surrounder().surround(units);

        assert_eq!(names(&out), vec!["a", "b"]);
    }

    #[test]
    fn from_units_collects_only_fixtures() {
        let units = vec![
            TestUnit::new("S", "S", env("x")).with_role(UnitRole::SuiteSetup),
            TestUnit::new("a", "a", env("x")).with_setup("S"),
            TestUnit::new("b", "b", env("x")).with_setup("a"),
        ];

        let out = FixtureSurrounder::from_units(&units).surround(units[1..].to_vec());

        assert_eq!(names(&out), vec!["S", "a", "b"]);
    }
}
