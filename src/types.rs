use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// What a unit is for within its suite.
///
/// - `Test`: an ordinary unit, scheduled on its environment.
/// - `SuiteSetup` / `SuiteTeardown`: fixtures that are never scheduled on
///   their own; the surrounder splices them around the tests that reference
///   them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitRole {
    Test,
    SuiteSetup,
    SuiteTeardown,
}

impl UnitRole {
    pub fn is_suite_fixture(self) -> bool {
        matches!(self, UnitRole::SuiteSetup | UnitRole::SuiteTeardown)
    }
}

impl Default for UnitRole {
    fn default() -> Self {
        UnitRole::Test
    }
}

impl fmt::Display for UnitRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UnitRole::Test => "test",
            UnitRole::SuiteSetup => "suite_setup",
            UnitRole::SuiteTeardown => "suite_teardown",
        };
        f.write_str(s)
    }
}

impl FromStr for UnitRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "test" => Ok(UnitRole::Test),
            "suite_setup" => Ok(UnitRole::SuiteSetup),
            "suite_teardown" => Ok(UnitRole::SuiteTeardown),
            other => Err(format!(
                "invalid unit role: {other} (expected \"test\", \"suite_setup\" or \"suite_teardown\")"
            )),
        }
    }
}

/// Verdict of a single assertion checked inside a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssertionOutcome {
    Right,
    Wrong,
    Ignore,
}

impl fmt::Display for AssertionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AssertionOutcome::Right => "right",
            AssertionOutcome::Wrong => "wrong",
            AssertionOutcome::Ignore => "ignore",
        };
        f.write_str(s)
    }
}

impl FromStr for AssertionOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "right" => Ok(AssertionOutcome::Right),
            "wrong" => Ok(AssertionOutcome::Wrong),
            "ignore" => Ok(AssertionOutcome::Ignore),
            other => Err(format!(
                "invalid assertion outcome: {other} (expected \"right\", \"wrong\" or \"ignore\")"
            )),
        }
    }
}
