// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::engine::RunOptions;
use crate::suite::{EnvironmentDescriptor, FixtureSurrounder, TestUnit};
use crate::types::UnitRole;

/// Plan file as read from TOML, before validation.
///
/// ```toml
/// [config]
/// poll_interval_ms = 50
/// shutdown_timeout_ms = 5000
///
/// [environment.slim]
/// kind = "slim"
/// command = "python3 worker.py"
///
/// [[unit]]
/// name = "CheckOne"
/// source = "suite/CheckOne.txt"
/// environment = "slim"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPlanFile {
    /// Run behaviour from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// Environments from `[environment.<name>]`, keyed by the name units
    /// refer to.
    #[serde(default)]
    pub environment: BTreeMap<String, EnvironmentConfig>,

    /// Units from `[[unit]]`, in file order.
    #[serde(default)]
    pub unit: Vec<UnitConfig>,
}

/// A plan that passed validation. Build one with `PlanFile::try_from`.
#[derive(Debug, Clone)]
pub struct PlanFile {
    pub config: ConfigSection,
    pub environment: BTreeMap<String, EnvironmentConfig>,
    pub unit: Vec<UnitConfig>,
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// How long the drain wait may go without re-checking for results.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// How long a worker gets to exit after end of input.
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,

    /// Start every environment in debug mode.
    #[serde(default)]
    pub debug: bool,
}

fn default_poll_interval_ms() -> u64 {
    50
}

fn default_shutdown_timeout_ms() -> u64 {
    5000
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
            debug: false,
        }
    }
}

/// `[environment.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct EnvironmentConfig {
    /// Worker type, e.g. `"slim"`.
    pub kind: String,

    /// Shell command starting the worker. An empty command is allowed and
    /// makes the environment fail to start.
    #[serde(default)]
    pub command: String,

    #[serde(default)]
    pub debug: bool,
}

impl EnvironmentConfig {
    pub fn descriptor(&self) -> EnvironmentDescriptor {
        EnvironmentDescriptor::new(&self.kind, &self.command).with_debug(self.debug)
    }
}

/// `[[unit]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct UnitConfig {
    pub name: String,

    /// Opaque reference handed to the worker.
    pub source: String,

    /// Name of an `[environment.<name>]` section.
    pub environment: String,

    #[serde(default)]
    pub role: UnitRole,

    /// Suite setup unit to run before this one.
    #[serde(default)]
    pub setup: Option<String>,

    /// Suite teardown unit to run after this one.
    #[serde(default)]
    pub teardown: Option<String>,
}

impl PlanFile {
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        environment: BTreeMap<String, EnvironmentConfig>,
        unit: Vec<UnitConfig>,
    ) -> Self {
        Self {
            config,
            environment,
            unit,
        }
    }

    /// Every unit of the plan in file order, fixtures included.
    pub fn units(&self) -> Vec<TestUnit> {
        self.unit
            .iter()
            .filter_map(|u| {
                let env = self.environment.get(&u.environment)?;
                let mut unit =
                    TestUnit::new(&u.name, &u.source, env.descriptor()).with_role(u.role);
                unit.setup = u.setup.clone();
                unit.teardown = u.teardown.clone();
                Some(unit)
            })
            .collect()
    }

    /// Surrounder knowing every suite setup/teardown unit of the plan.
    pub fn surrounder(&self) -> FixtureSurrounder {
        FixtureSurrounder::from_units(&self.units())
    }

    /// Run options from `[config]`; `force_debug` comes from the CLI.
    pub fn run_options(&self, force_debug: bool) -> RunOptions {
        RunOptions {
            debug: self.config.debug || force_debug,
            poll_interval: Duration::from_millis(self.config.poll_interval_ms),
            shutdown_timeout: Duration::from_millis(self.config.shutdown_timeout_ms),
        }
    }
}
