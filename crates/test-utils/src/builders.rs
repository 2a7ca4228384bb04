#![allow(dead_code)]

use std::collections::BTreeMap;

use suiterun::config::{ConfigSection, EnvironmentConfig, PlanFile, RawPlanFile, UnitConfig};
use suiterun::suite::{EnvironmentDescriptor, TestUnit};
use suiterun::types::UnitRole;

/// Descriptor of kind `kind` whose command is `"<kind>-worker"`.
pub fn env(kind: &str) -> EnvironmentDescriptor {
    EnvironmentDescriptor::new(kind, format!("{kind}-worker"))
}

/// Plain test unit named `name` on environment `kind`.
pub fn unit(name: &str, kind: &str) -> TestUnit {
    TestUnit::new(name, format!("{name}.txt"), env(kind))
}

pub fn setup(name: &str, kind: &str) -> TestUnit {
    unit(name, kind).with_role(UnitRole::SuiteSetup)
}

pub fn teardown(name: &str, kind: &str) -> TestUnit {
    unit(name, kind).with_role(UnitRole::SuiteTeardown)
}

/// Builder for `PlanFile` to simplify test setup.
pub struct PlanFileBuilder {
    plan: RawPlanFile,
}

impl PlanFileBuilder {
    pub fn new() -> Self {
        Self {
            plan: RawPlanFile {
                config: ConfigSection::default(),
                environment: BTreeMap::new(),
                unit: Vec::new(),
            },
        }
    }

    pub fn with_environment(mut self, name: &str, command: &str) -> Self {
        self.plan.environment.insert(
            name.to_string(),
            EnvironmentConfig {
                kind: name.to_string(),
                command: command.to_string(),
                debug: false,
            },
        );
        self
    }

    pub fn with_unit(mut self, unit: UnitConfigBuilder) -> Self {
        self.plan.unit.push(unit.build());
        self
    }

    pub fn with_shutdown_timeout_ms(mut self, ms: u64) -> Self {
        self.plan.config.shutdown_timeout_ms = ms;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.plan.config.debug = debug;
        self
    }

    pub fn build_raw(self) -> RawPlanFile {
        self.plan
    }

    pub fn build(self) -> PlanFile {
        PlanFile::try_from(self.plan).expect("Failed to build valid plan from builder")
    }
}

impl Default for PlanFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `UnitConfig`.
pub struct UnitConfigBuilder {
    unit: UnitConfig,
}

impl UnitConfigBuilder {
    pub fn new(name: &str, environment: &str) -> Self {
        Self {
            unit: UnitConfig {
                name: name.to_string(),
                source: format!("{name}.txt"),
                environment: environment.to_string(),
                role: UnitRole::Test,
                setup: None,
                teardown: None,
            },
        }
    }

    pub fn role(mut self, role: UnitRole) -> Self {
        self.unit.role = role;
        self
    }

    pub fn setup(mut self, name: &str) -> Self {
        self.unit.setup = Some(name.to_string());
        self
    }

    pub fn teardown(mut self, name: &str) -> Self {
        self.unit.teardown = Some(name.to_string());
        self
    }

    pub fn build(self) -> UnitConfig {
        self.unit
    }
}
