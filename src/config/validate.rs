// src/config/validate.rs

use std::collections::HashMap;

use crate::config::model::{PlanFile, RawPlanFile, UnitConfig};
use crate::errors::{Result, SuiterunError};
use crate::types::UnitRole;

impl TryFrom<RawPlanFile> for PlanFile {
    type Error = SuiterunError;

    fn try_from(raw: RawPlanFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_plan(&raw)?;
        Ok(PlanFile::new_unchecked(raw.config, raw.environment, raw.unit))
    }
}

fn validate_raw_plan(plan: &RawPlanFile) -> Result<()> {
    ensure_has_units(plan)?;
    validate_global_config(plan)?;
    validate_environments(plan)?;
    validate_units(plan)?;
    validate_fixture_references(plan)?;
    Ok(())
}

fn config_error(msg: impl Into<String>) -> SuiterunError {
    SuiterunError::ConfigError(msg.into())
}

fn ensure_has_units(plan: &RawPlanFile) -> Result<()> {
    if plan.unit.is_empty() {
        return Err(config_error("plan must contain at least one [[unit]] entry"));
    }
    Ok(())
}

fn validate_global_config(plan: &RawPlanFile) -> Result<()> {
    if plan.config.poll_interval_ms == 0 {
        return Err(config_error("[config].poll_interval_ms must be >= 1 (got 0)"));
    }
    if plan.config.shutdown_timeout_ms == 0 {
        return Err(config_error(
            "[config].shutdown_timeout_ms must be >= 1 (got 0)",
        ));
    }
    Ok(())
}

fn validate_environments(plan: &RawPlanFile) -> Result<()> {
    for (name, env) in plan.environment.iter() {
        if env.kind.trim().is_empty() {
            return Err(config_error(format!(
                "environment '{name}' has an empty `kind`"
            )));
        }
    }
    Ok(())
}

fn validate_units(plan: &RawPlanFile) -> Result<()> {
    let mut seen: HashMap<&str, usize> = HashMap::new();

    for (idx, unit) in plan.unit.iter().enumerate() {
        if unit.name.trim().is_empty() {
            return Err(config_error(format!("unit #{} has an empty `name`", idx + 1)));
        }
        if let Some(first) = seen.insert(unit.name.as_str(), idx) {
            return Err(config_error(format!(
                "unit name '{}' is used by entries #{} and #{}",
                unit.name,
                first + 1,
                idx + 1
            )));
        }
        if !plan.environment.contains_key(&unit.environment) {
            return Err(config_error(format!(
                "unit '{}' refers to unknown environment '{}'",
                unit.name, unit.environment
            )));
        }
    }
    Ok(())
}

fn validate_fixture_references(plan: &RawPlanFile) -> Result<()> {
    let by_name: HashMap<&str, &UnitConfig> =
        plan.unit.iter().map(|u| (u.name.as_str(), u)).collect();

    for unit in plan.unit.iter() {
        let refs = [
            ("setup", unit.setup.as_deref(), UnitRole::SuiteSetup),
            ("teardown", unit.teardown.as_deref(), UnitRole::SuiteTeardown),
        ];

        for (field, target, expected) in refs {
            let Some(target) = target else { continue };

            if unit.role.is_suite_fixture() {
                return Err(config_error(format!(
                    "{} unit '{}' cannot have a `{field}`",
                    unit.role, unit.name
                )));
            }

            match by_name.get(target) {
                None => {
                    return Err(config_error(format!(
                        "unit '{}' has unknown {field} '{target}'",
                        unit.name
                    )));
                }
                Some(fixture) if fixture.role != expected => {
                    return Err(config_error(format!(
                        "unit '{}' names '{target}' as {field}, but its role is {} (expected {expected})",
                        unit.name, fixture.role
                    )));
                }
                Some(_) => {}
            }
        }
    }
    Ok(())
}
