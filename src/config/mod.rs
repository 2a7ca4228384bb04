// src/config/mod.rs

//! Run plan loading and validation for suiterun.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a plan file from disk (`loader.rs`).
//! - Validate references between units and environments (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_plan_path, load_and_validate, load_from_path};
pub use model::{ConfigSection, EnvironmentConfig, PlanFile, RawPlanFile, UnitConfig};
