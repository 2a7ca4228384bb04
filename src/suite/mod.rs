// src/suite/mod.rs

//! Test units, environments and how a unit list becomes a schedule.
//!
//! - [`descriptor`] identifies an execution environment.
//! - [`unit`] holds test units and what a worker reports while running one.
//! - [`grouping`] partitions units by environment in scheduling order.
//! - [`surround`] splices suite setup/teardown units around grouped units.

pub mod descriptor;
pub mod grouping;
pub mod surround;
pub mod unit;

pub use descriptor::EnvironmentDescriptor;
pub use grouping::UnitGroups;
pub use surround::{FixtureSurrounder, NoopSurrounder, Surrounder};
pub use unit::{Assertion, TestSummary, TestUnit};
