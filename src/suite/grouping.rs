// src/suite/grouping.rs

//! Partitioning of a unit list by execution environment.

use indexmap::IndexMap;
use tracing::debug;

use crate::suite::surround::Surrounder;
use crate::suite::{EnvironmentDescriptor, TestUnit};

/// Units of one run grouped by the environment they need.
///
/// Groups are kept in the order their descriptor was first encountered in
/// the input, and units keep their input order within a group. Both orders
/// are the scheduling order.
#[derive(Debug, Clone, Default)]
pub struct UnitGroups {
    groups: IndexMap<EnvironmentDescriptor, Vec<TestUnit>>,
    /// Number of grouped units before any setup/teardown was spliced in.
    scheduled: usize,
}

impl UnitGroups {
    /// Group `units`, leaving out suite setup/teardown fixtures; those only
    /// run where a surrounder puts them.
    ///
    /// `debug` forces the debug flag on every descriptor.
    pub fn from_units(units: &[TestUnit], debug: bool) -> Self {
        let mut groups: IndexMap<EnvironmentDescriptor, Vec<TestUnit>> = IndexMap::new();
        let mut scheduled = 0;

        for unit in units.iter().filter(|u| !u.is_suite_fixture()) {
            let descriptor = if debug {
                unit.environment.with_debug(true)
            } else {
                unit.environment.clone()
            };

            let mut unit = unit.clone();
            unit.environment = descriptor.clone();
            groups.entry(descriptor).or_default().push(unit);
            scheduled += 1;
        }

        debug!(groups = groups.len(), units = scheduled, "grouped units by environment");

        Self { groups, scheduled }
    }

    /// Let `surrounder` splice setup/teardown units into every group.
    pub fn surround_with(&mut self, surrounder: &dyn Surrounder) {
        for units in self.groups.values_mut() {
            let grouped = std::mem::take(units);
            *units = surrounder.surround(grouped);
        }
    }

    /// Number of units announced for the run: grouped tests, not counting
    /// anything a surrounder inserted.
    pub fn scheduled_count(&self) -> usize {
        self.scheduled
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EnvironmentDescriptor, &[TestUnit])> {
        self.groups.iter().map(|(d, u)| (d, u.as_slice()))
    }
}

impl IntoIterator for UnitGroups {
    type Item = (EnvironmentDescriptor, Vec<TestUnit>);
    type IntoIter = indexmap::map::IntoIter<EnvironmentDescriptor, Vec<TestUnit>>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.into_iter()
    }
}
