//! In-memory parameter values of a model.

use crate::codec::Value;
use crate::registry::{Registry, UnknownParameter};

/// Values of one group, in catalogue order.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedGroup {
    pub name: &'static str,
    values: Vec<(&'static str, Value)>,
}

impl AppliedGroup {
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Value)> {
        self.values.iter().map(|(name, value)| (*name, value))
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, value)| value)
    }

    fn slot(&mut self, name: &str) -> Option<&mut Value> {
        self.values
            .iter_mut()
            .find(|(n, _)| *n == name)
            .map(|(_, value)| value)
    }
}

/// The applied value of every cataloged parameter.
///
/// Starts out at the registry defaults and is overwritten from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedParameters {
    groups: Vec<AppliedGroup>,
}

impl AppliedParameters {
    pub fn from_registry(registry: &Registry) -> Self {
        let groups = registry
            .groups()
            .map(|group| AppliedGroup {
                name: group.name,
                values: group
                    .parameters()
                    .map(|(name, spec)| (name, spec.default_value().clone()))
                    .collect(),
            })
            .collect();
        Self { groups }
    }

    pub fn groups(&self) -> impl Iterator<Item = &AppliedGroup> {
        self.groups.iter()
    }

    pub fn group(&self, name: &str) -> Option<&AppliedGroup> {
        self.groups.iter().find(|g| g.name == name)
    }

    pub fn value(&self, group: &str, name: &str) -> Result<&Value, UnknownParameter> {
        self.group(group)
            .and_then(|g| g.get(name))
            .ok_or_else(|| UnknownParameter::new(group, name))
    }

    /// Overwrite one value. Only cataloged parameters exist here.
    pub fn set(&mut self, group: &str, name: &str, value: Value) -> Result<(), UnknownParameter> {
        let slot = self
            .groups
            .iter_mut()
            .find(|g| g.name == group)
            .and_then(|g| g.slot(name))
            .ok_or_else(|| UnknownParameter::new(group, name))?;
        *slot = value;
        Ok(())
    }
}
