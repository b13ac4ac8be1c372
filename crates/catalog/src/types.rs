//! Property values and diff computation
//!
//! Desired state is expressed as a map of property name to value. The diff
//! between a probed current state and the desired state is the unit of work
//! a reconciler is asked to perform, and the unit of change a report records.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single property value on a resource
///
/// Kept deliberately small: resource attributes in practice are booleans,
/// numbers, strings, or lists of strings ("ensure => running",
/// "members => [a, b]").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    /// Boolean value
    Bool(bool),
    /// Integer value
    Int(i64),
    /// String value
    Str(String),
    /// List of strings
    List(Vec<String>),
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Str(s) => write!(f, "{s}"),
            Self::List(items) => write!(f, "[{}]", items.join(", ")),
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<Vec<String>> for PropertyValue {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

/// Mapping of property name to value
///
/// A `BTreeMap` so iteration (and therefore diff and report output) is
/// deterministic.
pub type PropertyMap = BTreeMap<String, PropertyValue>;

/// One observed difference between current and desired state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyChange {
    /// Property name
    pub property: String,
    /// Value before the change, if the property was set at all
    pub old: Option<PropertyValue>,
    /// Desired value
    pub new: PropertyValue,
}

impl fmt::Display for PropertyChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.old {
            Some(old) => write!(f, "{}: {} -> {}", self.property, old, self.new),
            None => write!(f, "{}: (unset) -> {}", self.property, self.new),
        }
    }
}

/// Compute the changes needed to move `current` to `desired`
///
/// One change per desired property whose current value is missing or
/// different. Properties present in `current` but absent from `desired` are
/// unmanaged and left alone: desired state is a partial description.
pub fn compute_diff(current: &PropertyMap, desired: &PropertyMap) -> Vec<PropertyChange> {
    desired
        .iter()
        .filter(|(name, want)| current.get(*name) != Some(want))
        .map(|(name, want)| PropertyChange {
            property: name.clone(),
            old: current.get(name).cloned(),
            new: want.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, &str)]) -> PropertyMap {
        entries
            .iter()
            .map(|(k, v)| ((*k).to_string(), PropertyValue::from(*v)))
            .collect()
    }

    #[test]
    fn diff_of_identical_states_is_empty() {
        let state = map(&[("ensure", "running"), ("enable", "true")]);
        assert!(compute_diff(&state, &state).is_empty());
    }

    #[test]
    fn diff_reports_missing_and_differing_properties() {
        let current = map(&[("ensure", "stopped")]);
        let desired = map(&[("ensure", "running"), ("enable", "true")]);

        let changes = compute_diff(&current, &desired);
        assert_eq!(changes.len(), 2);

        // BTreeMap iteration: "enable" before "ensure"
        assert_eq!(changes[0].property, "enable");
        assert_eq!(changes[0].old, None);
        assert_eq!(changes[1].property, "ensure");
        assert_eq!(changes[1].old, Some(PropertyValue::from("stopped")));
        assert_eq!(changes[1].new, PropertyValue::from("running"));
    }

    #[test]
    fn unmanaged_current_properties_are_ignored() {
        let current = map(&[("ensure", "present"), ("owner", "root")]);
        let desired = map(&[("ensure", "present")]);
        assert!(compute_diff(&current, &desired).is_empty());
    }

    #[test]
    fn property_change_display() {
        let change = PropertyChange {
            property: "ensure".into(),
            old: Some(PropertyValue::from("stopped")),
            new: PropertyValue::from("running"),
        };
        assert_eq!(change.to_string(), "ensure: stopped -> running");
    }
}
