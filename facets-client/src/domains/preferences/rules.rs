//! Declarative coupling between preference fields.
//!
//! A rule says "when `field` is set, also set `affects` to a value derived
//! from it". Rules are evaluated inside the optimistic apply, before any
//! commit, so the server always receives an already-coupled map.

use std::collections::HashSet;

use facets_model::PreferenceMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Coupling {
    /// `affects` mirrors the new value
    Same,
    /// `affects` takes the opposite value
    Inverse,
    /// `affects` is forced on when the field turns on, left alone otherwise
    EnableWith,
    /// `affects` is forced off when the field turns off, left alone otherwise
    DisableWith,
}

impl Coupling {
    fn value_for(self, value: bool) -> Option<bool> {
        match self {
            Coupling::Same => Some(value),
            Coupling::Inverse => Some(!value),
            Coupling::EnableWith => value.then_some(true),
            Coupling::DisableWith => (!value).then_some(false),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouplingRule {
    pub field: String,
    pub affects: String,
    pub coupling: Coupling,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PreferenceRules {
    rules: Vec<CouplingRule>,
}

impl PreferenceRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn couple(
        mut self,
        field: impl Into<String>,
        affects: impl Into<String>,
        coupling: Coupling,
    ) -> Self {
        self.rules.push(CouplingRule {
            field: field.into(),
            affects: affects.into(),
            coupling,
        });
        self
    }

    pub fn rules(&self) -> &[CouplingRule] {
        &self.rules
    }

    /// Set `field` and propagate through the rule table.
    ///
    /// Each field is written at most once per call, which keeps cyclic
    /// tables from looping.
    pub fn set(&self, map: &mut PreferenceMap, field: &str, value: bool) {
        let mut visited = HashSet::new();
        let mut queue = vec![(field.to_string(), value)];

        while let Some((field, value)) = queue.pop() {
            if !visited.insert(field.clone()) {
                continue;
            }
            map.set(field.clone(), value);
            for rule in self.rules.iter().filter(|r| r.field == field) {
                if let Some(derived) = rule.coupling.value_for(value) {
                    queue.push((rule.affects.clone(), derived));
                }
            }
        }
    }

    /// Fields a write to `field` may touch, `field` included.
    pub fn affected_by(&self, field: &str) -> Vec<String> {
        let mut seen = vec![field.to_string()];
        let mut i = 0;
        while i < seen.len() {
            let current = seen[i].clone();
            for rule in self.rules.iter().filter(|r| r.field == current) {
                if !seen.contains(&rule.affects) {
                    seen.push(rule.affects.clone());
                }
            }
            i += 1;
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_and_inverse_rules_follow_the_trigger() {
        let rules = PreferenceRules::new()
            .couple("show_photos", "show_primary_photo", Coupling::Same)
            .couple("anonymous", "show_name", Coupling::Inverse);
        let mut map = PreferenceMap::new();

        rules.set(&mut map, "show_photos", false);
        rules.set(&mut map, "anonymous", true);

        assert_eq!(map.get("show_photos"), Some(false));
        assert_eq!(map.get("show_primary_photo"), Some(false));
        assert_eq!(map.get("anonymous"), Some(true));
        assert_eq!(map.get("show_name"), Some(false));
    }

    #[test]
    fn one_sided_rules_only_fire_in_their_direction() {
        let rules = PreferenceRules::new()
            .couple("show_employer", "show_title", Coupling::EnableWith);
        let mut map = PreferenceMap::new().with("show_title", false);

        rules.set(&mut map, "show_employer", false);
        assert_eq!(map.get("show_title"), Some(false));

        rules.set(&mut map, "show_employer", true);
        assert_eq!(map.get("show_title"), Some(true));
    }

    #[test]
    fn cyclic_tables_terminate_and_keep_the_trigger_value() {
        let rules = PreferenceRules::new()
            .couple("a", "b", Coupling::Inverse)
            .couple("b", "a", Coupling::Inverse);
        let mut map = PreferenceMap::new();

        rules.set(&mut map, "a", true);
        assert_eq!(map.get("a"), Some(true));
        assert_eq!(map.get("b"), Some(false));
        assert_eq!(rules.affected_by("a"), vec!["a".to_string(), "b".to_string()]);
    }
}
