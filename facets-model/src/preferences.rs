//! Field visibility preferences attached to a section's profile record.
//!
//! The live form is a field-name → visible map. The server persists it as a
//! JSON object string on the record, one key per field, so per-field
//! granularity survives the round trip.

use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use crate::error::{ModelError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct PreferenceMap(BTreeMap<String, bool>);

impl PreferenceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<bool> {
        self.0.get(field).copied()
    }

    pub fn set(&mut self, field: impl Into<String>, visible: bool) {
        self.0.insert(field.into(), visible);
    }

    pub fn with(mut self, field: impl Into<String>, visible: bool) -> Self {
        self.set(field, visible);
        self
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Returns `base` with every entry of `self` written over it.
    pub fn overlaid_on(&self, base: &PreferenceMap) -> PreferenceMap {
        let mut merged = base.clone();
        for (field, visible) in self.iter() {
            merged.set(field, visible);
        }
        merged
    }

    #[cfg(feature = "serde")]
    pub fn serialize(&self) -> SerializedPreferences {
        // A string-keyed map of booleans cannot fail to serialize.
        SerializedPreferences(
            serde_json::to_string(&self.0).unwrap_or_else(|_| "{}".into()),
        )
    }

    #[cfg(feature = "serde")]
    pub fn deserialize(raw: &SerializedPreferences) -> Result<Self> {
        if raw.0.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(&raw.0)
            .map(PreferenceMap)
            .map_err(|e| ModelError::InvalidPreferences(e.to_string()))
    }
}

impl FromIterator<(String, bool)> for PreferenceMap {
    fn from_iter<T: IntoIterator<Item = (String, bool)>>(iter: T) -> Self {
        PreferenceMap(iter.into_iter().collect())
    }
}

/// Wire form of a [`PreferenceMap`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct SerializedPreferences(pub String);

impl SerializedPreferences {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
