//! Parameter patches and overrides
//!
//! A patch is an ordered list of `(parameter index, normalized value)` pairs.
//! Overrides sit on top of it and win for any index they share.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Ordered parameter assignments; later duplicates win when applied
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Patch {
    params: Vec<(usize, f32)>,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, f32)> + '_ {
        self.params.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Effective value for `index`, honoring last-write-wins
    pub fn get(&self, index: usize) -> Option<f32> {
        self.params
            .iter()
            .rev()
            .find(|(i, _)| *i == index)
            .map(|(_, v)| *v)
    }

    /// This patch with `overrides` substituted for shared indices
    ///
    /// Overrides for indices the patch doesn't list are dropped, and the
    /// result doesn't record which entries were overridden.
    pub fn with_overrides(&self, overrides: &ParameterOverrides) -> Patch {
        if overrides.is_empty() {
            return self.clone();
        }
        self.params
            .iter()
            .map(|&(index, value)| (index, overrides.get(index).unwrap_or(value)))
            .collect()
    }
}

impl From<Vec<(usize, f32)>> for Patch {
    fn from(params: Vec<(usize, f32)>) -> Self {
        Self { params }
    }
}

impl FromIterator<(usize, f32)> for Patch {
    fn from_iter<I: IntoIterator<Item = (usize, f32)>>(iter: I) -> Self {
        Self {
            params: iter.into_iter().collect(),
        }
    }
}

/// Sparse per-index replacements layered over a patch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterOverrides {
    values: BTreeMap<usize, f32>,
}

impl ParameterOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the override for `index`
    pub fn set(&mut self, index: usize, value: f32) {
        self.values.insert(index, value);
    }

    /// Remove the override for `index`, returning it if there was one
    pub fn remove(&mut self, index: usize) -> Option<f32> {
        self.values.remove(&index)
    }

    pub fn get(&self, index: usize) -> Option<f32> {
        self.values.get(&index).copied()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_precedence() {
        let patch = Patch::from(vec![(0, 0.2), (1, 0.5)]);
        let mut overrides = ParameterOverrides::new();
        overrides.set(0, 0.9);

        let effective = patch.with_overrides(&overrides);
        assert_eq!(effective.get(0), Some(0.9));
        assert_eq!(effective.get(1), Some(0.5));
        assert_eq!(effective.len(), 2);
    }

    #[test]
    fn test_override_for_missing_index_is_dropped() {
        let patch = Patch::from(vec![(3, 0.1)]);
        let mut overrides = ParameterOverrides::new();
        overrides.set(7, 0.4);

        let effective = patch.with_overrides(&overrides);
        assert_eq!(effective, patch);
        assert_eq!(effective.get(7), None);
    }

    #[test]
    fn test_duplicates_last_wins() {
        let patch = Patch::from(vec![(2, 0.1), (5, 0.3), (2, 0.8)]);
        assert_eq!(patch.get(2), Some(0.8));

        // Overrides replace every occurrence, order preserved
        let mut overrides = ParameterOverrides::new();
        overrides.set(2, 0.0);
        let effective: Vec<(usize, f32)> = patch.with_overrides(&overrides).iter().collect();
        assert_eq!(effective, vec![(2, 0.0), (5, 0.3), (2, 0.0)]);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut overrides = ParameterOverrides::new();
        overrides.set(1, 0.5);
        overrides.set(1, 0.6);
        assert_eq!(overrides.len(), 1);
        assert_eq!(overrides.remove(1), Some(0.6));
        assert_eq!(overrides.remove(1), None);
        assert!(overrides.is_empty());
    }

    #[test]
    fn test_patch_json_shape() {
        let patch: Patch = serde_json::from_str("[[0, 0.25], [4, 1.0]]").unwrap();
        assert_eq!(patch.iter().collect::<Vec<_>>(), vec![(0, 0.25), (4, 1.0)]);
        assert_eq!(serde_json::to_string(&patch).unwrap(), "[[0,0.25],[4,1.0]]");
    }
}
