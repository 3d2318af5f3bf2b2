use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::variable::VariableId;

/// A (partial) assignment of values to variables.
///
/// Discrete variables hold their category index as a whole number, continuous
/// variables hold the real value. The same type carries evidence (read-only
/// input to a run) and estimates (the output of a search).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    values: BTreeMap<VariableId, f64>,
}

impl Assignment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the value of `var`, returning the previous value if there was one.
    pub fn set(&mut self, var: VariableId, value: f64) -> Option<f64> {
        self.values.insert(var, value)
    }

    /// Set a discrete category index.
    pub fn set_state(&mut self, var: VariableId, state: usize) -> Option<f64> {
        self.set(var, state as f64)
    }

    pub fn with(mut self, var: VariableId, value: f64) -> Self {
        self.set(var, value);
        self
    }

    pub fn get(&self, var: VariableId) -> Option<f64> {
        self.values.get(&var).copied()
    }

    /// Value of `var` interpreted as a category index.
    pub fn state(&self, var: VariableId) -> Option<usize> {
        self.get(var).map(|v| v as usize)
    }

    pub fn contains(&self, var: VariableId) -> bool {
        self.values.contains_key(&var)
    }

    pub fn remove(&mut self, var: VariableId) -> Option<f64> {
        self.values.remove(&var)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn variables(&self) -> impl Iterator<Item = VariableId> + '_ {
        self.values.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (VariableId, f64)> + '_ {
        self.values.iter().map(|(k, v)| (*k, *v))
    }

    /// Copy of this assignment keeping only the given variables.
    pub fn restrict(&self, vars: &[VariableId]) -> Assignment {
        let values = vars
            .iter()
            .filter_map(|v| self.values.get(v).map(|val| (*v, *val)))
            .collect();
        Assignment { values }
    }

    /// Union of two assignments. Values from `other` win on shared keys.
    pub fn merged(&self, other: &Assignment) -> Assignment {
        let mut values = self.values.clone();
        values.extend(other.values.iter().map(|(k, v)| (*k, *v)));
        Assignment { values }
    }
}

impl FromIterator<(VariableId, f64)> for Assignment {
    fn from_iter<I: IntoIterator<Item = (VariableId, f64)>>(iter: I) -> Self {
        Assignment {
            values: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get() {
        let mut a = Assignment::new();
        assert!(a.is_empty());
        assert_eq!(a.set_state(VariableId(1), 2), None);
        assert_eq!(a.set(VariableId(1), 0.0), Some(2.0));
        a.set(VariableId(3), -1.5);

        assert_eq!(a.len(), 2);
        assert_eq!(a.state(VariableId(1)), Some(0));
        assert_eq!(a.get(VariableId(3)), Some(-1.5));
        assert_eq!(a.get(VariableId(2)), None);
        assert_eq!(a.remove(VariableId(3)), Some(-1.5));
        assert!(!a.contains(VariableId(3)));
    }

    #[test]
    fn restrict_keeps_only_requested() {
        let a = Assignment::new()
            .with(VariableId(0), 1.0)
            .with(VariableId(1), 0.0)
            .with(VariableId(2), 1.0);

        let r = a.restrict(&[VariableId(2), VariableId(0), VariableId(7)]);
        assert_eq!(r.len(), 2);
        assert_eq!(r.get(VariableId(0)), Some(1.0));
        assert_eq!(r.get(VariableId(2)), Some(1.0));
        assert!(!r.contains(VariableId(1)));
    }

    #[test]
    fn merge_prefers_other() {
        let evidence = Assignment::new().with(VariableId(0), 1.0);
        let estimate = Assignment::new().with(VariableId(1), 0.0);

        let joint = estimate.merged(&evidence);
        assert_eq!(joint.len(), 2);
        assert_eq!(joint.get(VariableId(0)), Some(1.0));

        let clash = Assignment::new().with(VariableId(0), 0.0);
        assert_eq!(evidence.merged(&clash).get(VariableId(0)), Some(0.0));
    }

    #[test]
    fn iteration_is_ordered_by_id() {
        let a: Assignment = vec![(VariableId(5), 1.0), (VariableId(2), 0.0)]
            .into_iter()
            .collect();
        let ids: Vec<_> = a.variables().collect();
        assert_eq!(ids, vec![VariableId(2), VariableId(5)]);
    }
}
