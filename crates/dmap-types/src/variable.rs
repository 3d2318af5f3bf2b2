use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a variable inside the model that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VariableId(pub usize);

impl VariableId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for VariableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The domain of a random variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariableKind {
    /// Takes the category indices `0..cardinality`.
    Discrete { cardinality: usize },
    /// Takes any real value.
    Continuous,
}

/// A random variable of a Bayesian network.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Variable {
    id: VariableId,
    name: String,
    kind: VariableKind,
}

impl Variable {
    pub fn new(id: VariableId, name: impl Into<String>, kind: VariableKind) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
        }
    }

    pub fn id(&self) -> VariableId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> VariableKind {
        self.kind
    }

    /// Number of states, or `None` for continuous variables.
    pub fn cardinality(&self) -> Option<usize> {
        match self.kind {
            VariableKind::Discrete { cardinality } => Some(cardinality),
            VariableKind::Continuous => None,
        }
    }

    pub fn is_discrete(&self) -> bool {
        matches!(self.kind, VariableKind::Discrete { .. })
    }

    /// Check whether `value` lies in this variable's domain.
    pub fn admits(&self, value: f64) -> bool {
        match self.kind {
            VariableKind::Discrete { cardinality } => {
                value >= 0.0 && value.fract() == 0.0 && (value as usize) < cardinality
            }
            VariableKind::Continuous => value.is_finite(),
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
