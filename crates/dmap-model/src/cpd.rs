//! Conditional probability distributions.
//!
//! A [`Cpd`] describes `P(X | Pa(X))` for one variable. Parents are always
//! discrete, so both supported densities are tables indexed by the parent
//! configuration:
//!
//! * `Density::Table` holds one extra trailing axis for the states of `X`.
//! * `Density::Gaussian` holds a mean and a standard deviation per parent
//!   configuration.

use dmap_types::{Assignment, ModelError, Variable, VariableId};
use ndarray::{ArrayD, Axis, IxDyn};
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use rand_distr::Normal;

/// Alias f64 ndarray::ArrayD as Table
pub type Table = ArrayD<f64>;

const NORMALIZATION_TOLERANCE: f64 = 1e-6;
const LN_SQRT_2PI: f64 = 0.918_938_533_204_672_8;

#[derive(Debug, Clone, PartialEq)]
pub enum Density {
    /// Multinomial table, axes `[Pa_1, .., Pa_k, X]`.
    Table(Table),

    /// Normal distribution, both tables have axes `[Pa_1, .., Pa_k]`.
    Gaussian { means: Table, std_devs: Table },
}

/// The conditional distribution of a single variable given its parents.
#[derive(Debug, Clone, PartialEq)]
pub struct Cpd {
    variable: VariableId,
    parents: Vec<VariableId>,
    density: Density,
}

impl Cpd {
    /// Build a multinomial CPD and verify every row is a distribution.
    pub fn multinomial(child: &Variable, parents: &[&Variable], table: Table) -> Result<Self, ModelError> {
        let cardinality = child.cardinality().ok_or_else(|| ModelError::InvalidCpd {
            variable: child.name().to_string(),
            message: "a multinomial CPD needs a discrete variable".to_string(),
        })?;

        let mut shape = parent_shape(child, parents)?;
        shape.push(cardinality);
        check_shape(child, &table, &shape)?;

        if table.iter().any(|&p| p < 0.0 || p.is_nan()) {
            return Err(ModelError::NegativeProbability(child.name().to_string()));
        }

        for row in table.lanes(Axis(shape.len() - 1)) {
            let sum = row.sum();
            if (sum - 1.0).abs() > NORMALIZATION_TOLERANCE {
                return Err(ModelError::NotNormalized {
                    variable: child.name().to_string(),
                    sum,
                });
            }
        }

        Ok(Self {
            variable: child.id(),
            parents: parents.iter().map(|p| p.id()).collect(),
            density: Density::Table(table),
        })
    }

    /// Build a conditional Gaussian CPD.
    pub fn gaussian(
        child: &Variable,
        parents: &[&Variable],
        means: Table,
        std_devs: Table,
    ) -> Result<Self, ModelError> {
        if child.is_discrete() {
            return Err(ModelError::InvalidCpd {
                variable: child.name().to_string(),
                message: "a Gaussian CPD needs a continuous variable".to_string(),
            });
        }

        let shape = parent_shape(child, parents)?;
        check_shape(child, &means, &shape)?;
        check_shape(child, &std_devs, &shape)?;

        if let Some(&bad) = std_devs.iter().find(|&&s| !(s > 0.0 && s.is_finite())) {
            return Err(ModelError::InvalidStdDev {
                variable: child.name().to_string(),
                std_dev: bad,
            });
        }
        if means.iter().any(|m| !m.is_finite()) {
            return Err(ModelError::InvalidCpd {
                variable: child.name().to_string(),
                message: "means must be finite".to_string(),
            });
        }

        Ok(Self {
            variable: child.id(),
            parents: parents.iter().map(|p| p.id()).collect(),
            density: Density::Gaussian { means, std_devs },
        })
    }

    pub fn variable(&self) -> VariableId {
        self.variable
    }

    pub fn parents(&self) -> &[VariableId] {
        &self.parents
    }

    pub fn density(&self) -> &Density {
        &self.density
    }

    /// `ln P(x | pa)` for the values of the variable and its parents in
    /// `assignment`. Returns `-inf` for zero-probability states.
    pub fn log_density(&self, assignment: &Assignment) -> Result<f64, ModelError> {
        let value = assignment
            .get(self.variable)
            .ok_or(ModelError::IncompleteAssignment(self.variable))?;
        let mut idx = self.parent_states(assignment)?;

        match &self.density {
            Density::Table(table) => {
                idx.push(to_state(self.variable, value)?);
                let p = table
                    .get(IxDyn(&idx))
                    .ok_or(ModelError::ValueOutOfDomain { variable: self.variable, value })?;
                Ok(p.ln())
            }
            Density::Gaussian { means, std_devs } => {
                let (mean, std_dev) = self.normal_at(means, std_devs, &idx)?;
                if !value.is_finite() {
                    return Err(ModelError::ValueOutOfDomain { variable: self.variable, value });
                }
                let z = (value - mean) / std_dev;
                Ok(-0.5 * z * z - std_dev.ln() - LN_SQRT_2PI)
            }
        }
    }

    /// Draw a value for the variable given its parents' values in `assignment`.
    pub fn sample<R: Rng + ?Sized>(&self, assignment: &Assignment, rng: &mut R) -> Result<f64, ModelError> {
        let mut idx = self.parent_states(assignment)?;

        match &self.density {
            Density::Table(table) => {
                let cardinality = table.shape()[table.ndim() - 1];
                let mut weights = Vec::with_capacity(cardinality);
                for state in 0..cardinality {
                    idx.push(state);
                    weights.push(table[IxDyn(&idx)]);
                    idx.pop();
                }
                let dist = WeightedIndex::new(&weights).map_err(|e| ModelError::Sampling {
                    variable: self.variable,
                    message: e.to_string(),
                })?;
                Ok(dist.sample(rng) as f64)
            }
            Density::Gaussian { means, std_devs } => {
                let (mean, std_dev) = self.normal_at(means, std_devs, &idx)?;
                let normal = Normal::new(mean, std_dev).map_err(|e| ModelError::Sampling {
                    variable: self.variable,
                    message: e.to_string(),
                })?;
                Ok(normal.sample(rng))
            }
        }
    }

    fn parent_states(&self, assignment: &Assignment) -> Result<Vec<usize>, ModelError> {
        self.parents
            .iter()
            .map(|&p| {
                let value = assignment.get(p).ok_or(ModelError::IncompleteAssignment(p))?;
                to_state(p, value)
            })
            .collect()
    }

    fn normal_at(&self, means: &Table, std_devs: &Table, idx: &[usize]) -> Result<(f64, f64), ModelError> {
        let out_of_domain = || ModelError::ValueOutOfDomain {
            variable: self.variable,
            value: f64::NAN,
        };
        let mean = *means.get(IxDyn(idx)).ok_or_else(out_of_domain)?;
        let std_dev = *std_devs.get(IxDyn(idx)).ok_or_else(out_of_domain)?;
        Ok((mean, std_dev))
    }
}

/// Interpret a value as a discrete state index.
fn to_state(var: VariableId, value: f64) -> Result<usize, ModelError> {
    if value >= 0.0 && value.fract() == 0.0 {
        Ok(value as usize)
    } else {
        Err(ModelError::ValueOutOfDomain { variable: var, value })
    }
}

/// Shape of the parent configuration space. All parents must be discrete.
pub(crate) fn parent_shape(child: &Variable, parents: &[&Variable]) -> Result<Vec<usize>, ModelError> {
    parents
        .iter()
        .map(|p| {
            p.cardinality().ok_or_else(|| ModelError::UnsupportedParent {
                variable: child.name().to_string(),
                parent: p.name().to_string(),
            })
        })
        .collect()
}

fn check_shape(child: &Variable, table: &Table, expected: &[usize]) -> Result<(), ModelError> {
    if table.shape() != expected {
        return Err(ModelError::InvalidCpd {
            variable: child.name().to_string(),
            message: format!("expected table shape {:?}, got {:?}", expected, table.shape()),
        });
    }
    Ok(())
}
