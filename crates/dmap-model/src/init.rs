//! Initialization routines for the parameters of a network's CPDs.

use dmap_types::{ModelError, Variable};
use ndarray::{ArrayD, Axis, IxDyn};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::cpd::{parent_shape, Cpd, Table};

/// Defines possible ways to initialize a variable's CPD.
#[derive(Debug, Clone, PartialEq)]
pub enum Initialization {
    /// A uniform distribution over all states. Discrete variables only.
    Uniform,

    /// Random parameters drawn from the given seed. Discrete variables get
    /// random normalized rows, continuous variables random means and spreads.
    Random(u64),

    /// `P(X = 1) = p` for a binary variable without parents.
    Binomial(f64),

    /// Explicit state probabilities for a variable without parents.
    Multinomial(Vec<f64>),

    /// User defined multinomial table, axes `[Pa_1, .., Pa_k, X]`.
    Table(Table),

    /// The same normal distribution for every parent configuration.
    Gaussian { mean: f64, std_dev: f64 },

    /// One mean and standard deviation per parent configuration.
    GaussianTable { means: Table, std_devs: Table },
}

impl Initialization {
    /// Construct the CPD of `var` given its (already added) `parents`.
    pub fn build_cpd(self, var: &Variable, parents: &[&Variable]) -> Result<Cpd, ModelError> {
        let invalid = |message: &str| ModelError::InvalidInitialization {
            variable: var.name().to_string(),
            message: message.to_string(),
        };
        let shape = parent_shape(var, parents)?;

        ///////////////////////////////////////////////////////////////////////
        // Continuous variables
        if !var.is_discrete() {
            let (means, std_devs) = match self {
                Initialization::Gaussian { mean, std_dev } => (
                    ArrayD::from_elem(IxDyn(&shape), mean),
                    ArrayD::from_elem(IxDyn(&shape), std_dev),
                ),
                Initialization::GaussianTable { means, std_devs } => (means, std_devs),
                Initialization::Random(seed) => {
                    let mut rng = ChaCha8Rng::seed_from_u64(seed);
                    let means = ArrayD::random_using(IxDyn(&shape), Uniform::new(-5.0, 5.0), &mut rng);
                    let std_devs = ArrayD::random_using(IxDyn(&shape), Uniform::new(0.5, 2.0), &mut rng);
                    (means, std_devs)
                }
                _ => return Err(invalid("continuous variables need a Gaussian initialization")),
            };
            return Cpd::gaussian(var, parents, means, std_devs);
        }

        ///////////////////////////////////////////////////////////////////////
        // Discrete variables
        let cardinality = var.cardinality().unwrap_or(0);
        if cardinality == 0 {
            return Err(invalid("a discrete variable needs at least one state"));
        }

        let mut full_shape = shape.clone();
        full_shape.push(cardinality);

        let table = match self {
            Initialization::Uniform => ArrayD::from_elem(IxDyn(&full_shape), 1.0 / cardinality as f64),
            Initialization::Random(seed) => {
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                let mut table = ArrayD::random_using(IxDyn(&full_shape), Uniform::new(1.0, 100.0), &mut rng);
                for mut row in table.lanes_mut(Axis(full_shape.len() - 1)) {
                    let z = row.sum();
                    row.mapv_inplace(|p| p / z);
                }
                table
            }
            Initialization::Binomial(p) => {
                if cardinality != 2 || !shape.is_empty() {
                    return Err(invalid("binomial needs a binary variable without parents"));
                }
                ArrayD::from_shape_vec(IxDyn(&[2]), vec![1.0 - p, p]).map_err(|e| invalid(&e.to_string()))?
            }
            Initialization::Multinomial(ps) => {
                if ps.len() != cardinality || !shape.is_empty() {
                    return Err(invalid("multinomial needs one probability per state and no parents"));
                }
                ArrayD::from_shape_vec(IxDyn(&[cardinality]), ps).map_err(|e| invalid(&e.to_string()))?
            }
            Initialization::Table(table) => table,
            Initialization::Gaussian { .. } | Initialization::GaussianTable { .. } => {
                return Err(invalid("discrete variables cannot use a Gaussian initialization"));
            }
        };

        Cpd::multinomial(var, parents, table)
    }
}
