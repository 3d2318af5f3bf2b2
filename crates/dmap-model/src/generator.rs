//! Random naive-Bayes networks for demos and tests.

use dmap_types::ModelError;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::info;

use crate::init::Initialization;
use crate::network::{BayesianNetwork, BayesianNetworkBuilder};

pub const CLASS_VARIABLE: &str = "ClassVar";

/// Generates a class variable with discrete and Gaussian children, every CPD
/// drawn at random.
///
/// Children are named `DiscreteVar{i}` and `GaussianVar{i}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkGenerator {
    class_states: usize,
    discrete_children: usize,
    discrete_states: usize,
    gaussian_children: usize,
}

impl Default for NetworkGenerator {
    fn default() -> Self {
        Self {
            class_states: 2,
            discrete_children: 8,
            discrete_states: 2,
            gaussian_children: 30,
        }
    }
}

impl NetworkGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_class_states(mut self, n: usize) -> Self {
        self.class_states = n;
        self
    }

    pub fn with_discrete_children(mut self, n: usize, states: usize) -> Self {
        self.discrete_children = n;
        self.discrete_states = states;
        self
    }

    pub fn with_gaussian_children(mut self, n: usize) -> Self {
        self.gaussian_children = n;
        self
    }

    pub fn discrete_name(i: usize) -> String {
        format!("DiscreteVar{i}")
    }

    pub fn gaussian_name(i: usize) -> String {
        format!("GaussianVar{i}")
    }

    /// Build the network. Identical seeds give identical parameters.
    pub fn naive_bayes(&self, seed: u64) -> Result<BayesianNetwork, ModelError> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let parents = [CLASS_VARIABLE];

        let mut builder = BayesianNetworkBuilder::new().with_discrete(
            CLASS_VARIABLE,
            self.class_states,
            &[],
            Initialization::Random(rng.next_u64()),
        );
        for i in 0..self.discrete_children {
            builder = builder.with_discrete(
                &Self::discrete_name(i),
                self.discrete_states,
                &parents,
                Initialization::Random(rng.next_u64()),
            );
        }
        for i in 0..self.gaussian_children {
            builder = builder.with_continuous(&Self::gaussian_name(i), &parents, Initialization::Random(rng.next_u64()));
        }

        let network = builder.build()?;
        info!(
            "Generated naive-Bayes network: {} discrete and {} Gaussian children",
            self.discrete_children, self.gaussian_children
        );
        Ok(network)
    }
}
