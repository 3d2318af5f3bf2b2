//! # dmap-model
//!
//! Bayesian networks over discrete and Gaussian variables, plus the sampling
//! machinery the MAP optimizer uses to estimate the probability of partial
//! assignments.
//!
//! Networks are assembled in topological order with [`BayesianNetworkBuilder`].
//! Every variable carries one conditional probability distribution ([`Cpd`]),
//! which implicitly defines the edges of the DAG.

mod cpd;
mod generator;
mod init;
mod network;
mod sampler;

pub use cpd::{Cpd, Density, Table};
pub use generator::{NetworkGenerator, CLASS_VARIABLE};
pub use init::Initialization;
pub use network::{BayesianNetwork, BayesianNetworkBuilder};
pub use sampler::{log_mean_exp, LikelihoodWeightedSampler, LogProbabilityEstimator, WeightedSample};
