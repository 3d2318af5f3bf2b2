//! Units of work handed to the dispatcher and what comes back.

use dmap_model::BayesianNetwork;
use dmap_types::{Assignment, SearchStrategy, VariableId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// One local optimizer invocation. The model, targets and evidence are shared
/// read-only between all tasks of a run.
#[derive(Debug, Clone)]
pub struct PartitionTask {
    /// Run this task belongs to.
    pub run_id: Uuid,

    /// Partition index, `0..partitions`.
    pub partition: usize,

    pub model: Arc<BayesianNetwork>,
    pub targets: Arc<[VariableId]>,
    pub evidence: Arc<Assignment>,
    pub strategy: SearchStrategy,

    /// Restarts (local search) or samples (sampling) for this partition.
    pub work: usize,

    /// Maximum hill-climbing steps per restart.
    pub iterations: usize,

    pub probability_sample_size: usize,

    /// Derived seed. The only source of randomness for the task.
    pub seed: u64,
}

/// The best pair one partition found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionResult {
    pub partition: usize,
    pub seed: u64,
    /// Values for the MAP targets only.
    pub assignment: Assignment,
    /// Estimate of `ln P(assignment, evidence)`, `-inf` when nothing feasible was found.
    pub log_probability: f64,
}

impl PartitionResult {
    pub fn is_feasible(&self) -> bool {
        self.log_probability > f64::NEG_INFINITY
    }
}

/// Winning partition result of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalEstimate {
    pub assignment: Assignment,
    pub log_probability: f64,
    pub partition: usize,
    pub seed: u64,
}

impl FinalEstimate {
    pub fn probability(&self) -> f64 {
        self.log_probability.exp()
    }
}
