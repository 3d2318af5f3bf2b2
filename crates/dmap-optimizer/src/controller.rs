//! Run orchestration: validation, planning, seeding, dispatch and reduction.

use chrono::{DateTime, Utc};
use dmap_model::BayesianNetwork;
use dmap_types::{Assignment, ConfigError, DmapResult, SearchConfig, SearchStrategy, VariableId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::dispatch::Dispatcher;
use crate::local::{LocalOptimizer, MapSearchOptimizer};
use crate::planner::plan;
use crate::reduce::reduce;
use crate::seed::{advance_seed, derive_seed};
use crate::task::{FinalEstimate, PartitionTask};

/// Bookkeeping for one completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub strategy: SearchStrategy,
    pub base_seed: u64,
    pub partitions: usize,
    pub work_per_partition: usize,
    pub best_partition: usize,
    pub log_probability: f64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Distributed MAP inference over a fixed model, targets and evidence.
///
/// Everything is validated on construction. Each call to
/// [`run_inference`](Self::run_inference) plans the partitions, derives one
/// seed per partition from the current base seed, dispatches all partitions,
/// and reduces their results. Base seeds advance after every run that
/// reached the reduction step, so repeated runs explore different streams
/// while a fresh controller with the same seed reproduces the first run.
#[derive(Debug)]
pub struct MapInference<O = MapSearchOptimizer> {
    model: Arc<BayesianNetwork>,
    targets: Arc<[VariableId]>,
    evidence: Arc<Assignment>,
    config: SearchConfig,
    optimizer: O,
    dispatcher: Dispatcher,
    base_seed: u64,
    estimate: Option<FinalEstimate>,
    history: Vec<RunSummary>,
}

impl MapInference<MapSearchOptimizer> {
    pub fn new(
        model: Arc<BayesianNetwork>,
        target_names: &[&str],
        evidence: Assignment,
        config: SearchConfig,
    ) -> DmapResult<Self> {
        config.validate()?;
        let targets = resolve_targets(&model, target_names)?;
        check_evidence(&model, &targets, &evidence)?;

        let timeout = config.partition_timeout_ms.map(Duration::from_millis);
        let dispatcher = Dispatcher::new(config.workers)?.with_timeout(timeout);

        info!(
            "MAP inference over {} targets with {} evidence values ({} strategy)",
            targets.len(),
            evidence.len(),
            config.strategy
        );

        Ok(Self {
            model,
            targets: targets.into(),
            evidence: Arc::new(evidence),
            base_seed: config.seed,
            config,
            optimizer: MapSearchOptimizer::new(),
            dispatcher,
            estimate: None,
            history: Vec::new(),
        })
    }

    /// Evidence from `(name, value)` pairs. Unknown names and values outside a
    /// variable's domain are configuration errors.
    pub fn evidence_by_name(model: &BayesianNetwork, values: &[(&str, f64)]) -> Result<Assignment, ConfigError> {
        let mut evidence = Assignment::new();
        for &(name, value) in values {
            let var = model.lookup_variable(name).ok_or_else(|| ConfigError::UnknownVariable {
                name: name.to_string(),
            })?;
            if !var.admits(value) {
                return Err(ConfigError::EvidenceOutOfDomain {
                    variable: name.to_string(),
                    value,
                });
            }
            evidence.set(var.id(), value);
        }
        Ok(evidence)
    }
}

impl<O: LocalOptimizer> MapInference<O> {
    /// Replace the local optimizer used for every partition.
    pub fn with_optimizer<P: LocalOptimizer>(self, optimizer: P) -> MapInference<P> {
        MapInference {
            model: self.model,
            targets: self.targets,
            evidence: self.evidence,
            config: self.config,
            optimizer,
            dispatcher: self.dispatcher,
            base_seed: self.base_seed,
            estimate: self.estimate,
            history: self.history,
        }
    }

    /// Run one full plan, dispatch, reduce cycle.
    ///
    /// On error the previous estimate is kept.
    pub fn run_inference(&mut self) -> DmapResult<&FinalEstimate> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let plan = plan(self.config.strategy, self.config.workers, self.config.total_budget())?;
        let base_seed = self.base_seed;

        info!(
            "Run {}: {} partitions x {} work (base seed {})",
            run_id, plan.partitions, plan.work_per_partition, base_seed
        );

        let tasks: Vec<PartitionTask> = (0..plan.partitions)
            .map(|partition| PartitionTask {
                run_id,
                partition,
                model: Arc::clone(&self.model),
                targets: Arc::clone(&self.targets),
                evidence: Arc::clone(&self.evidence),
                strategy: self.config.strategy,
                work: plan.work_per_partition,
                iterations: self.config.iterations,
                probability_sample_size: self.config.probability_sample_size,
                seed: derive_seed(base_seed, partition),
            })
            .collect();

        let results = self.dispatcher.dispatch(tasks, &self.optimizer).map_err(|e| {
            warn!("Run {} aborted: {}", run_id, e);
            e
        })?;
        self.base_seed = advance_seed(base_seed);

        let estimate = reduce(&results, &self.targets)?;
        info!(
            "Run {} finished: {} (log P = {:.4})",
            run_id,
            self.model.describe(&estimate.assignment),
            estimate.log_probability
        );

        self.history.push(RunSummary {
            run_id,
            strategy: self.config.strategy,
            base_seed,
            partitions: plan.partitions,
            work_per_partition: plan.work_per_partition,
            best_partition: estimate.partition,
            log_probability: estimate.log_probability,
            started_at,
            finished_at: Utc::now(),
        });

        Ok(&*self.estimate.insert(estimate))
    }

    /// Estimate of the last successful run.
    pub fn estimate(&self) -> Option<&FinalEstimate> {
        self.estimate.as_ref()
    }

    pub fn log_probability(&self) -> Option<f64> {
        self.estimate.as_ref().map(|e| e.log_probability)
    }

    pub fn probability(&self) -> Option<f64> {
        self.estimate.as_ref().map(|e| e.probability())
    }

    /// Base seed the next run will derive its partition seeds from.
    pub fn next_seed(&self) -> u64 {
        self.base_seed
    }

    pub fn history(&self) -> &[RunSummary] {
        &self.history
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn model(&self) -> &BayesianNetwork {
        &self.model
    }

    pub fn targets(&self) -> &[VariableId] {
        &self.targets
    }

    pub fn evidence(&self) -> &Assignment {
        &self.evidence
    }
}

fn resolve_targets(model: &BayesianNetwork, names: &[&str]) -> Result<Vec<VariableId>, ConfigError> {
    if names.is_empty() {
        return Err(ConfigError::NoTargets);
    }

    let mut seen = HashSet::new();
    let mut targets = Vec::with_capacity(names.len());
    for &name in names {
        let var = model.lookup_variable(name).ok_or_else(|| ConfigError::UnknownVariable {
            name: name.to_string(),
        })?;
        if !var.is_discrete() {
            return Err(ConfigError::ContinuousTarget {
                variable: name.to_string(),
            });
        }
        if !seen.insert(var.id()) {
            return Err(ConfigError::DuplicateTarget {
                variable: name.to_string(),
            });
        }
        targets.push(var.id());
    }
    Ok(targets)
}

fn check_evidence(model: &BayesianNetwork, targets: &[VariableId], evidence: &Assignment) -> Result<(), ConfigError> {
    for (id, value) in evidence.iter() {
        let var = model.variable(id).ok_or_else(|| ConfigError::UnknownVariable {
            name: id.to_string(),
        })?;
        if targets.contains(&id) {
            return Err(ConfigError::EvidenceOverlap {
                variable: var.name().to_string(),
            });
        }
        if !var.admits(value) {
            return Err(ConfigError::EvidenceOutOfDomain {
                variable: var.name().to_string(),
                value,
            });
        }
    }
    Ok(())
}
