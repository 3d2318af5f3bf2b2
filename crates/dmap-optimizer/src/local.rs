//! The per-partition search contract and the default MAP search.

use dmap_model::{BayesianNetwork, LogProbabilityEstimator};
use dmap_types::{Assignment, ModelError, PartitionError, SearchStrategy, VariableId};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::trace;

use crate::task::{PartitionResult, PartitionTask};

/// Searches one partition for the most probable target assignment.
///
/// Implementations must be deterministic in the task (including its seed),
/// must return values for exactly the task's targets, and must not mutate any
/// shared input. Long-running implementations should call
/// [`PartitionContext::checkpoint`] regularly.
pub trait LocalOptimizer: Send + Sync {
    fn optimize(&self, task: &PartitionTask, ctx: &PartitionContext) -> Result<PartitionResult, PartitionError>;

    fn name(&self) -> &str;
}

/// Shared flag used to stop sibling partitions after a failure.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if this call tripped the token.
    pub fn cancel(&self) -> bool {
        !self.cancelled.swap(true, Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Execution context of a single partition.
#[derive(Debug, Clone)]
pub struct PartitionContext {
    token: CancellationToken,
    started: Instant,
    timeout: Option<Duration>,
}

impl PartitionContext {
    pub fn new(token: CancellationToken, timeout: Option<Duration>) -> Self {
        Self {
            token,
            started: Instant::now(),
            timeout,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Fails with `Cancelled` once the run has been cancelled, or with
    /// `TimedOut` once the partition has exceeded its time limit.
    pub fn checkpoint(&self) -> Result<(), PartitionError> {
        if self.token.is_cancelled() {
            return Err(PartitionError::Cancelled);
        }
        if let Some(limit) = self.timeout {
            let elapsed = self.started.elapsed();
            if elapsed > limit {
                return Err(PartitionError::TimedOut {
                    elapsed_ms: elapsed.as_millis() as u64,
                    limit_ms: limit.as_millis() as u64,
                });
            }
        }
        Ok(())
    }
}

/// Samples between cancellation checks in sampling mode.
const CHECKPOINT_INTERVAL: usize = 64;

/// Default optimizer: random-restart hill climbing or likelihood-weighted
/// sampling, depending on the task's strategy.
///
/// Candidates are scored with a [`LogProbabilityEstimator`] over the targets
/// and the evidence, so only their ancestors are ever visited.
#[derive(Debug, Clone, Copy, Default)]
pub struct MapSearchOptimizer;

impl MapSearchOptimizer {
    pub fn new() -> Self {
        Self
    }

    /// `work` restarts of best-improvement hill climbing. Each climb stops at a
    /// local optimum or after `iterations` moves.
    fn local_search(
        &self,
        task: &PartitionTask,
        ctx: &PartitionContext,
        search: &Search<'_>,
        rng: &mut ChaCha8Rng,
    ) -> Result<(Assignment, f64), PartitionError> {
        let mut best: Option<(Assignment, f64)> = None;

        for restart in 0..task.work {
            ctx.checkpoint()?;

            let mut current: Assignment = search
                .targets
                .iter()
                .zip(&search.cardinalities)
                .map(|(&t, &k)| (t, rng.gen_range(0..k) as f64))
                .collect();
            let mut current_lp = search.score(task, &current, rng)?;

            for step in 0..task.iterations {
                ctx.checkpoint()?;

                let mut best_move: Option<(Assignment, f64)> = None;
                for (&t, &k) in search.targets.iter().zip(&search.cardinalities) {
                    let state = current.state(t);
                    for s in (0..k).filter(|s| Some(*s) != state) {
                        let candidate = current.clone().with(t, s as f64);
                        let lp = search.score(task, &candidate, rng)?;
                        let threshold = best_move.as_ref().map_or(current_lp, |(_, b)| *b);
                        if lp > threshold {
                            best_move = Some((candidate, lp));
                        }
                    }
                }

                match best_move {
                    Some((candidate, lp)) => {
                        current = candidate;
                        current_lp = lp;
                    }
                    None => {
                        trace!(partition = task.partition, restart, step, "Local optimum reached");
                        break;
                    }
                }
            }

            if best.as_ref().map_or(true, |(_, b)| current_lp > *b) {
                best = Some((current, current_lp));
            }
        }

        best.ok_or_else(|| PartitionError::Failed("no restarts scheduled".to_string()))
    }

    /// `work` likelihood-weighted samples. The target configuration carrying the
    /// most total weight is re-scored by the estimator.
    fn sampling(
        &self,
        task: &PartitionTask,
        ctx: &PartitionContext,
        search: &Search<'_>,
        rng: &mut ChaCha8Rng,
    ) -> Result<(Assignment, f64), PartitionError> {
        let sampler = search.estimator.sampler();
        let mut weights: BTreeMap<Vec<usize>, f64> = BTreeMap::new();

        for n in 0..task.work {
            if n % CHECKPOINT_INTERVAL == 0 {
                ctx.checkpoint()?;
            }
            let sample = sampler.sample(&task.evidence, rng)?;
            if sample.log_weight == f64::NEG_INFINITY {
                continue;
            }
            let key: Option<Vec<usize>> = search.targets.iter().map(|t| sample.assignment.state(*t)).collect();
            if let Some(key) = key {
                let total = weights.entry(key).or_insert(f64::NEG_INFINITY);
                *total = log_add_exp(*total, sample.log_weight);
            }
        }

        let mut heaviest: Option<(&Vec<usize>, f64)> = None;
        for (key, &w) in &weights {
            if heaviest.map_or(true, |(_, b)| w > b) {
                heaviest = Some((key, w));
            }
        }

        let Some((states, _)) = heaviest else {
            trace!(partition = task.partition, "No sample with positive weight");
            let fallback: Assignment = search.targets.iter().map(|&t| (t, 0.0)).collect();
            return Ok((fallback, f64::NEG_INFINITY));
        };

        let candidate: Assignment = search
            .targets
            .iter()
            .zip(states)
            .map(|(&t, &s)| (t, s as f64))
            .collect();
        let lp = search.score(task, &candidate, rng)?;
        Ok((candidate, lp))
    }
}

impl LocalOptimizer for MapSearchOptimizer {
    fn optimize(&self, task: &PartitionTask, ctx: &PartitionContext) -> Result<PartitionResult, PartitionError> {
        let mut rng = ChaCha8Rng::seed_from_u64(task.seed);
        let search = Search::new(&task.model, &task.targets, &task.evidence, task.probability_sample_size)?;

        let (assignment, log_probability) = match task.strategy {
            SearchStrategy::LocalSearch => self.local_search(task, ctx, &search, &mut rng)?,
            SearchStrategy::Sampling => self.sampling(task, ctx, &search, &mut rng)?,
        };

        Ok(PartitionResult {
            partition: task.partition,
            seed: task.seed,
            assignment,
            log_probability,
        })
    }

    fn name(&self) -> &str {
        "map-search"
    }
}

/// Per-task search state shared by both strategies.
struct Search<'a> {
    targets: &'a [VariableId],
    cardinalities: Vec<usize>,
    estimator: LogProbabilityEstimator<'a>,
}

impl<'a> Search<'a> {
    fn new(
        model: &'a BayesianNetwork,
        targets: &'a [VariableId],
        evidence: &Assignment,
        sample_size: usize,
    ) -> Result<Self, ModelError> {
        let cardinalities = targets
            .iter()
            .map(|&t| {
                model
                    .variable(t)
                    .and_then(|v| v.cardinality())
                    .ok_or(ModelError::UnknownVariableId(t))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut scope = targets.to_vec();
        scope.extend(evidence.variables());
        let estimator = LogProbabilityEstimator::new(model, &scope, sample_size)?;

        Ok(Self {
            targets,
            cardinalities,
            estimator,
        })
    }

    fn score(&self, task: &PartitionTask, candidate: &Assignment, rng: &mut ChaCha8Rng) -> Result<f64, ModelError> {
        let clamp = task.evidence.merged(candidate);
        self.estimator.log_probability(&clamp, rng)
    }
}

fn log_add_exp(a: f64, b: f64) -> f64 {
    let (hi, lo) = if a > b { (a, b) } else { (b, a) };
    if lo == f64::NEG_INFINITY {
        return hi;
    }
    hi + (lo - hi).exp().ln_1p()
}
