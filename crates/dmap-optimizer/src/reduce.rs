//! Folds partition results into the run's final estimate.

use dmap_types::{DmapError, DmapResult, VariableId};
use tracing::debug;

use crate::task::{FinalEstimate, PartitionResult};

/// Pick the result with the greatest log-probability.
///
/// Ties keep the earliest result, so callers must pass results in a stable
/// order (the dispatcher orders them by partition). Infeasible (`-inf`) and
/// `NaN` scores never win. The winning assignment is restricted to `targets`.
pub fn reduce(results: &[PartitionResult], targets: &[VariableId]) -> DmapResult<FinalEstimate> {
    let mut best: Option<&PartitionResult> = None;

    for result in results.iter().filter(|r| r.is_feasible()) {
        if best.map_or(true, |b| result.log_probability > b.log_probability) {
            best = Some(result);
        }
    }

    let best = best.ok_or(DmapError::NoFeasibleResult {
        partitions: results.len(),
    })?;
    debug!(
        "Partition {} wins with log P = {:.4}",
        best.partition, best.log_probability
    );

    Ok(FinalEstimate {
        assignment: best.assignment.restrict(targets),
        log_probability: best.log_probability,
        partition: best.partition,
        seed: best.seed,
    })
}
