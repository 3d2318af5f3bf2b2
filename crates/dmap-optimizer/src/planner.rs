//! Splits a global work budget into partitions.

use dmap_types::{ConfigError, SearchStrategy};
use serde::{Deserialize, Serialize};

/// How a run's budget is divided over independent partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionPlan {
    pub strategy: SearchStrategy,
    pub partitions: usize,
    pub work_per_partition: usize,
    pub total_budget: usize,
}

impl PartitionPlan {
    /// Work actually scheduled. Never below `total_budget`.
    pub fn scheduled_work(&self) -> usize {
        self.partitions * self.work_per_partition
    }
}

/// Compute the partition count and per-partition work for a run.
///
/// Local search gets one restart per partition. Sampling gets two partitions
/// per worker, each with an equal share of the samples rounded up; budgets
/// smaller than that get one sample per partition.
pub fn plan(strategy: SearchStrategy, workers: usize, total_budget: usize) -> Result<PartitionPlan, ConfigError> {
    if workers < 1 {
        return Err(ConfigError::InvalidWorkerCount(workers));
    }
    if total_budget < 1 {
        let name = match strategy {
            SearchStrategy::LocalSearch => "starting_points",
            SearchStrategy::Sampling => "sample_size",
        };
        return Err(ConfigError::InvalidBudget { name, value: total_budget });
    }

    let (partitions, work_per_partition) = match strategy {
        SearchStrategy::LocalSearch => (total_budget, 1),
        SearchStrategy::Sampling => {
            let partitions = workers.saturating_mul(2).min(total_budget).max(1);
            (partitions, total_budget.div_ceil(partitions))
        }
    };

    Ok(PartitionPlan {
        strategy,
        partitions,
        work_per_partition,
        total_budget,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_search_one_restart_per_partition() {
        let p = plan(SearchStrategy::LocalSearch, 4, 10).unwrap();
        assert_eq!(p.partitions, 10);
        assert_eq!(p.work_per_partition, 1);
        assert_eq!(p.scheduled_work(), 10);
    }

    #[test]
    fn sampling_two_partitions_per_worker() {
        let p = plan(SearchStrategy::Sampling, 2, 1000).unwrap();
        assert_eq!(p.partitions, 4);
        assert_eq!(p.work_per_partition, 250);

        let p = plan(SearchStrategy::Sampling, 3, 1000).unwrap();
        assert_eq!(p.partitions, 6);
        assert_eq!(p.work_per_partition, 167);
        assert_eq!(p.scheduled_work(), 1002);
    }

    #[test]
    fn small_sample_budget_clamps_partitions() {
        let p = plan(SearchStrategy::Sampling, 8, 5).unwrap();
        assert_eq!(p.partitions, 5);
        assert_eq!(p.work_per_partition, 1);

        let p = plan(SearchStrategy::Sampling, 8, 1).unwrap();
        assert_eq!(p.partitions, 1);
        assert_eq!(p.work_per_partition, 1);
    }

    #[test]
    fn invalid_inputs() {
        assert_eq!(
            plan(SearchStrategy::Sampling, 0, 10),
            Err(ConfigError::InvalidWorkerCount(0))
        );
        assert_eq!(
            plan(SearchStrategy::LocalSearch, 1, 0),
            Err(ConfigError::InvalidBudget {
                name: "starting_points",
                value: 0
            })
        );
    }

    #[test]
    fn covers_budget_for_all_small_inputs() {
        for strategy in [SearchStrategy::LocalSearch, SearchStrategy::Sampling] {
            for workers in 1..=9 {
                for budget in 1..=200 {
                    let p = plan(strategy, workers, budget).unwrap();
                    assert!(p.partitions >= 1);
                    assert!(p.work_per_partition >= 1);
                    assert!(p.scheduled_work() >= budget, "{strategy} W={workers} B={budget}");
                    assert!(p.scheduled_work() - budget < p.partitions);
                }
            }
        }
    }
}
