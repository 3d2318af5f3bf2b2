//! Search configuration for a distributed MAP run.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{ConfigError, DmapResult};

/// How each partition searches for the MAP assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SearchStrategy {
    /// Random-restart hill climbing. One restart per partition.
    LocalSearch,
    /// Likelihood-weighted sampling. Samples are split evenly over partitions.
    Sampling,
}

impl Default for SearchStrategy {
    fn default() -> Self {
        Self::LocalSearch
    }
}

impl fmt::Display for SearchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LocalSearch => f.write_str("LOCAL_SEARCH"),
            Self::Sampling => f.write_str("SAMPLING"),
        }
    }
}

/// Immutable parameters of an inference run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub strategy: SearchStrategy,

    /// Base seed. Partition seeds are derived from it.
    pub seed: u64,

    /// Maximum hill-climbing steps per restart.
    pub iterations: usize,

    /// Number of random restarts (`LocalSearch`).
    pub starting_points: usize,

    /// Total number of samples over all partitions (`Sampling`).
    pub sample_size: usize,

    /// Samples used to estimate the probability of a single candidate.
    pub probability_sample_size: usize,

    /// Upper bound on concurrently running partitions.
    pub workers: usize,

    /// Optional wall-clock limit per partition, in milliseconds.
    pub partition_timeout_ms: Option<u64>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            strategy: SearchStrategy::LocalSearch,
            seed: 0,
            iterations: 100,
            starting_points: 50,
            sample_size: 5000,
            probability_sample_size: 100,
            workers: 2,
            partition_timeout_ms: None,
        }
    }
}

impl SearchConfig {
    pub fn new(strategy: SearchStrategy) -> Self {
        Self {
            strategy,
            ..Self::default()
        }
    }

    pub fn with_strategy(mut self, strategy: SearchStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_iterations(mut self, n: usize) -> Self {
        self.iterations = n;
        self
    }

    pub fn with_starting_points(mut self, n: usize) -> Self {
        self.starting_points = n;
        self
    }

    pub fn with_sample_size(mut self, n: usize) -> Self {
        self.sample_size = n;
        self
    }

    pub fn with_probability_sample_size(mut self, n: usize) -> Self {
        self.probability_sample_size = n;
        self
    }

    pub fn with_workers(mut self, n: usize) -> Self {
        self.workers = n;
        self
    }

    pub fn with_partition_timeout_ms(mut self, ms: u64) -> Self {
        self.partition_timeout_ms = Some(ms);
        self
    }

    /// The global work budget the planner splits: restarts for local search,
    /// samples for sampling.
    pub fn total_budget(&self) -> usize {
        match self.strategy {
            SearchStrategy::LocalSearch => self.starting_points,
            SearchStrategy::Sampling => self.sample_size,
        }
    }

    /// Check every numeric field that a run depends on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers < 1 {
            return Err(ConfigError::InvalidWorkerCount(self.workers));
        }

        let budget_name = match self.strategy {
            SearchStrategy::LocalSearch => "starting_points",
            SearchStrategy::Sampling => "sample_size",
        };
        let checks = [
            (budget_name, self.total_budget()),
            ("iterations", self.iterations),
            ("probability_sample_size", self.probability_sample_size),
        ];
        for (name, value) in checks {
            if value < 1 {
                return Err(ConfigError::InvalidBudget { name, value });
            }
        }

        if self.partition_timeout_ms == Some(0) {
            return Err(ConfigError::Invalid(
                "partition_timeout_ms must be positive when set".to_string(),
            ));
        }

        Ok(())
    }

    pub fn from_json_str(json: &str) -> DmapResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_pretty(&self) -> DmapResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_driver() {
        let config = SearchConfig::default();
        assert_eq!(config.strategy, SearchStrategy::LocalSearch);
        assert_eq!(config.seed, 0);
        assert_eq!(config.iterations, 100);
        assert_eq!(config.starting_points, 50);
        assert_eq!(config.sample_size, 5000);
        assert_eq!(config.probability_sample_size, 100);
        assert_eq!(config.workers, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn budget_follows_strategy() {
        let config = SearchConfig::default()
            .with_starting_points(40)
            .with_sample_size(1000);
        assert_eq!(config.total_budget(), 40);
        assert_eq!(config.with_strategy(SearchStrategy::Sampling).total_budget(), 1000);
    }

    #[test]
    fn validate_rejects_bad_values() {
        let err = SearchConfig::default().with_workers(0).validate().unwrap_err();
        assert_eq!(err, ConfigError::InvalidWorkerCount(0));

        let err = SearchConfig::default()
            .with_starting_points(0)
            .validate()
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidBudget {
                name: "starting_points",
                value: 0
            }
        );

        // the sample budget only matters for sampling
        assert!(SearchConfig::default().with_sample_size(0).validate().is_ok());
        assert!(SearchConfig::new(SearchStrategy::Sampling)
            .with_sample_size(0)
            .validate()
            .is_err());

        assert!(SearchConfig::default()
            .with_partition_timeout_ms(0)
            .validate()
            .is_err());
    }

    #[test]
    fn json_round_trip() {
        let config = SearchConfig::new(SearchStrategy::Sampling)
            .with_seed(28235)
            .with_workers(4)
            .with_partition_timeout_ms(1500);

        let json = config.to_json_pretty().unwrap();
        assert!(json.contains("\"SAMPLING\""));
        let back = SearchConfig::from_json_str(&json).unwrap();
        assert_eq!(config, back);
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config = SearchConfig::from_json_str(r#"{"strategy": "SAMPLING", "seed": 7}"#).unwrap();
        assert_eq!(config.strategy, SearchStrategy::Sampling);
        assert_eq!(config.seed, 7);
        assert_eq!(config.sample_size, 5000);
        assert!(SearchConfig::from_json_str(r#"{"strategy": "ANNEALING"}"#).is_err());
    }
}
