//! Likelihood weighting (Koller & Friedman Algorithm 12.2) restricted to the
//! ancestral closure of a scope, and the probability estimator built on it.

use dmap_types::{Assignment, ModelError, VariableId};
use rand::Rng;

use crate::network::BayesianNetwork;

/// A sample (an assignment to the sampler's scope) and its log weight.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedSample {
    pub assignment: Assignment,
    pub log_weight: f64,
}

/// Draws weighted particles from a `BayesianNetwork` with some variables
/// clamped.
///
/// Only the scope and its ancestors are visited. Any other variable is barren
/// with respect to the scope and integrates out to one.
pub struct LikelihoodWeightedSampler<'a> {
    model: &'a BayesianNetwork,
    order: Vec<VariableId>,
}

impl<'a> LikelihoodWeightedSampler<'a> {
    pub fn new(model: &'a BayesianNetwork, scope: &[VariableId]) -> Result<Self, ModelError> {
        let order = model.ancestral_closure(scope)?;
        Ok(Self { model, order })
    }

    /// Variables visited by each sample, in topological order.
    pub fn order(&self) -> &[VariableId] {
        &self.order
    }

    /// `true` if `clamp` fixes every visited variable, in which case a
    /// sample consumes no randomness and its weight is exact.
    pub fn is_deterministic(&self, clamp: &Assignment) -> bool {
        self.order.iter().all(|v| clamp.contains(*v))
    }

    /// Draw one particle. Clamped variables take their value from `clamp` and
    /// multiply the weight by `P(x | pa)`; the others are sampled forward.
    ///
    /// A particle whose weight drops to zero is returned early with
    /// `log_weight = -inf` and an incomplete assignment.
    pub fn sample<R: Rng + ?Sized>(&self, clamp: &Assignment, rng: &mut R) -> Result<WeightedSample, ModelError> {
        let mut assignment = Assignment::new();
        let mut log_weight = 0.0;

        for &var in &self.order {
            let cpd = self.model.cpd(var)?;

            if let Some(value) = clamp.get(var) {
                assignment.set(var, value);
                log_weight += cpd.log_density(&assignment)?;
                if log_weight == f64::NEG_INFINITY {
                    break;
                }
            } else {
                // parents come first in the order, so they already have values
                let value = cpd.sample(&assignment, rng)?;
                assignment.set(var, value);
            }
        }

        Ok(WeightedSample { assignment, log_weight })
    }
}

/// Estimates `ln P(clamp)` for assignments over a fixed scope.
///
/// When the scope is closed under ancestors the probability follows from the
/// chain rule exactly. Otherwise it is the log of the mean likelihood weight
/// over `sample_size` particles.
pub struct LogProbabilityEstimator<'a> {
    sampler: LikelihoodWeightedSampler<'a>,
    sample_size: usize,
}

impl<'a> LogProbabilityEstimator<'a> {
    pub fn new(model: &'a BayesianNetwork, scope: &[VariableId], sample_size: usize) -> Result<Self, ModelError> {
        Ok(Self {
            sampler: LikelihoodWeightedSampler::new(model, scope)?,
            sample_size: sample_size.max(1),
        })
    }

    pub fn sampler(&self) -> &LikelihoodWeightedSampler<'a> {
        &self.sampler
    }

    pub fn log_probability<R: Rng + ?Sized>(&self, clamp: &Assignment, rng: &mut R) -> Result<f64, ModelError> {
        if self.sampler.is_deterministic(clamp) {
            return Ok(self.sampler.sample(clamp, rng)?.log_weight);
        }

        let mut log_weights = Vec::with_capacity(self.sample_size);
        for _ in 0..self.sample_size {
            log_weights.push(self.sampler.sample(clamp, rng)?.log_weight);
        }
        Ok(log_mean_exp(&log_weights))
    }
}

/// `ln(mean(exp(x)))`, computed without overflow. `-inf` for an empty slice or
/// when every term is `-inf`.
pub fn log_mean_exp(log_values: &[f64]) -> f64 {
    let max = log_values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    let sum: f64 = log_values.iter().map(|v| (v - max).exp()).sum();
    max + sum.ln() - (log_values.len() as f64).ln()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::init::Initialization;
    use crate::network::tests::student;
    use crate::network::BayesianNetworkBuilder;
    use ndarray::array;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn id(model: &BayesianNetwork, name: &str) -> VariableId {
        model.lookup_variable(name).unwrap().id()
    }

    #[test]
    fn log_mean_exp_basics() {
        assert_eq!(log_mean_exp(&[]), f64::NEG_INFINITY);
        assert_eq!(log_mean_exp(&[f64::NEG_INFINITY, f64::NEG_INFINITY]), f64::NEG_INFINITY);
        let v = log_mean_exp(&[0.5f64.ln(), 0.25f64.ln(), f64::NEG_INFINITY]);
        assert!((v - 0.25f64.ln()).abs() < 1e-12);
        // large magnitudes stay finite
        assert!((log_mean_exp(&[-1000.0, -1000.0]) + 1000.0).abs() < 1e-9);
    }

    #[test]
    fn sampler_clamps_and_weights() {
        let model = student();
        let (l, s, g) = (id(&model, "L"), id(&model, "S"), id(&model, "G"));
        let evidence = Assignment::new().with(l, 0.0).with(s, 1.0);

        let sampler = LikelihoodWeightedSampler::new(&model, &[l, s]).unwrap();
        assert_eq!(sampler.order().len(), 5);
        assert!(!sampler.is_deterministic(&evidence));

        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for _ in 0..100 {
            let WeightedSample { assignment, log_weight } = sampler.sample(&evidence, &mut rng).unwrap();
            assert_eq!(assignment.get(l), Some(0.0));
            assert_eq!(assignment.get(s), Some(1.0));
            assert!(assignment.state(g).unwrap() < 2);
            assert!(log_weight <= 0.0);
        }
    }

    #[test]
    fn exact_when_scope_is_ancestral() {
        let model = student();
        let (d, i, g) = (id(&model, "D"), id(&model, "I"), id(&model, "G"));
        let estimator = LogProbabilityEstimator::new(&model, &[d, i, g], 10).unwrap();

        let clamp = Assignment::new().with(d, 0.0).with(i, 1.0).with(g, 0.0);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let lp = estimator.log_probability(&clamp, &mut rng).unwrap();
        assert!((lp - f64::ln(0.6 * 0.3 * 0.9)).abs() < 1e-12);
    }

    #[test]
    fn estimate_converges_to_marginal() {
        let model = student();
        let (i, l) = (id(&model, "I"), id(&model, "L"));
        let estimator = LogProbabilityEstimator::new(&model, &[i, l], 20_000).unwrap();

        // P(I=1, L=1) = P(I=1) * sum_d P(d) sum_g P(g|I=1,d) P(L=1|g)
        let p_l1_given = |pg0: f64| pg0 * 0.1 + (1.0 - pg0) * 0.6;
        let expected = 0.3 * (0.6 * p_l1_given(0.9) + 0.4 * p_l1_given(0.5));

        let clamp = Assignment::new().with(i, 1.0).with(l, 1.0);
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let lp = estimator.log_probability(&clamp, &mut rng).unwrap();
        assert!((lp.exp() - expected).abs() < 0.01, "estimated {} expected {}", lp.exp(), expected);
    }

    #[test]
    fn impossible_evidence_is_negative_infinity() {
        let model = BayesianNetworkBuilder::new()
            .with_binary("A", &[], Initialization::Binomial(0.5))
            .with_binary("B", &["A"], Initialization::Table(array![[1.0, 0.0], [1.0, 0.0]].into_dyn()))
            .build()
            .unwrap();
        let b = id(&model, "B");
        let estimator = LogProbabilityEstimator::new(&model, &[b], 50).unwrap();

        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let lp = estimator
            .log_probability(&Assignment::new().with(b, 1.0), &mut rng)
            .unwrap();
        assert_eq!(lp, f64::NEG_INFINITY);
    }
}
