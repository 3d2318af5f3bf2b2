use anyhow::{Context, Result};
use dmap_model::{NetworkGenerator, CLASS_VARIABLE};
use dmap_optimizer::MapInference;
use dmap_types::{SearchConfig, SearchStrategy};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEMO_SEED: u64 = 28235;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let base = match std::env::args().nth(1) {
        Some(path) => {
            let json = std::fs::read_to_string(&path).with_context(|| format!("reading config {path}"))?;
            SearchConfig::from_json_str(&json).with_context(|| format!("parsing config {path}"))?
        }
        None => SearchConfig::default()
            .with_seed(DEMO_SEED)
            .with_iterations(300)
            .with_starting_points(40),
    };

    let model = Arc::new(NetworkGenerator::new().naive_bayes(DEMO_SEED)?);
    let discrete = NetworkGenerator::discrete_name(0);
    let gaussian = NetworkGenerator::gaussian_name(0);
    let evidence = MapInference::evidence_by_name(&model, &[(discrete.as_str(), 0.0), (gaussian.as_str(), 3.0)])?;
    info!("Evidence: {}", model.describe(&evidence));

    for strategy in [SearchStrategy::LocalSearch, SearchStrategy::Sampling] {
        let config = base.clone().with_strategy(strategy);
        let mut inference = MapInference::new(Arc::clone(&model), &[CLASS_VARIABLE], evidence.clone(), config)?;
        let estimate = inference.run_inference()?;

        println!("{strategy}");
        println!("  estimate:        {}", model.describe(&estimate.assignment));
        println!("  probability:     {:.6e}", estimate.probability());
        println!("  log-probability: {:.4}", estimate.log_probability);
    }

    Ok(())
}
