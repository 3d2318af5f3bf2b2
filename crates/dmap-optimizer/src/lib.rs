//! # dmap-optimizer
//!
//! Distributed MAP inference for Bayesian networks.
//!
//! A run splits its search budget into independent partitions, gives each one
//! a derived seed, executes them on a bounded worker pool and keeps the most
//! probable assignment any partition found. [`MapInference`] drives the whole
//! cycle; [`LocalOptimizer`] is the seam for plugging in other per-partition
//! searches.

mod controller;
mod dispatch;
mod local;
mod planner;
mod reduce;
mod seed;
mod task;

pub use controller::{MapInference, RunSummary};
pub use dispatch::Dispatcher;
pub use local::{CancellationToken, LocalOptimizer, MapSearchOptimizer, PartitionContext};
pub use planner::{plan, PartitionPlan};
pub use reduce::reduce;
pub use seed::{advance_seed, derive_seed};
pub use task::{FinalEstimate, PartitionResult, PartitionTask};
