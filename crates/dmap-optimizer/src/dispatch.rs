//! Fans partition tasks out over a bounded worker pool and gathers every
//! result before returning.

use dmap_types::{runtime_error, DmapError, DmapResult, PartitionError};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::local::{CancellationToken, LocalOptimizer, PartitionContext};
use crate::task::{PartitionResult, PartitionTask};

type Outcome = (usize, Result<PartitionResult, PartitionError>);

/// Runs partitions on a dedicated pool of `workers` threads. Extra partitions
/// queue on the pool.
///
/// The first failing partition cancels all others; the run then fails with
/// [`DmapError::PartitionExecution`] and no result is returned.
#[derive(Debug)]
pub struct Dispatcher {
    pool: ThreadPool,
    workers: usize,
    timeout: Option<Duration>,
}

impl Dispatcher {
    pub fn new(workers: usize) -> DmapResult<Self> {
        if workers < 1 {
            return Err(dmap_types::ConfigError::InvalidWorkerCount(workers).into());
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("dmap-worker-{i}"))
            .build()
            .map_err(|e| runtime_error!("Failed to build worker pool: {}", e))?;

        Ok(Self {
            pool,
            workers,
            timeout: None,
        })
    }

    /// Per-partition wall-clock limit. A partition exceeding it fails.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run every task and return one result per task, ordered by partition
    /// index. Partitions start in index order.
    pub fn dispatch<O>(&self, tasks: Vec<PartitionTask>, optimizer: &O) -> DmapResult<Vec<PartitionResult>>
    where
        O: LocalOptimizer + ?Sized,
    {
        let total = tasks.len();
        let run_id = tasks.first().map(|t| t.run_id);
        let token = CancellationToken::new();
        let (tx, rx) = crossbeam_channel::unbounded::<Outcome>();

        info!(
            run_id = ?run_id,
            "Dispatching {} partitions to {} workers using {}",
            total,
            self.workers,
            optimizer.name()
        );

        // FIFO so that low partitions never wait behind queued high ones
        self.pool.scope_fifo(|scope| {
            for task in tasks {
                let tx = tx.clone();
                let token = &token;
                let timeout = self.timeout;
                scope.spawn_fifo(move |_| {
                    debug!(run_id = %task.run_id, "Partition {} starting", task.partition);
                    let outcome = run_partition(&task, optimizer, token, timeout);
                    if let Err(e) = &outcome {
                        if !e.is_cancelled() && token.cancel() {
                            warn!(
                                run_id = %task.run_id,
                                "Partition {} failed, cancelling siblings: {}", task.partition, e
                            );
                        }
                    }
                    // the receiver outlives the scope
                    let _ = tx.send((task.partition, outcome));
                });
            }
        });
        drop(tx);

        let mut results = Vec::with_capacity(total);
        let mut failure: Option<(usize, PartitionError)> = None;
        let mut cancelled = 0;

        for (partition, outcome) in rx.iter() {
            match outcome {
                Ok(result) => {
                    debug!(
                        "Partition {} finished: log P = {:.4}",
                        partition, result.log_probability
                    );
                    results.push(result);
                }
                Err(PartitionError::Cancelled) => cancelled += 1,
                Err(e) => match &failure {
                    None => failure = Some((partition, e)),
                    Some(_) => warn!("Partition {} also failed: {}", partition, e),
                },
            }
        }

        if let Some((partition, source)) = failure {
            return Err(DmapError::PartitionExecution {
                partition,
                source,
                cancelled,
            });
        }
        if results.len() != total {
            return Err(runtime_error!(
                "Expected {} partition results, received {}",
                total,
                results.len()
            ));
        }

        results.sort_by_key(|r| r.partition);
        Ok(results)
    }
}

fn run_partition<O>(
    task: &PartitionTask,
    optimizer: &O,
    token: &CancellationToken,
    timeout: Option<Duration>,
) -> Result<PartitionResult, PartitionError>
where
    O: LocalOptimizer + ?Sized,
{
    if token.is_cancelled() {
        return Err(PartitionError::Cancelled);
    }

    let ctx = PartitionContext::new(token.clone(), timeout);
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| optimizer.optimize(task, &ctx)))
        .unwrap_or_else(|payload| Err(PartitionError::Panicked(panic_message(payload.as_ref()))));

    // a result that arrives after the deadline still counts as a timeout
    match (outcome, timeout) {
        (Ok(_), Some(limit)) if ctx.elapsed() > limit => Err(PartitionError::TimedOut {
            elapsed_ms: ctx.elapsed().as_millis() as u64,
            limit_ms: limit.as_millis() as u64,
        }),
        (outcome, _) => outcome,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dmap_model::BayesianNetworkBuilder;
    use dmap_types::{Assignment, SearchStrategy, VariableId};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Instant;
    use uuid::Uuid;

    fn tasks(n: usize) -> Vec<PartitionTask> {
        let model = Arc::new(BayesianNetworkBuilder::new().build().unwrap());
        let run_id = Uuid::new_v4();
        (0..n)
            .map(|partition| PartitionTask {
                run_id,
                partition,
                model: Arc::clone(&model),
                targets: Vec::<VariableId>::new().into(),
                evidence: Arc::new(Assignment::new()),
                strategy: SearchStrategy::LocalSearch,
                work: 1,
                iterations: 1,
                probability_sample_size: 1,
                seed: partition as u64,
            })
            .collect()
    }

    /// Scores partition `i` with `-(i % 3)`.
    struct Constant;

    impl LocalOptimizer for Constant {
        fn optimize(&self, task: &PartitionTask, _: &PartitionContext) -> Result<PartitionResult, PartitionError> {
            Ok(PartitionResult {
                partition: task.partition,
                seed: task.seed,
                assignment: Assignment::new(),
                log_probability: -((task.partition % 3) as f64),
            })
        }

        fn name(&self) -> &str {
            "constant"
        }
    }

    /// Partition `failing` (or the first one to start) fails, everything else
    /// waits for cancellation.
    struct FailOne {
        failing: Option<usize>,
        panic: bool,
        started: AtomicUsize,
    }

    impl FailOne {
        fn new(failing: Option<usize>, panic: bool) -> Self {
            Self {
                failing,
                panic,
                started: AtomicUsize::new(0),
            }
        }
    }

    impl LocalOptimizer for FailOne {
        fn optimize(&self, task: &PartitionTask, ctx: &PartitionContext) -> Result<PartitionResult, PartitionError> {
            let order = self.started.fetch_add(1, Ordering::SeqCst);
            let fails = match self.failing {
                Some(p) => task.partition == p,
                None => order == 0,
            };
            if fails {
                if self.panic {
                    panic!("boom in partition {}", task.partition);
                }
                return Err(PartitionError::Failed("boom".to_string()));
            }
            let deadline = Instant::now() + Duration::from_secs(10);
            while Instant::now() < deadline {
                ctx.checkpoint()?;
                std::thread::sleep(Duration::from_millis(1));
            }
            Err(PartitionError::Failed("never cancelled".to_string()))
        }

        fn name(&self) -> &str {
            "fail-one"
        }
    }

    #[test]
    fn every_task_yields_one_ordered_result() {
        let dispatcher = Dispatcher::new(3).unwrap();
        let results = dispatcher.dispatch(tasks(20), &Constant).unwrap();
        assert_eq!(results.len(), 20);
        for (i, r) in results.iter().enumerate() {
            assert_eq!(r.partition, i);
            assert_eq!(r.seed, i as u64);
        }
    }

    #[test]
    fn zero_workers_is_a_config_error() {
        assert!(Dispatcher::new(0).unwrap_err().is_config());
    }

    #[test]
    fn failure_cancels_siblings() {
        let optimizer = FailOne::new(Some(0), false);
        let err = Dispatcher::new(4).unwrap().dispatch(tasks(4), &optimizer).unwrap_err();
        match err {
            DmapError::PartitionExecution {
                partition,
                source,
                cancelled,
            } => {
                assert_eq!(partition, 0);
                assert_eq!(source, PartitionError::Failed("boom".to_string()));
                assert_eq!(cancelled, 3);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn queued_partitions_are_cancelled_before_starting() {
        let optimizer = FailOne::new(None, false);
        let err = Dispatcher::new(2).unwrap().dispatch(tasks(12), &optimizer).unwrap_err();
        match err {
            DmapError::PartitionExecution { cancelled, .. } => assert_eq!(cancelled, 11),
            other => panic!("unexpected error {other:?}"),
        }
        // only the failing partition and one running sibling ever started
        assert!(optimizer.started.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn low_partition_failure_cancels_running_and_queued() {
        // twice as many partitions as workers, failure in the first batch
        let optimizer = FailOne::new(Some(3), false);
        let began = Instant::now();
        let err = Dispatcher::new(4).unwrap().dispatch(tasks(8), &optimizer).unwrap_err();
        match err {
            DmapError::PartitionExecution {
                partition,
                source,
                cancelled,
            } => {
                assert_eq!(partition, 3);
                assert_eq!(source, PartitionError::Failed("boom".to_string()));
                assert_eq!(cancelled, 7);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(optimizer.started.load(Ordering::SeqCst) <= 4);
        assert!(began.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn panics_become_failures() {
        let optimizer = FailOne::new(Some(2), true);
        let err = Dispatcher::new(4).unwrap().dispatch(tasks(4), &optimizer).unwrap_err();
        match err {
            DmapError::PartitionExecution { partition, source, cancelled } => {
                assert_eq!(partition, 2);
                assert!(matches!(source, PartitionError::Panicked(msg) if msg.contains("boom")));
                assert_eq!(cancelled, 3);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn slow_partition_times_out() {
        struct Slow;
        impl LocalOptimizer for Slow {
            fn optimize(&self, task: &PartitionTask, _: &PartitionContext) -> Result<PartitionResult, PartitionError> {
                std::thread::sleep(Duration::from_millis(30));
                Constant.optimize(task, &PartitionContext::new(CancellationToken::new(), None))
            }
            fn name(&self) -> &str {
                "slow"
            }
        }

        let dispatcher = Dispatcher::new(1).unwrap().with_timeout(Some(Duration::from_millis(5)));
        let err = dispatcher.dispatch(tasks(1), &Slow).unwrap_err();
        assert!(matches!(
            err,
            DmapError::PartitionExecution {
                source: PartitionError::TimedOut { .. },
                ..
            }
        ));
    }
}
