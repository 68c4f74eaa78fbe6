//! Concurrent run engine
//!
//! A run dispatches a fixed number of queries across a pool of `num_clients` workers. Every job is
//! enqueued before any outcome is awaited; workers pull jobs until the queue is drained. The pool
//! lives in a [`JoinSet`], so dropping an unfinished run aborts its workers.
use crate::executor::{ExecutorError, ExecutorProvider, QueryExecutor};
use crate::query::{timed_query, QueryShape};
use crate::vector::VectorGenerator;
use async_channel::Receiver;
use humantime::format_duration;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
#[allow(unused)]
use tracing::{debug, error, info, instrument, trace, warn, Instrument};
use vecbench_core::{QueryOutcome, WorkloadConfig};

/// Raw output of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutput {
    /// One outcome per query, in submission order.
    pub outcomes: Vec<QueryOutcome>,
    /// Submission indices in the order their queries completed.
    pub completion_order: Vec<usize>,
    /// Wall-clock time from the first submission to the last collected outcome.
    pub elapsed: Duration,
}

impl RunOutput {
    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.succeeded()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.outcomes.len() - self.success_count()
    }
}

struct Completed {
    index: usize,
    sequence: usize,
    outcome: QueryOutcome,
}

/// Run `workload.num_queries` similarity queries against `shape.table` with
/// `workload.num_clients` concurrent workers.
///
/// Query failures, including a worker that could not obtain an executor, are recorded as failed
/// outcomes and never abort the run.
#[instrument(
    name = "run",
    skip_all,
    fields(
        table = %shape.table,
        num_queries = workload.num_queries,
        num_clients = workload.num_clients.get(),
    )
)]
pub async fn run<P: ExecutorProvider>(
    provider: &P,
    shape: &QueryShape,
    workload: &WorkloadConfig,
) -> RunOutput {
    let num_queries = workload.num_queries;
    let workers = workload.num_clients.get().min(num_queries);

    let mut executors = Vec::with_capacity(workers);
    for _ in 0..workers {
        let executor = provider.worker_executor().await;
        if let Err(err) = &executor {
            error!("Unable to provision executor: {err}");
        }
        executors.push(executor);
    }

    let start = Instant::now();

    let (tx, rx) = async_channel::unbounded();
    for index in 0..num_queries {
        // Unbounded and the receiver is held, so this cannot fail.
        let _ = tx.try_send(index);
    }
    tx.close();

    let sequence = Arc::new(AtomicUsize::new(0));
    let shape = Arc::new(shape.clone());
    let mut pool = JoinSet::new();
    for (worker_id, executor) in executors.into_iter().enumerate() {
        pool.spawn(
            worker(
                executor,
                rx.clone(),
                shape.clone(),
                sequence.clone(),
                shape.vector_generator(),
            )
            .instrument(tracing::debug_span!("worker", id = worker_id)),
        );
    }
    drop(rx);

    let mut slots: Vec<Option<(usize, QueryOutcome)>> = vec![None; num_queries];
    while let Some(res) = pool.join_next().await {
        match res {
            Ok(completed) => {
                for Completed {
                    index,
                    sequence,
                    outcome,
                } in completed
                {
                    slots[index] = Some((sequence, outcome));
                }
            }
            Err(err) => error!("Worker terminated abnormally: {err}"),
        }
    }

    let elapsed = start.elapsed();

    // Jobs held by a crashed worker have no outcome; they count as failures completing last.
    let mut missing = 0;
    let mut ordered: Vec<(usize, usize)> = Vec::with_capacity(num_queries);
    let outcomes = slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| match slot {
            Some((sequence, outcome)) => {
                ordered.push((sequence, index));
                outcome
            }
            None => {
                missing += 1;
                ordered.push((usize::MAX, index));
                QueryOutcome::Failure
            }
        })
        .collect();
    if missing > 0 {
        warn!("{missing} queries were lost with their worker and are counted as failures.");
    }
    ordered.sort_unstable();

    debug!(
        "Collected {num_queries} outcomes from {workers} workers in {}",
        format_duration(elapsed)
    );

    RunOutput {
        outcomes,
        completion_order: ordered.into_iter().map(|(_, index)| index).collect(),
        elapsed,
    }
}

async fn worker<E: QueryExecutor>(
    mut executor: Result<E, ExecutorError>,
    jobs: Receiver<usize>,
    shape: Arc<QueryShape>,
    sequence: Arc<AtomicUsize>,
    mut vectors: VectorGenerator,
) -> Vec<Completed> {
    let mut completed = vec![];
    while let Ok(index) = jobs.recv().await {
        let outcome = match &mut executor {
            Ok(executor) => timed_query(executor, &shape, &mut vectors).await,
            Err(err) => {
                error!("Error running query on {}: {err}", shape.table);
                QueryOutcome::Failure
            }
        };

        completed.push(Completed {
            index,
            sequence: sequence.fetch_add(1, Ordering::Relaxed),
            outcome,
        });
    }
    trace!("Worker drained {} jobs", completed.len());
    completed
}
