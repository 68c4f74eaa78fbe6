//! Benchmark sweep
use crate::engine;
use crate::error::BenchError;
use crate::executor::ExecutorProvider;
use crate::query::QueryShape;
use crate::sink::ResultSink;
use humantime::format_duration;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};
use tokio::sync::watch;
#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, trace, warn};
use vecbench_core::{BenchmarkConfig, RunResult, WorkloadConfig, DEFAULT_K, DEFAULT_PRECISION};

/// Summary of a completed (or stopped) sweep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSummary {
    /// Runs aggregated, stored and handed to the sink.
    pub recorded: usize,
    /// Warm-up runs executed and discarded.
    pub warm_up: usize,
    /// The sweep stopped early on a shutdown request.
    pub interrupted: bool,
    pub elapsed: Duration,
}

/// Runs every workload against every table, in order, and collects the results.
///
/// Results are handed to the sink one at a time as each run finishes.
///
/// # Example
/// ```no_run
/// use vecbench::prelude::*;
/// use vecbench::sink::NullSink;
/// use std::num::NonZeroUsize;
///
/// # async fn example<P: ExecutorProvider>(provider: P) -> Result<(), BenchError> {
/// let workloads = vec![
///     WorkloadConfig { num_queries: 100, num_clients: NonZeroUsize::new(4).unwrap(), warm_up: true },
///     WorkloadConfig { num_queries: 1000, num_clients: NonZeroUsize::new(16).unwrap(), warm_up: false },
/// ];
/// let mut session = BenchmarkSession::new(provider, Box::new(NullSink))
///     .tables(["items_hnsw", "items_ivfflat"])
///     .workloads(workloads)
///     .dimensions(NonZeroUsize::new(128).unwrap());
///
/// let (_tx, shutdown) = tokio::sync::watch::channel(false);
/// session.run(&shutdown).await?;
/// for result in session.results() {
///     println!("{}: {result}", result.table_name);
/// }
/// # Ok(())
/// # }
/// ```
pub struct BenchmarkSession<P> {
    provider: P,
    tables: Vec<String>,
    workloads: Vec<WorkloadConfig>,
    dimensions: NonZeroUsize,
    k: usize,
    precision: u32,
    sink: Box<dyn ResultSink>,
    results: Vec<RunResult>,
}

impl<P: ExecutorProvider> BenchmarkSession<P> {
    pub fn new(provider: P, sink: Box<dyn ResultSink>) -> Self {
        Self {
            provider,
            tables: vec![],
            workloads: vec![],
            dimensions: NonZeroUsize::MIN,
            k: DEFAULT_K,
            precision: DEFAULT_PRECISION,
            sink,
            results: vec![],
        }
    }

    pub fn from_config(provider: P, config: &BenchmarkConfig, sink: Box<dyn ResultSink>) -> Self {
        Self::new(provider, sink)
            .tables(config.tables.iter())
            .workloads(config.workloads.iter().cloned())
            .dimensions(config.dimensions)
            .k(config.k)
            .precision(config.precision)
    }

    pub fn tables<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tables = tables.into_iter().map(|t| t.as_ref().to_string()).collect();
        self
    }

    pub fn workloads(mut self, workloads: impl IntoIterator<Item = WorkloadConfig>) -> Self {
        self.workloads = workloads.into_iter().collect();
        self
    }

    pub fn dimensions(mut self, dimensions: NonZeroUsize) -> Self {
        self.dimensions = dimensions;
        self
    }

    /// Number of neighbors requested per query.
    pub fn k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    /// Decimal places of generated vector components.
    pub fn precision(mut self, precision: u32) -> Self {
        self.precision = precision;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Results recorded so far, in run order.
    pub fn results(&self) -> &[RunResult] {
        &self.results
    }

    pub fn into_results(self) -> Vec<RunResult> {
        self.results
    }

    /// Execute the sweep: for each workload, for each table.
    ///
    /// A `true` on `shutdown` stops the sweep before the next run starts. An in-flight run always
    /// completes; to abandon it, drop the returned future.
    #[instrument(name = "session", skip_all, fields(tables = self.tables.len(), workloads = self.workloads.len()))]
    pub async fn run(
        &mut self,
        shutdown: &watch::Receiver<bool>,
    ) -> Result<SessionSummary, BenchError> {
        let start = Instant::now();
        let mut summary = SessionSummary {
            recorded: 0,
            warm_up: 0,
            interrupted: false,
            elapsed: Duration::ZERO,
        };

        'sweep: for workload in &self.workloads {
            for table in &self.tables {
                if *shutdown.borrow() {
                    warn!("Shutdown requested, stopping before {table} ({workload})");
                    summary.interrupted = true;
                    break 'sweep;
                }

                if workload.warm_up {
                    info!("Warming up {table} with {workload}");
                } else {
                    info!("Benchmarking {table} with {workload}");
                }

                let shape = QueryShape {
                    table: table.clone(),
                    dimensions: self.dimensions,
                    k: self.k,
                    precision: self.precision,
                };
                let output = engine::run(&self.provider, &shape, workload).await;

                if workload.warm_up {
                    info!(
                        "Warm-up of {table} finished in {} ({} failures)",
                        format_duration(output.elapsed),
                        output.failure_count()
                    );
                    summary.warm_up += 1;
                    continue;
                }

                let result = RunResult::from_outcomes(
                    table,
                    workload,
                    &output.outcomes,
                    &output.completion_order,
                    output.elapsed,
                );
                if result.stats.is_empty() {
                    warn!("{table} ({workload}): no successful queries. {result}");
                } else {
                    info!("{table} ({workload}): {result}");
                }

                let recorded = self.sink.record(&result);
                self.results.push(result);
                recorded?;
                summary.recorded += 1;
            }
        }

        summary.elapsed = start.elapsed();
        info!(
            "Session finished: {} runs recorded, {} warm-up runs in {}",
            summary.recorded,
            summary.warm_up,
            format_duration(summary.elapsed)
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SinkError;
    use crate::executor::{ExecutorError, Neighbor, QueryExecutor};
    use crate::vector::QueryVector;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Calls(Arc<Mutex<Vec<String>>>);

    impl Calls {
        fn per_table(&self, table: &str) -> usize {
            self.0.lock().unwrap().iter().filter(|t| *t == table).count()
        }

        fn total(&self) -> usize {
            self.0.lock().unwrap().len()
        }
    }

    struct CountingExecutor {
        calls: Calls,
        fail: bool,
    }

    impl QueryExecutor for CountingExecutor {
        async fn similarity_search(
            &mut self,
            table: &str,
            _vector: &QueryVector,
            k: usize,
        ) -> Result<Vec<Neighbor>, ExecutorError> {
            self.calls.0.lock().unwrap().push(table.to_string());
            tokio::task::yield_now().await;
            if self.fail {
                Err(ExecutorError::Query("down".into()))
            } else {
                Ok(vec![Neighbor { id: 7, distance: 0.5 }; k])
            }
        }
    }

    #[derive(Clone, Default)]
    struct CountingProvider {
        calls: Calls,
        fail: bool,
    }

    impl ExecutorProvider for CountingProvider {
        type Executor = CountingExecutor;

        async fn worker_executor(&self) -> Result<CountingExecutor, ExecutorError> {
            Ok(CountingExecutor {
                calls: self.calls.clone(),
                fail: self.fail,
            })
        }
    }

    /// Records table names and optionally fails after a number of results.
    #[derive(Clone, Default)]
    struct SpySink {
        seen: Arc<Mutex<Vec<String>>>,
        fail_after: Option<usize>,
        shutdown_after: Option<(usize, Arc<watch::Sender<bool>>)>,
    }

    impl ResultSink for SpySink {
        fn record(&mut self, result: &RunResult) -> Result<(), SinkError> {
            let mut seen = self.seen.lock().unwrap();
            if self.fail_after == Some(seen.len()) {
                return Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full").into());
            }
            seen.push(format!("{}:{}", result.table_name, result.num_queries));
            if let Some((n, tx)) = &self.shutdown_after {
                if seen.len() == *n {
                    let _ = tx.send(true);
                }
            }
            Ok(())
        }
    }

    fn workload(num_queries: usize, num_clients: usize, warm_up: bool) -> WorkloadConfig {
        WorkloadConfig {
            num_queries,
            num_clients: NonZeroUsize::new(num_clients).unwrap(),
            warm_up,
        }
    }

    fn session(
        provider: CountingProvider,
        sink: SpySink,
        workloads: Vec<WorkloadConfig>,
    ) -> BenchmarkSession<CountingProvider> {
        BenchmarkSession::new(provider, Box::new(sink))
            .tables(["a", "b"])
            .workloads(workloads)
            .dimensions(NonZeroUsize::new(4).unwrap())
    }

    #[tracing_test::traced_test]
    #[tokio::test]
    async fn sweeps_workloads_then_tables() {
        let provider = CountingProvider::default();
        let sink = SpySink::default();
        let mut session = session(
            provider.clone(),
            sink.clone(),
            vec![workload(10, 2, false), workload(20, 4, false)],
        );

        let (_tx, rx) = watch::channel(false);
        let summary = session.run(&rx).await.unwrap();

        assert_eq!(summary.recorded, 4);
        assert!(!summary.interrupted);
        assert_eq!(
            *sink.seen.lock().unwrap(),
            vec!["a:10", "b:10", "a:20", "b:20"]
        );
        let tables: Vec<_> = session.results().iter().map(|r| r.table_name.as_str()).collect();
        assert_eq!(tables, vec!["a", "b", "a", "b"]);
        assert_eq!(provider.calls.total(), 60);
        assert!(logs_contain("Session finished"));
    }

    #[tokio::test]
    async fn warm_up_runs_are_executed_but_not_recorded() {
        let provider = CountingProvider::default();
        let sink = SpySink::default();
        let mut session = session(
            provider.clone(),
            sink.clone(),
            vec![workload(25, 5, true), workload(10, 2, false)],
        );

        let (_tx, rx) = watch::channel(false);
        let summary = session.run(&rx).await.unwrap();

        assert_eq!(summary.warm_up, 2);
        assert_eq!(summary.recorded, 2);
        assert_eq!(provider.calls.per_table("a"), 35);
        assert_eq!(provider.calls.per_table("b"), 35);
        assert_eq!(*sink.seen.lock().unwrap(), vec!["a:10", "b:10"]);
        assert!(session.results().iter().all(|r| r.num_queries == 10));
    }

    #[tracing_test::traced_test]
    #[tokio::test]
    async fn all_failed_run_is_still_recorded() {
        let provider = CountingProvider {
            fail: true,
            ..Default::default()
        };
        let mut session = session(provider, SpySink::default(), vec![workload(8, 2, false)]);

        let (_tx, rx) = watch::channel(false);
        session.run(&rx).await.unwrap();

        let results = session.into_results();
        assert_eq!(results.len(), 2);
        for r in results {
            assert_eq!(r.failure_rate, 100.);
            assert_eq!(r.stats.avg, None);
        }
        assert!(logs_contain("no successful queries"));
    }

    #[tokio::test]
    async fn stops_between_runs_on_shutdown() {
        let (tx, rx) = watch::channel(false);
        let provider = CountingProvider::default();
        let sink = SpySink {
            shutdown_after: Some((3, Arc::new(tx))),
            ..Default::default()
        };
        let mut session = session(
            provider.clone(),
            sink.clone(),
            vec![workload(5, 1, false), workload(5, 1, false), workload(5, 1, false)],
        );

        let summary = session.run(&rx).await.unwrap();

        assert!(summary.interrupted);
        assert_eq!(summary.recorded, 3);
        assert_eq!(session.results().len(), 3);
        assert_eq!(provider.calls.total(), 15);
    }

    #[tokio::test]
    async fn shutdown_before_start_runs_nothing() {
        let (_tx, rx) = watch::channel(true);
        let provider = CountingProvider::default();
        let mut session = session(provider.clone(), SpySink::default(), vec![workload(5, 1, false)]);

        let summary = session.run(&rx).await.unwrap();

        assert!(summary.interrupted);
        assert_eq!(summary.recorded, 0);
        assert_eq!(provider.calls.total(), 0);
    }

    #[tokio::test]
    async fn sink_failure_is_fatal_but_keeps_earlier_results() {
        let sink = SpySink {
            fail_after: Some(1),
            ..Default::default()
        };
        let mut session = session(
            CountingProvider::default(),
            sink.clone(),
            vec![workload(4, 2, false)],
        );

        let (_tx, rx) = watch::channel(false);
        let err = session.run(&rx).await.unwrap_err();

        assert!(matches!(err, BenchError::Sink(_)));
        assert_eq!(*sink.seen.lock().unwrap(), vec!["a:4"]);
        assert_eq!(session.results().len(), 2);
    }

    #[tokio::test]
    async fn zero_query_workload() {
        let provider = CountingProvider::default();
        let mut session = session(provider.clone(), SpySink::default(), vec![workload(0, 3, false)]);

        let (_tx, rx) = watch::channel(false);
        session.run(&rx).await.unwrap();

        let result = &session.results()[0];
        assert_eq!(result.num_queries, 0);
        assert_eq!(result.success_rate, 0.);
        assert_eq!(result.failure_rate, 0.);
        assert_eq!(result.stats.throughput, None);
        assert_eq!(provider.calls.total(), 0);
    }
}
