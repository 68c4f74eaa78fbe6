use crate::executor::QueryExecutor;
use crate::vector::VectorGenerator;
use std::num::NonZeroUsize;
use std::time::Instant;
use tracing::error;
use vecbench_core::{BenchmarkConfig, QueryOutcome, DEFAULT_K, DEFAULT_PRECISION};

pub const LATENCY_METRIC: &str = "vecbench_query_latency";
pub const SUCCESS_METRIC: &str = "vecbench_query_success";
pub const ERROR_METRIC: &str = "vecbench_query_error";

/// Fixed shape of the similarity query issued by every worker of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryShape {
    pub table: String,
    pub dimensions: NonZeroUsize,
    pub k: usize,
    pub precision: u32,
}

impl QueryShape {
    pub fn new(table: &str, dimensions: NonZeroUsize) -> Self {
        Self {
            table: table.to_string(),
            dimensions,
            k: DEFAULT_K,
            precision: DEFAULT_PRECISION,
        }
    }

    pub fn from_config(table: &str, config: &BenchmarkConfig) -> Self {
        Self {
            table: table.to_string(),
            dimensions: config.dimensions,
            k: config.k,
            precision: config.precision,
        }
    }

    pub fn vector_generator(&self) -> VectorGenerator {
        VectorGenerator::new(self.dimensions, self.precision)
    }
}

/// Issue one query and time the executor call alone.
pub(crate) async fn timed_query<E: QueryExecutor>(
    executor: &mut E,
    shape: &QueryShape,
    vectors: &mut VectorGenerator,
) -> QueryOutcome {
    let vector = vectors.generate();

    let start = Instant::now();
    let res = executor
        .similarity_search(&shape.table, &vector, shape.k)
        .await;
    let elapsed = start.elapsed();

    match res {
        Ok(_) => {
            #[cfg(feature = "metrics")]
            {
                let table = shape.table.clone();
                metrics::describe_histogram!(LATENCY_METRIC, metrics::Unit::Seconds, "");
                metrics::histogram!(LATENCY_METRIC, "table" => table.clone())
                    .record(elapsed.as_secs_f64());
                metrics::counter!(SUCCESS_METRIC, "table" => table).increment(1);
            }
            QueryOutcome::Success(elapsed)
        }
        Err(err) => {
            error!("Error running query on {}: {err}", shape.table);
            #[cfg(feature = "metrics")]
            metrics::counter!(ERROR_METRIC, "table" => shape.table.clone()).increment(1);
            QueryOutcome::Failure
        }
    }
}
