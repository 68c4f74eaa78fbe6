use crate::{LatencyStats, WorkloadConfig};
use std::fmt;
use std::time::Duration;

/// Result of a single query attempt.
///
/// Latency only exists for successful queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOutcome {
    Success(Duration),
    Failure,
}

impl QueryOutcome {
    pub fn latency(&self) -> Option<Duration> {
        match self {
            QueryOutcome::Success(latency) => Some(*latency),
            QueryOutcome::Failure => None,
        }
    }

    pub fn succeeded(&self) -> bool {
        matches!(self, QueryOutcome::Success(_))
    }
}

/// Aggregate record for one (table, workload) run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunResult {
    pub table_name: String,
    pub num_queries: usize,
    pub num_clients: usize,
    pub stats: LatencyStats,
    /// `num_queries / elapsed_time`. Distinct from `stats.throughput`, which is based on the sum
    /// of latencies.
    pub wall_clock_throughput: f64,
    /// Percentage of `num_queries`.
    pub success_rate: f64,
    /// Percentage of `num_queries`.
    pub failure_rate: f64,
    /// Wall-clock seconds from the first submission to the last collected outcome.
    pub elapsed_time: f64,
    /// Successful latencies (seconds) in completion order.
    pub latencies: Vec<f64>,
}

impl RunResult {
    /// Build a result from the outcomes of a run.
    ///
    /// `outcomes` is indexed by submission order, `completion_order` holds the same indices in
    /// the order queries completed.
    pub fn from_outcomes(
        table_name: &str,
        workload: &WorkloadConfig,
        outcomes: &[QueryOutcome],
        completion_order: &[usize],
        elapsed: Duration,
    ) -> Self {
        let num_queries = workload.num_queries;
        let success = outcomes.iter().filter(|o| o.succeeded()).count();
        let failure = outcomes.len() - success;

        let latencies: Vec<f64> = completion_order
            .iter()
            .filter_map(|idx| outcomes.get(*idx))
            .filter_map(QueryOutcome::latency)
            .map(|l| l.as_secs_f64())
            .collect();

        let (success_rate, failure_rate) = if num_queries > 0 {
            (
                success as f64 / num_queries as f64 * 100.,
                failure as f64 / num_queries as f64 * 100.,
            )
        } else {
            (0., 0.)
        };

        let elapsed_time = elapsed.as_secs_f64();
        let wall_clock_throughput = if elapsed_time > 0. {
            num_queries as f64 / elapsed_time
        } else {
            0.
        };

        Self {
            table_name: table_name.to_string(),
            num_queries,
            num_clients: workload.num_clients.get(),
            stats: LatencyStats::aggregate(&latencies),
            wall_clock_throughput,
            success_rate,
            failure_rate,
            elapsed_time,
            latencies,
        }
    }

    pub fn success_count(&self) -> usize {
        self.latencies.len()
    }

    pub fn failure_count(&self) -> usize {
        self.num_queries.saturating_sub(self.success_count())
    }
}

fn display_opt(v: Option<f64>, unit: &str) -> String {
    match v {
        Some(v) => format!("{v:.4}{unit}"),
        None => "n/a".to_string(),
    }
}

impl fmt::Display for RunResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AvgLatency={}, p50={}, p99={}, Throughput={}, WallClockThroughput={:.2}q/s, SuccessRate={:.2}%, FailureRate={:.2}%, Elapsed={:.2}s",
            display_opt(self.stats.avg, "s"),
            display_opt(self.stats.p50, "s"),
            display_opt(self.stats.p99, "s"),
            display_opt(self.stats.throughput, "q/s"),
            self.wall_clock_throughput,
            self.success_rate,
            self.failure_rate,
            self.elapsed_time,
        )
    }
}
