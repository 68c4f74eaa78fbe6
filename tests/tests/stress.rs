mod utils;
#[allow(unused)]
use utils::*;

mod tests {
    use super::*;

    use std::num::{NonZeroU32, NonZeroUsize};
    use std::time::Duration;
    use vecbench::prelude::*;
    use vecbench_mock::{Latency, MockProvider};

    fn workload(num_queries: usize, num_clients: usize) -> WorkloadConfig {
        WorkloadConfig {
            num_queries,
            num_clients: NonZeroUsize::new(num_clients).unwrap(),
            warm_up: false,
        }
    }

    fn shape() -> QueryShape {
        QueryShape::new("items_hnsw", NonZeroUsize::new(128).unwrap())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    #[ntest::timeout(20_000)]
    async fn saturated_pool() {
        init();

        let provider = MockProvider::new(Latency::fixed(Duration::from_millis(10))).failure_rate(0.1);
        let stats = provider.stats();

        let output = vecbench::run(&provider, &shape(), &workload(1000, 50)).await;

        assert_eq!(output.outcomes.len(), 1000);
        assert_eq!(output.completion_order.len(), 1000);
        assert_eq!(output.success_count() + output.failure_count(), 1000);
        assert_eq!(stats.calls(), 1000);
        assert_eq!(stats.executors(), 50);

        let failures = output.failure_count();
        assert!((55..=145).contains(&failures), "{failures} failures");
        assert_eq!(failures, stats.failures());

        // 20 rounds of 50 parallel 10ms queries, nowhere near the 10s a serial run would take
        assert!(output.elapsed >= Duration::from_millis(190), "{:?}", output.elapsed);
        assert!(output.elapsed < Duration::from_secs(2), "{:?}", output.elapsed);
        assert!(stats.peak_in_flight() <= 50);

        let result = RunResult::from_outcomes(
            "items_hnsw",
            &workload(1000, 50),
            &output.outcomes,
            &output.completion_order,
            output.elapsed,
        );
        assert!((result.success_rate + result.failure_rate - 100.).abs() < 1e-9);
        assert_eq!(result.latencies.len(), 1000 - failures);

        // Latency-sum throughput of one client versus the whole pool
        let throughput = result.stats.throughput.unwrap();
        assert!(throughput < 110., "{throughput}");
        assert!(result.wall_clock_throughput > 500., "{}", result.wall_clock_throughput);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ntest::timeout(20_000)]
    async fn jittered_latency() {
        init();

        let latency = Latency::normal(Duration::from_millis(5), Duration::from_millis(2)).unwrap();
        let provider = MockProvider::new(latency);

        let output = vecbench::run(&provider, &shape(), &workload(400, 16)).await;
        let result = RunResult::from_outcomes(
            "items_hnsw",
            &workload(400, 16),
            &output.outcomes,
            &output.completion_order,
            output.elapsed,
        );

        assert_eq!(result.success_rate, 100.);
        let stats = result.stats;
        let (min, p50, p90, p99, max) = (
            stats.min.unwrap(),
            stats.p50.unwrap(),
            stats.p90.unwrap(),
            stats.p99.unwrap(),
            stats.max.unwrap(),
        );
        assert!(min <= p50 && p50 <= p90 && p90 <= p99 && p99 <= max);
        assert!(stats.stddev.unwrap() > 0.);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ntest::timeout(20_000)]
    async fn unavailable_database() {
        init();

        let provider = MockProvider::new(Latency::fixed(Duration::from_millis(1))).unavailable();
        let output = vecbench::run(&provider, &shape(), &workload(100, 10)).await;

        assert_eq!(output.outcomes.len(), 100);
        assert_eq!(output.failure_count(), 100);
        assert_eq!(provider.stats().calls(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ntest::timeout(20_000)]
    async fn overloaded_database() {
        init();

        let provider = MockProvider::new(Latency::fixed(Duration::from_millis(1)))
            .max_qps(NonZeroU32::new(50).unwrap());
        let output = vecbench::run(&provider, &shape(), &workload(300, 10)).await;

        assert_eq!(output.outcomes.len(), 300);
        assert!(output.failure_count() > 0);
        assert!(output.success_count() > 0);
    }
}
