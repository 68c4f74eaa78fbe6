mod utils;
#[allow(unused)]
use utils::*;

mod tests {
    use super::*;

    use std::time::Duration;
    use tokio::sync::watch;
    use vecbench::core::ConfigOverrides;
    use vecbench::prelude::*;
    use vecbench::sink::{CsvSink, LatencyLogSink, CSV_HEADER};
    use vecbench_mock::{Latency, MockProvider};

    const CONFIG: &str = r#"{
        "db": {
            "hosts": { "128": "10.0.0.1", "512": "10.0.0.2" },
            "dbname": "vectors",
            "user": "bench"
        },
        "benchmark": {
            "tables": ["items_no_index", "items_hnsw", "items_ivfflat"],
            "query_configs": [
                { "num_queries": 20, "num_clients": 4, "warm_up": true },
                { "num_queries": 40, "num_clients": 4 },
                { "num_queries": 60, "num_clients": 12 }
            ],
            "dimensions": 128
        }
    }"#;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ntest::timeout(20_000)]
    async fn sweep_writes_csv_and_latencies() {
        let metrics = init();

        let dir = tempfile::tempdir().unwrap();
        let overrides = ConfigOverrides {
            tables: Some(vec!["items_hnsw".to_string(), "items_ivfflat".to_string()]),
            results_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        let config = BenchmarkConfig::from_json(CONFIG, &overrides).unwrap();
        assert_eq!(config.db.host, "10.0.0.1");
        assert_eq!(config.max_clients(), 12);

        let csv = config.results_dir.join("results.csv");
        let log = config.results_dir.join("latencies.csv");
        let sinks: Vec<Box<dyn ResultSink>> = vec![
            Box::new(CsvSink::create(&csv).unwrap()),
            Box::new(LatencyLogSink::create(&log).unwrap()),
        ];

        let provider = MockProvider::new(Latency::fixed(Duration::from_millis(2)));
        let stats = provider.stats();
        let mut session = BenchmarkSession::from_config(provider, &config, Box::new(sinks));

        let (_tx, shutdown) = watch::channel(false);
        let summary = session.run(&shutdown).await.unwrap();

        assert_eq!(summary.warm_up, 2);
        assert_eq!(summary.recorded, 4);
        assert!(!summary.interrupted);
        // Warm-up queries reach the database but never the results
        assert_eq!(stats.calls(), 2 * (20 + 40 + 60));

        let text = std::fs::read_to_string(&csv).unwrap();
        let rows: Vec<Vec<&str>> = text.lines().map(|l| l.split(',').collect()).collect();
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0], CSV_HEADER.to_vec());
        let keys: Vec<_> = rows[1..].iter().map(|r| (r[0], r[1], r[2])).collect();
        assert_eq!(
            keys,
            vec![
                ("items_hnsw", "40", "4"),
                ("items_ivfflat", "40", "4"),
                ("items_hnsw", "60", "12"),
                ("items_ivfflat", "60", "12"),
            ]
        );
        for row in &rows[1..] {
            assert_eq!(row[13].parse::<f64>().unwrap(), 100.);
            assert_eq!(row[14].parse::<f64>().unwrap(), 0.);
            assert_ne!(row[11], row[12], "throughput columns must differ");
        }

        let latencies = std::fs::read_to_string(&log).unwrap();
        assert_eq!(latencies.lines().count(), 1 + 2 * (40 + 60));

        let rendered = metrics.render();
        assert!(rendered.contains("vecbench_query_latency"));
        assert!(rendered.contains("items_hnsw"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ntest::timeout(20_000)]
    async fn failing_database_still_reports() {
        init();

        let config = BenchmarkConfig::from_json(CONFIG, &ConfigOverrides::default()).unwrap();
        let provider = MockProvider::new(Latency::fixed(Duration::from_millis(1))).failure_rate(1.);
        let mut session = BenchmarkSession::from_config(
            provider,
            &config,
            Box::new(vecbench::sink::NullSink),
        );

        let (_tx, shutdown) = watch::channel(false);
        session.run(&shutdown).await.unwrap();

        let results = session.into_results();
        assert_eq!(results.len(), 6);
        for result in results {
            assert_eq!(result.failure_rate, 100.);
            assert_eq!(result.success_rate, 0.);
            assert!(result.stats.is_empty());
            assert!(result.latencies.is_empty());
        }
    }

    #[test]
    fn config_errors_are_collected() {
        let text = r#"{
            "db": { "dbname": "vectors" },
            "benchmark": {
                "tables": ["items"],
                "query_configs": [{ "num_queries": 10, "num_clients": 0 }],
                "dimensions": 0
            }
        }"#;
        let err = BenchmarkConfig::from_json(text, &ConfigOverrides::default()).unwrap_err();
        assert!(err.issues().len() >= 3, "{err}");
    }
}
