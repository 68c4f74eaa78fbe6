use anyhow::Context;
use clap::Parser;
use humantime::format_duration;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::time::Instant;
#[allow(unused)]
use tracing::{debug, error, info, warn};
use vecbench::core::PopulateConfig;
use vecbench::prelude::*;
use vecbench::sink::{CsvSink, LatencyLogSink};

mod cli;
mod logging;
mod populate;
mod postgres;
mod results;
mod signal;

use cli::{CheckArgs, Command, PopulateArgs, RunArgs, VecbenchCli};
use postgres::PgProvider;
use results::ResultsDir;
use signal::Shutdown;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    match VecbenchCli::parse().subcommand() {
        Command::Run(args) => run(args).await,
        Command::Populate(args) => populate_tables(args).await,
        Command::Check(args) => check(args).await,
    }
}

async fn run(args: RunArgs) -> anyhow::Result<()> {
    let config = BenchmarkConfig::load(&args.config, &args.overrides())
        .with_context(|| format!("Invalid configuration in {}", args.config.display()))?;

    let results = ResultsDir::create(&config.results_dir, &logging::timestamp()?)?;
    logging::init(Some(&results.log))?;
    info!("Writing results to {}", results.dir.display());

    if let Some(addr) = args.metrics_addr {
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("Unable to start the metrics exporter")?;
        info!("Serving metrics on {addr}");
    }

    let mut sinks: Vec<Box<dyn ResultSink>> = vec![Box::new(
        CsvSink::create(&results.csv).context("Unable to create the results file")?,
    )];
    if args.raw_latencies {
        sinks.push(Box::new(
            LatencyLogSink::create(&results.latencies)
                .context("Unable to create the latency file")?,
        ));
    }

    let max_connections = config
        .db
        .max_connections
        .unwrap_or(config.max_clients() as u32);
    let provider = PgProvider::connect(&config.db, max_connections, config.metric)
        .await
        .context("Unable to connect to the database")?;

    let shutdown = Shutdown::listen();
    let start = Instant::now();
    let mut session = BenchmarkSession::from_config(provider.clone(), &config, Box::new(sinks));

    let outcome = tokio::select! {
        res = session.run(&shutdown.stop) => Some(res),
        _ = shutdown.abandon.notified() => None,
    };
    drop(shutdown);
    provider.close().await;

    let res = match outcome {
        Some(Ok(summary)) if summary.interrupted => {
            warn!("Benchmark stopped early, {} runs recorded", summary.recorded);
            Ok(())
        }
        Some(Ok(summary)) => {
            info!("Benchmark completed, {} runs recorded", summary.recorded);
            Ok(())
        }
        Some(Err(err)) => {
            error!("Benchmark failed: {err}");
            Err(err.into())
        }
        None => {
            warn!(
                "Benchmark abandoned, {} runs recorded",
                session.results().len()
            );
            Ok(())
        }
    };

    info!("Total benchmark time: {}", format_duration(start.elapsed()));
    res
}

async fn populate_tables(args: PopulateArgs) -> anyhow::Result<()> {
    let config = PopulateConfig::load(&args.config, &args.overrides())
        .with_context(|| format!("Invalid configuration in {}", args.config.display()))?;

    std::fs::create_dir_all(&args.log_dir)
        .with_context(|| format!("Unable to create {}", args.log_dir.display()))?;
    let log = args
        .log_dir
        .join(format!("data_generator_{}.log", logging::timestamp()?));
    logging::init(Some(&log))?;

    let shutdown = Shutdown::listen();
    let start = Instant::now();
    let finished = populate::populate(&config, &shutdown.stop).await?;

    if finished {
        info!("Population finished in {}", format_duration(start.elapsed()));
    } else {
        warn!("Population interrupted after {}", format_duration(start.elapsed()));
    }
    Ok(())
}

async fn check(args: CheckArgs) -> anyhow::Result<()> {
    let config = BenchmarkConfig::load(&args.config, &args.overrides())
        .with_context(|| format!("Invalid configuration in {}", args.config.display()))?;
    logging::init(None)?;

    info!(
        "Trying to connect to the database at {}:{}...",
        config.db.host, config.db.port
    );
    postgres::check_connection(&config.db)
        .await
        .context("Error connecting to the database")?;
    info!("Database connection successful!");
    Ok(())
}
