//! Result sinks
//!
//! Each completed run is handed to a [`ResultSink`] as soon as it is aggregated, so partial
//! results survive an interrupted session.
use crate::error::SinkError;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use vecbench_core::RunResult;

pub trait ResultSink: Send {
    fn record(&mut self, result: &RunResult) -> Result<(), SinkError>;
}

impl ResultSink for Vec<Box<dyn ResultSink>> {
    fn record(&mut self, result: &RunResult) -> Result<(), SinkError> {
        for sink in self.iter_mut() {
            sink.record(result)?;
        }
        Ok(())
    }
}

/// Discards every result.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ResultSink for NullSink {
    fn record(&mut self, _result: &RunResult) -> Result<(), SinkError> {
        Ok(())
    }
}

pub const CSV_HEADER: [&str; 16] = [
    "table_name",
    "num_queries",
    "num_clients",
    "avg_latency",
    "min_latency",
    "max_latency",
    "p50_latency",
    "p90_latency",
    "p95_latency",
    "p99_latency",
    "stddev_latency",
    "throughput",
    "wall_clock_throughput",
    "success_rate",
    "failure_rate",
    "elapsed_time",
];

pub const LATENCY_HEADER: [&str; 5] = [
    "table_name",
    "num_queries",
    "num_clients",
    "sequence",
    "latency",
];

// Field order follows `CSV_HEADER`.
#[derive(Serialize)]
struct ResultRow<'a> {
    table_name: &'a str,
    num_queries: usize,
    num_clients: usize,
    avg_latency: Option<f64>,
    min_latency: Option<f64>,
    max_latency: Option<f64>,
    p50_latency: Option<f64>,
    p90_latency: Option<f64>,
    p95_latency: Option<f64>,
    p99_latency: Option<f64>,
    stddev_latency: Option<f64>,
    throughput: Option<f64>,
    wall_clock_throughput: f64,
    success_rate: f64,
    failure_rate: f64,
    elapsed_time: f64,
}

impl<'a> From<&'a RunResult> for ResultRow<'a> {
    fn from(result: &'a RunResult) -> Self {
        let stats = &result.stats;
        Self {
            table_name: &result.table_name,
            num_queries: result.num_queries,
            num_clients: result.num_clients,
            avg_latency: stats.avg,
            min_latency: stats.min,
            max_latency: stats.max,
            p50_latency: stats.p50,
            p90_latency: stats.p90,
            p95_latency: stats.p95,
            p99_latency: stats.p99,
            stddev_latency: stats.stddev,
            throughput: stats.throughput,
            wall_clock_throughput: result.wall_clock_throughput,
            success_rate: result.success_rate,
            failure_rate: result.failure_rate,
            elapsed_time: result.elapsed_time,
        }
    }
}

#[derive(Serialize)]
struct LatencyRow<'a> {
    table_name: &'a str,
    num_queries: usize,
    num_clients: usize,
    sequence: usize,
    latency: f64,
}

/// Header is written up front so that an empty session still leaves a well-formed file.
fn writer_with_header<W: Write>(inner: W, header: &[&str]) -> Result<csv::Writer<W>, SinkError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(inner);
    writer.write_record(header)?;
    writer.flush()?;
    Ok(writer)
}

fn into_inner<W: Write>(writer: csv::Writer<W>) -> Result<W, SinkError> {
    writer
        .into_inner()
        .map_err(|err| SinkError::Io(err.into_error()))
}

/// One row per run. Statistics that are undefined for a run with no successes are left empty.
pub struct CsvSink<W: Write + Send> {
    writer: csv::Writer<W>,
}

impl CsvSink<File> {
    pub fn create(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        Self::new(File::create(path)?)
    }
}

impl<W: Write + Send> CsvSink<W> {
    /// Wrap `inner`, writing the header immediately.
    pub fn new(inner: W) -> Result<Self, SinkError> {
        Ok(Self {
            writer: writer_with_header(inner, &CSV_HEADER)?,
        })
    }

    pub fn into_inner(self) -> Result<W, SinkError> {
        into_inner(self.writer)
    }
}

impl<W: Write + Send> ResultSink for CsvSink<W> {
    fn record(&mut self, result: &RunResult) -> Result<(), SinkError> {
        self.writer.serialize(ResultRow::from(result))?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Every successful latency of every run, one line each, in completion order.
pub struct LatencyLogSink<W: Write + Send> {
    writer: csv::Writer<W>,
}

impl LatencyLogSink<File> {
    pub fn create(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        Self::new(File::create(path)?)
    }
}

impl<W: Write + Send> LatencyLogSink<W> {
    pub fn new(inner: W) -> Result<Self, SinkError> {
        Ok(Self {
            writer: writer_with_header(inner, &LATENCY_HEADER)?,
        })
    }

    pub fn into_inner(self) -> Result<W, SinkError> {
        into_inner(self.writer)
    }
}

impl<W: Write + Send> ResultSink for LatencyLogSink<W> {
    fn record(&mut self, result: &RunResult) -> Result<(), SinkError> {
        for (sequence, latency) in result.latencies.iter().enumerate() {
            self.writer.serialize(LatencyRow {
                table_name: &result.table_name,
                num_queries: result.num_queries,
                num_clients: result.num_clients,
                sequence,
                latency: *latency,
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
