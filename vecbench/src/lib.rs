#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

pub mod engine;
pub mod error;
pub mod executor;
pub mod query;
pub mod session;
pub mod sink;
pub mod vector;

pub use vecbench_core as core;

pub use engine::{run, RunOutput};
pub use session::{BenchmarkSession, SessionSummary};

pub mod prelude {
    pub use crate::error::{BenchError, SinkError};
    pub use crate::executor::{
        ExecutorError, ExecutorProvider, LocalQueryExecutor, Neighbor, QueryExecutor,
    };
    pub use crate::query::QueryShape;
    pub use crate::session::{BenchmarkSession, SessionSummary};
    pub use crate::sink::ResultSink;
    pub use crate::vector::{QueryVector, VectorGenerator};

    pub use vecbench_core::{
        BenchmarkConfig, LatencyStats, QueryOutcome, RunResult, WorkloadConfig,
    };
}
