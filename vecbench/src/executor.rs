//! Query executor contracts
//!
//! The benchmark never talks to a database directly. Each run asks an [`ExecutorProvider`] for one
//! [`QueryExecutor`] per worker and drives every similarity query through it.
use crate::vector::QueryVector;
use std::future::Future;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Connection unavailable: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Malformed response: {0}")]
    Malformed(String),
}

/// One row returned by a similarity query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub id: i64,
    pub distance: f64,
}

/// Executes similarity queries. Owned exclusively by a single worker for the duration of a run.
#[trait_variant::make(QueryExecutor: Send)]
pub trait LocalQueryExecutor {
    /// Return the `k` rows of `table` nearest to `vector`, closest first.
    async fn similarity_search(
        &mut self,
        table: &str,
        vector: &QueryVector,
        k: usize,
    ) -> Result<Vec<Neighbor>, ExecutorError>;
}

/// Hands out executors to the workers of a run.
///
/// Implementations backed by a connection that cannot be shared across concurrent callers must
/// return a distinct connection from every call.
pub trait ExecutorProvider: Send + Sync {
    type Executor: QueryExecutor + 'static;

    fn worker_executor(&self) -> impl Future<Output = Result<Self::Executor, ExecutorError>> + Send;
}
