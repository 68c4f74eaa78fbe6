//! PostgreSQL + pgvector executor
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row};
use std::collections::HashMap;
#[allow(unused)]
use tracing::{debug, error, info, warn};
use vecbench::core::{DbConfig, DistanceMetric};
use vecbench::prelude::*;

pub fn connect_options(db: &DbConfig) -> PgConnectOptions {
    let options = PgConnectOptions::new()
        .host(&db.host)
        .port(db.port)
        .database(&db.dbname)
        .username(&db.user);

    match &db.password {
        Some(password) => options.password(password),
        None => options,
    }
}

/// Text of the similarity query against `table`. `$1` is the vector literal, `$2` is `k`.
pub fn similarity_query(table: &str, metric: DistanceMetric) -> String {
    format!(
        "SELECT id, embedding {} $1::vector AS distance FROM {table} ORDER BY distance LIMIT $2",
        metric.operator()
    )
}

fn executor_error(err: sqlx::Error) -> ExecutorError {
    match err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => ExecutorError::Connection(err.to_string()),
        sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::Protocol(_) => ExecutorError::Malformed(err.to_string()),
        _ => ExecutorError::Query(err.to_string()),
    }
}

/// Hands every worker its own pooled connection.
#[derive(Clone)]
pub struct PgProvider {
    pool: PgPool,
    metric: DistanceMetric,
}

impl PgProvider {
    pub async fn connect(
        db: &DbConfig,
        max_connections: u32,
        metric: DistanceMetric,
    ) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_with(connect_options(db))
            .await?;
        info!(
            "Connected to {}:{}/{} with up to {max_connections} connections",
            db.host, db.port, db.dbname
        );

        Ok(Self { pool, metric })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
        info!("Database connections closed.");
    }
}

impl ExecutorProvider for PgProvider {
    type Executor = PgExecutor;

    async fn worker_executor(&self) -> Result<PgExecutor, ExecutorError> {
        let conn = self.pool.acquire().await.map_err(executor_error)?;
        Ok(PgExecutor {
            conn,
            metric: self.metric,
            statements: HashMap::new(),
        })
    }
}

pub struct PgExecutor {
    conn: PoolConnection<Postgres>,
    metric: DistanceMetric,
    statements: HashMap<String, String>,
}

impl QueryExecutor for PgExecutor {
    async fn similarity_search(
        &mut self,
        table: &str,
        vector: &QueryVector,
        k: usize,
    ) -> Result<Vec<Neighbor>, ExecutorError> {
        if !self.statements.contains_key(table) {
            self.statements
                .insert(table.to_string(), similarity_query(table, self.metric));
        }
        let Some(sql) = self.statements.get(table) else {
            return Err(ExecutorError::Query(format!("no statement for {table}")));
        };

        let rows = sqlx::query(sql)
            .bind(vector.literal())
            .bind(k as i64)
            .fetch_all(&mut *self.conn)
            .await
            .map_err(executor_error)?;

        rows.iter().map(neighbor).collect()
    }
}

fn neighbor(row: &PgRow) -> Result<Neighbor, ExecutorError> {
    let id: i32 = row.try_get("id").map_err(executor_error)?;
    let distance: f64 = row.try_get("distance").map_err(executor_error)?;
    Ok(Neighbor {
        id: id.into(),
        distance,
    })
}

/// Run `SELECT 1` on a fresh connection.
pub async fn check_connection(db: &DbConfig) -> Result<(), sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect_with(connect_options(db))
        .await?;
    let one: i32 = sqlx::query_scalar("SELECT 1").fetch_one(&pool).await?;
    debug!("SELECT 1 returned {one}");
    pool.close().await;
    Ok(())
}
