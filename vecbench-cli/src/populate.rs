//! Table provisioning
//!
//! Fills the single un-indexed table with seeded random vectors, copies its rows into every other
//! table and then builds the configured index on each of them.
use crate::postgres::connect_options;
use anyhow::{anyhow, Context};
use humantime::format_duration;
use sqlx::postgres::PgConnection;
use sqlx::{Connection, Postgres, QueryBuilder};
use std::time::Instant;
use tokio::sync::watch;
#[allow(unused)]
use tracing::{debug, error, info, instrument, warn};
use vecbench::core::{IndexKind, PopulateConfig};
use vecbench::vector::VectorGenerator;

/// Postgres accepts at most this many bind parameters per statement.
const MAX_BINDS: usize = u16::MAX as usize;

pub fn create_table_sql(table: &str, dimensions: usize) -> String {
    format!("CREATE TABLE {table} (id SERIAL PRIMARY KEY, embedding VECTOR({dimensions}))")
}

pub fn create_index_sql(table: &str, kind: IndexKind, with: &str) -> String {
    format!("CREATE INDEX {table}_{kind}_idx ON {table} USING {kind} (embedding vector_l2_ops) {with}")
}

pub fn set_sql(name: &str, value: &str) -> String {
    format!("SET {name} = '{}'", value.replace('\'', "''"))
}

/// Returns `false` when population stopped early on a shutdown request.
#[instrument(name = "populate", skip_all, fields(dimensions = config.dimensions.get(), num_rows = config.num_rows))]
pub async fn populate(
    config: &PopulateConfig,
    shutdown: &watch::Receiver<bool>,
) -> anyhow::Result<bool> {
    let source = config
        .source_table()
        .ok_or_else(|| anyhow!("No table without an index to populate"))?;

    let mut conn = PgConnection::connect_with(&connect_options(&config.db))
        .await
        .context("Unable to connect to the database")?;
    info!("Connected to {}:{}/{}", config.db.host, config.db.port, config.db.dbname);

    let finished = run_steps(&mut conn, config, source, shutdown).await;

    conn.close().await.context("Unable to close the connection")?;
    info!("Database connection closed.");
    finished
}

async fn run_steps(
    conn: &mut PgConnection,
    config: &PopulateConfig,
    source: &str,
    shutdown: &watch::Receiver<bool>,
) -> anyhow::Result<bool> {
    for (name, value) in &config.settings {
        sqlx::query(&set_sql(name, value))
            .execute(&mut *conn)
            .await
            .with_context(|| format!("Unable to set {name}"))?;
        info!("Set {name} to {value}");
    }

    sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
        .execute(&mut *conn)
        .await
        .context("Unable to enable the vector extension")?;

    if config.recreate_tables {
        info!("Recreating tables...");
        for table in config.tables.keys() {
            sqlx::query(&format!("DROP TABLE IF EXISTS {table}"))
                .execute(&mut *conn)
                .await
                .with_context(|| format!("Unable to drop {table}"))?;
            sqlx::query(&create_table_sql(table, config.dimensions.get()))
                .execute(&mut *conn)
                .await
                .with_context(|| format!("Unable to create {table}"))?;
            info!("Table {table} recreated");
        }
    }

    if !fill_source(conn, config, source, shutdown).await? {
        return Ok(false);
    }

    for (table, _) in config.indexed_tables() {
        if *shutdown.borrow() {
            warn!("Shutdown requested, not copying into {table}");
            return Ok(false);
        }
        info!("Copying data from {source} to {table}...");
        sqlx::query(&format!(
            "INSERT INTO {table} (embedding) SELECT embedding FROM {source}"
        ))
        .execute(&mut *conn)
        .await
        .with_context(|| format!("Unable to copy rows into {table}"))?;
    }

    for (table, kind) in config.indexed_tables() {
        if *shutdown.borrow() {
            warn!("Shutdown requested, not indexing {table}");
            return Ok(false);
        }
        let with = config
            .index_configs
            .get(&kind)
            .map(String::as_str)
            .unwrap_or_default();

        info!("Creating {kind} index on {table}...");
        let start = Instant::now();
        sqlx::query(&create_index_sql(table, kind, with))
            .execute(&mut *conn)
            .await
            .with_context(|| format!("Unable to create {kind} index on {table}"))?;
        info!(
            "{kind} index {with} created for {table} in {}",
            format_duration(start.elapsed())
        );
    }

    info!("Data generation completed successfully.");
    Ok(true)
}

async fn fill_source(
    conn: &mut PgConnection,
    config: &PopulateConfig,
    source: &str,
    shutdown: &watch::Receiver<bool>,
) -> anyhow::Result<bool> {
    info!("Populating {source} with {} embeddings...", config.num_rows);
    let mut vectors = VectorGenerator::seeded(config.dimensions, config.precision, config.seed);
    let batch_size = config.batch_size.get().min(MAX_BINDS);
    let start = Instant::now();

    let mut inserted = 0;
    while inserted < config.num_rows {
        if *shutdown.borrow() {
            warn!("Data generation interrupted after {inserted} rows.");
            return Ok(false);
        }

        let n = batch_size.min(config.num_rows - inserted);
        let batch: Vec<_> = (0..n).map(|_| vectors.generate()).collect();

        let mut insert = QueryBuilder::<Postgres>::new(format!("INSERT INTO {source} (embedding) "));
        insert.push_values(batch, |mut row, vector| {
            row.push_bind(vector.literal().to_string())
                .push_unseparated("::vector");
        });
        insert
            .build()
            .execute(&mut *conn)
            .await
            .with_context(|| format!("Unable to insert into {source}"))?;

        inserted += n;
        debug!("{inserted}/{} rows inserted into {source}", config.num_rows);
    }

    info!(
        "Table {source} populated with {inserted} rows in {}",
        format_duration(start.elapsed())
    );
    Ok(true)
}
