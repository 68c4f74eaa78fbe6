use super::{is_identifier, positive, precision, ConfigOverrides, DbConfig, RawDbConfig};
use crate::{ConfigError, ConfigIssue};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::num::NonZeroUsize;
use std::path::Path;

/// Approximate nearest-neighbor index types understood by pgvector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    Hnsw,
    Ivfflat,
}

impl IndexKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexKind::Hnsw => "hnsw",
            IndexKind::Ivfflat => "ivfflat",
        }
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated configuration for provisioning benchmark tables.
#[derive(Debug, Clone, PartialEq)]
pub struct PopulateConfig {
    pub db: DbConfig,
    /// Table name to index kind; exactly one table has no index and is the copy source.
    pub tables: BTreeMap<String, Option<IndexKind>>,
    pub dimensions: NonZeroUsize,
    pub num_rows: usize,
    pub batch_size: NonZeroUsize,
    pub seed: u64,
    pub recreate_tables: bool,
    pub precision: u32,
    /// Trailing `WITH (...)` clause per index kind.
    pub index_configs: BTreeMap<IndexKind, String>,
    /// Session parameters applied with `SET` before any work.
    pub settings: BTreeMap<String, String>,
}

impl PopulateConfig {
    pub fn load(path: &Path, overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text, overrides)
    }

    pub fn from_json(text: &str, overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        let raw: RawPopulateConfig = serde_json::from_str(text)?;
        raw.validate(overrides)
    }

    /// The un-indexed table that is populated first and copied into the others.
    pub fn source_table(&self) -> Option<&str> {
        self.tables
            .iter()
            .find(|(_, kind)| kind.is_none())
            .map(|(name, _)| name.as_str())
    }

    pub fn indexed_tables(&self) -> impl Iterator<Item = (&str, IndexKind)> {
        self.tables
            .iter()
            .filter_map(|(name, kind)| kind.map(|k| (name.as_str(), k)))
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawGenerator {
    #[serde(default)]
    tables: BTreeMap<String, Option<IndexKind>>,
    dimensions: Option<i64>,
    num_rows: Option<i64>,
    batch_size: Option<i64>,
    seed: Option<u64>,
    #[serde(default)]
    recreate_tables: bool,
    precision: Option<u32>,
    #[serde(default)]
    index_configs: BTreeMap<IndexKind, String>,
    #[serde(default)]
    settings: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct RawPopulateConfig {
    db: Option<RawDbConfig>,
    generator: Option<RawGenerator>,
}

impl RawPopulateConfig {
    fn validate(self, overrides: &ConfigOverrides) -> Result<PopulateConfig, ConfigError> {
        let mut issues = vec![];

        if self.db.is_none() {
            issues.push(ConfigIssue::new("db", "section is missing"));
        }
        if self.generator.is_none() {
            issues.push(ConfigIssue::new("generator", "section is missing"));
        }
        let gen = self.generator.unwrap_or_default();

        let dimensions = positive(gen.dimensions, "generator.dimensions", &mut issues);
        let batch_size = positive(gen.batch_size, "generator.batch_size", &mut issues);
        let db = self
            .db
            .unwrap_or_default()
            .validate(dimensions, overrides, &mut issues);

        let num_rows = match gen.num_rows {
            Some(n) if n >= 0 => n as usize,
            Some(n) => {
                issues.push(ConfigIssue::new(
                    "generator.num_rows",
                    format!("must not be negative, got {n}"),
                ));
                0
            }
            None => {
                issues.push(ConfigIssue::new("generator.num_rows", "is required"));
                0
            }
        };
        if gen.seed.is_none() {
            issues.push(ConfigIssue::new("generator.seed", "is required"));
        }

        if gen.tables.is_empty() {
            issues.push(ConfigIssue::new("generator.tables", "at least one table is required"));
        }
        for name in gen.tables.keys() {
            if !is_identifier(name) {
                issues.push(ConfigIssue::new(
                    "generator.tables",
                    format!("`{name}` is not a valid SQL identifier"),
                ));
            }
        }
        let unindexed = gen.tables.values().filter(|k| k.is_none()).count();
        if !gen.tables.is_empty() && unindexed != 1 {
            issues.push(ConfigIssue::new(
                "generator.tables",
                format!("exactly one table without an index is required, found {unindexed}"),
            ));
        }
        let kinds: BTreeSet<_> = gen.tables.values().flatten().collect();
        for kind in kinds {
            if !gen.index_configs.contains_key(kind) {
                issues.push(ConfigIssue::new(
                    format!("generator.index_configs.{kind}"),
                    "is required by a table using this index",
                ));
            }
        }
        for key in gen.settings.keys() {
            if !is_identifier(key) {
                issues.push(ConfigIssue::new(
                    "generator.settings",
                    format!("`{key}` is not a valid parameter name"),
                ));
            }
        }
        let precision = precision(gen.precision, "generator.precision", &mut issues);

        if !issues.is_empty() {
            return Err(ConfigError::Invalid(issues));
        }

        match (db, dimensions, batch_size, gen.seed) {
            (Some(db), Some(dimensions), Some(batch_size), Some(seed)) => Ok(PopulateConfig {
                db,
                tables: gen.tables,
                dimensions,
                num_rows,
                batch_size,
                seed,
                recreate_tables: gen.recreate_tables,
                precision,
                index_configs: gen.index_configs,
                settings: gen.settings,
            }),
            _ => Err(ConfigError::Invalid(issues)),
        }
    }
}
