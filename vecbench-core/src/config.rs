use crate::{
    ConfigError, ConfigIssue, DEFAULT_DB_PORT, DEFAULT_K, DEFAULT_PRECISION, DEFAULT_RESULTS_DIR,
    MAX_PRECISION,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

mod populate;

pub use populate::{IndexKind, PopulateConfig};

/// One workload shape: a fixed number of queries issued by a fixed number of concurrent clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkloadConfig {
    pub num_queries: usize,
    pub num_clients: NonZeroUsize,
    /// Warm-up runs prime caches and are never recorded.
    pub warm_up: bool,
}

impl fmt::Display for WorkloadConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} queries/{} clients", self.num_queries, self.num_clients)?;
        if self.warm_up {
            write!(f, " (warm-up)")?;
        }
        Ok(())
    }
}

/// Distance operator used to order rows in the similarity query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    #[default]
    L2,
    Cosine,
    InnerProduct,
}

impl DistanceMetric {
    pub fn operator(&self) -> &'static str {
        match self {
            DistanceMetric::L2 => "<->",
            DistanceMetric::Cosine => "<=>",
            DistanceMetric::InnerProduct => "<#>",
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: Option<String>,
    pub max_connections: Option<u32>,
}

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

/// Validated benchmark configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkConfig {
    pub db: DbConfig,
    pub tables: Vec<String>,
    pub workloads: Vec<WorkloadConfig>,
    pub dimensions: NonZeroUsize,
    pub k: usize,
    pub metric: DistanceMetric,
    pub precision: u32,
    pub results_dir: PathBuf,
}

/// Values supplied outside the configuration document, e.g. on the command line.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub host: Option<String>,
    pub password: Option<String>,
    /// Restrict the run to this subset of the configured tables.
    pub tables: Option<Vec<String>>,
    pub results_dir: Option<PathBuf>,
}

impl BenchmarkConfig {
    pub fn load(path: &Path, overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text, overrides)
    }

    pub fn from_json(text: &str, overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        let raw: RawBenchmarkConfig = serde_json::from_str(text)?;
        raw.validate(overrides)
    }

    /// Largest client count across all workloads.
    pub fn max_clients(&self) -> usize {
        self.workloads
            .iter()
            .map(|w| w.num_clients.get())
            .max()
            .unwrap_or(1)
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawDbConfig {
    host: Option<String>,
    /// Database host per embedding dimensionality, keyed by the dimension count.
    #[serde(default)]
    hosts: HashMap<String, String>,
    port: Option<u16>,
    dbname: Option<String>,
    user: Option<String>,
    password: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RawWorkload {
    num_queries: Option<i64>,
    num_clients: Option<i64>,
    #[serde(default, alias = "warmup")]
    warm_up: bool,
}

#[derive(Debug, Default, Deserialize)]
struct RawBenchmarkSection {
    #[serde(default)]
    tables: Vec<String>,
    #[serde(default)]
    query_configs: Vec<RawWorkload>,
    dimensions: Option<i64>,
    k: Option<i64>,
    #[serde(default)]
    metric: DistanceMetric,
    precision: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RawBenchmarkConfig {
    db: Option<RawDbConfig>,
    benchmark: Option<RawBenchmarkSection>,
    results_dir: Option<PathBuf>,
}

impl RawBenchmarkConfig {
    fn validate(self, overrides: &ConfigOverrides) -> Result<BenchmarkConfig, ConfigError> {
        let mut issues = vec![];

        if self.db.is_none() {
            issues.push(ConfigIssue::new("db", "section is missing"));
        }
        if self.benchmark.is_none() {
            issues.push(ConfigIssue::new("benchmark", "section is missing"));
        }
        let bench = self.benchmark.unwrap_or_default();

        let dimensions = positive(bench.dimensions, "benchmark.dimensions", &mut issues);
        let db = self
            .db
            .unwrap_or_default()
            .validate(dimensions, overrides, &mut issues);

        let mut tables = bench.tables;
        if tables.is_empty() {
            issues.push(ConfigIssue::new("benchmark.tables", "at least one table is required"));
        }
        for (idx, table) in tables.iter().enumerate() {
            if !is_identifier(table) {
                issues.push(ConfigIssue::new(
                    format!("benchmark.tables[{idx}]"),
                    format!("`{table}` is not a valid SQL identifier"),
                ));
            }
        }
        if let Some(subset) = &overrides.tables {
            for name in subset {
                if !tables.contains(name) {
                    issues.push(ConfigIssue::new(
                        "tables",
                        format!("unknown table `{name}`"),
                    ));
                }
            }
            tables.retain(|t| subset.contains(t));
        }

        if bench.query_configs.is_empty() {
            issues.push(ConfigIssue::new(
                "benchmark.query_configs",
                "at least one workload is required",
            ));
        }
        let workloads: Vec<_> = bench
            .query_configs
            .into_iter()
            .enumerate()
            .filter_map(|(idx, raw)| raw.validate(idx, &mut issues))
            .collect();

        let k = match bench.k {
            None => DEFAULT_K,
            Some(k) if k > 0 => k as usize,
            Some(k) => {
                issues.push(ConfigIssue::new(
                    "benchmark.k",
                    format!("must be positive, got {k}"),
                ));
                DEFAULT_K
            }
        };

        let precision = precision(bench.precision, "benchmark.precision", &mut issues);

        if let Some(db) = &db {
            let max_clients = workloads.iter().map(|w| w.num_clients.get()).max();
            if let (Some(max_connections), Some(max_clients)) = (db.max_connections, max_clients) {
                if max_connections > 0 && (max_connections as usize) < max_clients {
                    issues.push(ConfigIssue::new(
                        "db.max_connections",
                        format!(
                            "{max_connections} connections cannot serve a workload of {max_clients} clients"
                        ),
                    ));
                }
            }
        }

        if !issues.is_empty() {
            return Err(ConfigError::Invalid(issues));
        }

        // Every `None` above has pushed an issue.
        match (db, dimensions) {
            (Some(db), Some(dimensions)) => Ok(BenchmarkConfig {
                db,
                tables,
                workloads,
                dimensions,
                k,
                metric: bench.metric,
                precision,
                results_dir: overrides
                    .results_dir
                    .clone()
                    .or(self.results_dir)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_RESULTS_DIR)),
            }),
            _ => Err(ConfigError::Invalid(issues)),
        }
    }
}

impl RawWorkload {
    fn validate(self, idx: usize, issues: &mut Vec<ConfigIssue>) -> Option<WorkloadConfig> {
        let field = |name: &str| format!("benchmark.query_configs[{idx}].{name}");

        let num_queries = match self.num_queries {
            None => {
                issues.push(ConfigIssue::new(field("num_queries"), "is required"));
                None
            }
            Some(n) if n < 0 => {
                issues.push(ConfigIssue::new(
                    field("num_queries"),
                    format!("must not be negative, got {n}"),
                ));
                None
            }
            Some(n) => Some(n as usize),
        };
        let num_clients = positive(self.num_clients, &field("num_clients"), issues);

        Some(WorkloadConfig {
            num_queries: num_queries?,
            num_clients: num_clients?,
            warm_up: self.warm_up,
        })
    }
}

impl RawDbConfig {
    pub(crate) fn validate(
        self,
        dimensions: Option<NonZeroUsize>,
        overrides: &ConfigOverrides,
        issues: &mut Vec<ConfigIssue>,
    ) -> Option<DbConfig> {
        let by_dimensions =
            dimensions.and_then(|d| self.hosts.get(&d.to_string()).cloned());
        let host = overrides.host.clone().or(self.host).or(by_dimensions);
        if host.is_none() {
            let message = match dimensions {
                Some(d) => format!("no `db.host` and no `db.hosts` entry for {d} dimensions"),
                None => "no `db.host` given".to_string(),
            };
            issues.push(ConfigIssue::new("db.host", message));
        }

        if self.dbname.is_none() {
            issues.push(ConfigIssue::new("db.dbname", "is required"));
        }
        if self.user.is_none() {
            issues.push(ConfigIssue::new("db.user", "is required"));
        }
        if self.max_connections == Some(0) {
            issues.push(ConfigIssue::new("db.max_connections", "must be positive"));
        }

        Some(DbConfig {
            host: host?,
            port: self.port.unwrap_or(DEFAULT_DB_PORT),
            dbname: self.dbname?,
            user: self.user?,
            password: overrides.password.clone().or(self.password),
            max_connections: self.max_connections,
        })
    }
}

pub(crate) fn precision(value: Option<u32>, field: &str, issues: &mut Vec<ConfigIssue>) -> u32 {
    match value {
        Some(p) if p > MAX_PRECISION => {
            issues.push(ConfigIssue::new(
                field,
                format!("must be at most {MAX_PRECISION} decimal places, got {p}"),
            ));
            DEFAULT_PRECISION
        }
        Some(p) => p,
        None => DEFAULT_PRECISION,
    }
}

pub(crate) fn positive(
    value: Option<i64>,
    field: &str,
    issues: &mut Vec<ConfigIssue>,
) -> Option<NonZeroUsize> {
    match value {
        None => {
            issues.push(ConfigIssue::new(field, "is required"));
            None
        }
        Some(v) if v <= 0 => {
            issues.push(ConfigIssue::new(field, format!("must be positive, got {v}")));
            None
        }
        Some(v) => NonZeroUsize::new(v as usize),
    }
}

/// Table names are interpolated into SQL text, so only plain identifiers are accepted.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}
