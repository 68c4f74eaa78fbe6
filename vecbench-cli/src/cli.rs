use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use vecbench::core::ConfigOverrides;

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Concurrent similarity-query benchmark for PostgreSQL + pgvector",
    args_conflicts_with_subcommands = true
)]
pub struct VecbenchCli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub run: RunArgs,
}

impl VecbenchCli {
    /// The selected subcommand, `run` when none was given.
    pub fn subcommand(self) -> Command {
        self.command.unwrap_or(Command::Run(self.run))
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the benchmark sweep (default)
    Run(RunArgs),
    /// Create and fill the benchmark tables, then build their indexes
    Populate(PopulateArgs),
    /// Verify that the database is reachable
    Check(CheckArgs),
}

#[derive(Args, Debug, Clone)]
pub struct DbArgs {
    /// Database host, overriding the configuration file
    #[arg(long)]
    pub host: Option<String>,

    /// Database password, overriding the configuration file
    #[arg(long, env = "VECBENCH_DB_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Benchmark configuration document
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    #[command(flatten)]
    pub db: DbArgs,

    /// Only benchmark these tables (comma separated)
    #[arg(short, long, value_delimiter = ',')]
    pub tables: Option<Vec<String>>,

    /// Parent directory for the per-session results directory
    #[arg(long)]
    pub results_dir: Option<PathBuf>,

    /// Serve Prometheus metrics on this address while benchmarking
    #[arg(long)]
    pub metrics_addr: Option<SocketAddr>,

    /// Also write every successful query latency to a CSV file
    #[arg(long)]
    pub raw_latencies: bool,
}

impl RunArgs {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            host: self.db.host.clone(),
            password: self.db.password.clone(),
            tables: self.tables.clone(),
            results_dir: self.results_dir.clone(),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct PopulateArgs {
    /// Data generation configuration document
    #[arg(short, long, default_value = "generator_config.json")]
    pub config: PathBuf,

    #[command(flatten)]
    pub db: DbArgs,

    /// Directory for the population log file
    #[arg(long, default_value = "logs")]
    pub log_dir: PathBuf,
}

impl PopulateArgs {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            host: self.db.host.clone(),
            password: self.db.password.clone(),
            ..Default::default()
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct CheckArgs {
    /// Benchmark configuration document
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    #[command(flatten)]
    pub db: DbArgs,
}

impl CheckArgs {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            host: self.db.host.clone(),
            password: self.db.password.clone(),
            ..Default::default()
        }
    }
}
