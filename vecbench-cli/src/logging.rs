use anyhow::Context;
use std::fs::File;
use std::path::Path;
use std::sync::Mutex;
use time::macros::format_description;
use time::OffsetDateTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_FILTER: &str = "vecbench=info";

/// Log to stderr and, when given, to `log_file`. `RUST_LOG` overrides the default filter.
pub fn init(log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let file_layer = match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Unable to create log file {}", path.display()))?;
            Some(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init()
        .context("Unable to install the tracing subscriber")?;

    Ok(())
}

/// Session timestamp, `YYYY-mm-dd_HH-MM-SS` in local time when the offset is known.
pub fn timestamp() -> anyhow::Result<String> {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    let format = format_description!("[year]-[month]-[day]_[hour]-[minute]-[second]");
    now.format(&format).context("Unable to format timestamp")
}
