use anyhow::Context;
use std::path::{Path, PathBuf};

/// Per-session output directory: `<base>/benchmark_<timestamp>/`.
#[derive(Debug, Clone)]
pub struct ResultsDir {
    pub dir: PathBuf,
    pub csv: PathBuf,
    pub log: PathBuf,
    pub latencies: PathBuf,
}

impl ResultsDir {
    pub fn new(base: &Path, timestamp: &str) -> Self {
        let dir = base.join(format!("benchmark_{timestamp}"));
        Self {
            csv: dir.join(format!("benchmark_results_{timestamp}.csv")),
            log: dir.join(format!("query_benchmark_{timestamp}.log")),
            latencies: dir.join(format!("query_latencies_{timestamp}.csv")),
            dir,
        }
    }

    pub fn create(base: &Path, timestamp: &str) -> anyhow::Result<Self> {
        let results = Self::new(base, timestamp);
        std::fs::create_dir_all(&results.dir).with_context(|| {
            format!(
                "Unable to create results directory {}",
                results.dir.display()
            )
        })?;
        Ok(results)
    }
}
