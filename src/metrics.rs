// src/metrics.rs
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use metrics::gauge;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Prometheus recorder for a batch run. The exposition text is written to a
/// file once the run ends (node-exporter textfile collector layout).
pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Installs the global recorder. Fails if one is already installed.
    pub fn install() -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("installing prometheus recorder")?;
        Ok(Self { handle })
    }

    pub fn render(&self) -> String {
        self.handle.render()
    }

    /// Stamps the run result and writes exposition text to `path`
    /// (temp file + rename, so scrapers never read a partial file).
    pub fn write_textfile(&self, path: &Path, success: bool) -> Result<()> {
        gauge!("research_last_run_success").set(if success { 1.0 } else { 0.0 });
        gauge!("research_last_run_timestamp_seconds").set(chrono::Utc::now().timestamp() as f64);

        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        }
        let tmp = path.with_extension("prom.tmp");
        fs::write(&tmp, self.render()).with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, path).with_context(|| format!("renaming into {}", path.display()))?;
        tracing::debug!(path = %path.display(), "metrics textfile written");
        Ok(())
    }
}
