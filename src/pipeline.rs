// src/pipeline.rs
//! Collect → Synthesize → Export, once, under an overall deadline.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::config::research::ResearchConfig;
use crate::export::{ExportError, ExportFormat, Exporter};
use crate::ingest::providers::{
    http_client, CoinGeckoClient, NewsApiClient, NewsSiteClient, YahooChartClient,
};
use crate::ingest::types::{SourceKind, SourceSpec};
use crate::ingest::Collector;
use crate::synthesize::client::{build_client_from_config, DynGenerationClient};
use crate::synthesize::Synthesizer;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("run exceeded {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Export(#[from] ExportError),
}

/// What one run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub artifact: PathBuf,
    /// Generation failure message when the report was degraded.
    pub degraded: Option<String>,
    pub records: usize,
    pub snapshots: usize,
    pub failures: usize,
}

impl RunOutcome {
    pub fn is_complete(&self) -> bool {
        self.degraded.is_none()
    }
}

pub struct Pipeline {
    sources: Vec<SourceSpec>,
    collector: Collector,
    synthesizer: Synthesizer,
    exporter: Exporter,
    format: ExportFormat,
    run_timeout: Duration,
}

impl Pipeline {
    pub fn new(
        sources: Vec<SourceSpec>,
        collector: Collector,
        synthesizer: Synthesizer,
        exporter: Exporter,
        format: ExportFormat,
    ) -> Self {
        Self {
            sources,
            collector,
            synthesizer,
            exporter,
            format,
            run_timeout: Duration::from_secs(600),
        }
    }

    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = timeout;
        self
    }

    /// Wires the concrete HTTP clients and the generation client from config.
    pub fn from_config(cfg: &ResearchConfig) -> Result<Self> {
        let generation = build_client_from_config(&cfg.ai)?;
        Self::from_config_with_generation(cfg, generation)
    }

    /// As `from_config`, with a caller-supplied generation client.
    pub fn from_config_with_generation(
        cfg: &ResearchConfig,
        generation: DynGenerationClient,
    ) -> Result<Self> {
        let c = &cfg.collect;
        let http = http_client(&c.user_agent, Duration::from_secs(c.source_timeout_secs.max(1)))?;
        let news_key = env_key("NEWS_API_KEY");
        let gecko_key = env_key("COINGECKO_API_KEY");
        if news_key.is_none() {
            tracing::warn!("NEWS_API_KEY not set; keyword sources will fail");
        }

        let collector = Collector::new(c)
            .with_client(SourceKind::NewsSite, Arc::new(NewsSiteClient::new(http.clone())))
            .with_client(
                SourceKind::NewsKeyword,
                Arc::new(
                    NewsApiClient::new(http.clone(), cfg.endpoints.news_api.clone(), news_key)
                        .with_window(c.news_lookback_days, c.news_page_size),
                ),
            )
            .with_client(
                SourceKind::Market,
                Arc::new(YahooChartClient::new(http.clone(), cfg.endpoints.yahoo.clone())),
            )
            .with_client(
                SourceKind::Trending,
                Arc::new(
                    CoinGeckoClient::new(http, cfg.endpoints.coingecko.clone(), gecko_key)
                        .with_per_category(cfg.num_trending),
                ),
            );

        let synthesizer = Synthesizer::new(generation, cfg.synthesis.clone(), cfg.ai.model.clone());
        let exporter = Exporter::new(cfg.export.output_dir.clone())
            .with_renderer(cfg.export.document.renderer());

        tracing::info!(
            sources = cfg.sources().len(),
            format = %cfg.export.format,
            document = ?cfg.export.document,
            out_dir = %cfg.export.output_dir.display(),
            model = %cfg.ai.model,
            "pipeline configured"
        );

        Ok(Self::new(cfg.sources(), collector, synthesizer, exporter, cfg.export.format)
            .with_run_timeout(Duration::from_secs(cfg.run_timeout_secs.max(1))))
    }

    pub async fn run(&self) -> Result<RunOutcome, PipelineError> {
        match tokio::time::timeout(self.run_timeout, self.run_inner()).await {
            Ok(r) => r,
            Err(_) => {
                tracing::error!(timeout = ?self.run_timeout, "run timed out");
                Err(PipelineError::Timeout(self.run_timeout))
            }
        }
    }

    async fn run_inner(&self) -> Result<RunOutcome, PipelineError> {
        let collected = self.collector.collect(&self.sources).await;
        let records = collected.records.len();
        let snapshots = collected.snapshots.len();
        let failures = collected.failures.len();

        let report = self
            .synthesizer
            .synthesize(collected.records, collected.snapshots, collected.failures)
            .await;
        let degraded = report.failure().map(|f| f.message.clone());
        if let Some(msg) = &degraded {
            tracing::warn!(error = %msg, "report degraded");
        }

        let artifact = self.exporter.export(report, self.format)?;
        Ok(RunOutcome {
            artifact,
            degraded,
            records,
            snapshots,
            failures,
        })
    }
}

fn env_key(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
