//! Crypto research batch job: collect news and market data, synthesize a
//! report through a language model, export one artifact, exit.
//!
//! Configuration: `config/research.toml` (or `$RESEARCH_CONFIG_PATH`) plus env
//! overrides; credentials come from `.env` / the environment.

use std::process::ExitCode;

use crypto_research::metrics::Metrics;
use crypto_research::{Pipeline, ResearchConfig};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// `LOG_FORMAT=json` switches to JSON lines; filter via `RUST_LOG`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("crypto_research=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = match ResearchConfig::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!(error = ?e, "failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    let metrics = match &cfg.metrics_textfile {
        Some(_) => match Metrics::install() {
            Ok(m) => Some(m),
            Err(e) => {
                tracing::warn!(error = ?e, "metrics disabled");
                None
            }
        },
        None => None,
    };

    let pipeline = match Pipeline::from_config(&cfg) {
        Ok(p) => p,
        Err(e) => {
            tracing::error!(error = ?e, "failed to build pipeline");
            return ExitCode::FAILURE;
        }
    };

    let result = pipeline.run().await;
    let success = matches!(&result, Ok(o) if o.is_complete());

    if let (Some(m), Some(path)) = (&metrics, &cfg.metrics_textfile) {
        if let Err(e) = m.write_textfile(path, success) {
            tracing::warn!(error = ?e, "failed to write metrics textfile");
        }
    }

    match result {
        Ok(outcome) => {
            tracing::info!(
                artifact = %outcome.artifact.display(),
                records = outcome.records,
                snapshots = outcome.snapshots,
                failures = outcome.failures,
                degraded = outcome.degraded.is_some(),
                "run finished"
            );
            if success {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "run failed");
            ExitCode::FAILURE
        }
    }
}
