// tests/metrics.rs
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use crypto_research::config::{CollectConfig, SynthesisConfig};
use crypto_research::ingest::types::{
    RawBatch, RawItem, ScrapedArticle, SourceClient, SourceKind, SourceSpec,
};
use crypto_research::metrics::Metrics;
use crypto_research::synthesize::client::{GenerationError, MockClient};
use crypto_research::{Collector, Synthesizer};
use metrics_exporter_prometheus::PrometheusBuilder;

struct HalfBroken;

#[async_trait]
impl SourceClient for HalfBroken {
    async fn fetch(&self, spec: &SourceSpec) -> Result<RawBatch> {
        match spec {
            SourceSpec::NewsSite { url } if url.contains("bad") => bail!("boom"),
            _ => Ok(RawBatch::Items(vec![
                RawItem::Article(ScrapedArticle {
                    title: Some("kept".into()),
                    ..Default::default()
                }),
                RawItem::Article(ScrapedArticle::default()),
            ])),
        }
    }
    fn name(&self) -> &'static str {
        "half_broken"
    }
}

/// Drives collect + synthesize on a current-thread runtime so the
/// thread-local recorder sees every emission.
#[test]
fn collect_and_generation_series_are_emitted() {
    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();

    metrics::with_local_recorder(&recorder, || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let collector = Collector::new(&CollectConfig::default())
                .with_client(SourceKind::NewsSite, Arc::new(HalfBroken));
            let out = collector
                .collect(&[
                    SourceSpec::NewsSite {
                        url: "https://good.test/".into(),
                    },
                    SourceSpec::NewsSite {
                        url: "https://bad.test/".into(),
                    },
                ])
                .await;

            let mock = Arc::new(MockClient::scripted(vec![
                Ok("digest".into()),
                Err(GenerationError::EmptyResponse),
            ]));
            Synthesizer::new(mock, SynthesisConfig::default(), "m")
                .synthesize(out.records, out.snapshots, out.failures)
                .await;
        });
    });

    let text = handle.render();
    for needle in [
        "collect_records_total 1",
        "collect_items_skipped_total 1",
        "collect_source_failures_total 1",
        "collect_fetch_ms",
        "generation_calls_total{stage=\"digest\"} 1",
        "generation_calls_total{stage=\"report\"} 1",
        "generation_call_ms",
    ] {
        assert!(text.contains(needle), "exposition missing '{needle}'\n{text}");
    }
    assert!(text.contains("generation_failures_total{"), "{text}");
    assert!(text.contains("kind=\"transport\""), "{text}");
}

#[test]
fn textfile_is_written_with_run_gauges() {
    let metrics = Metrics::install().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("textfile").join("crypto_research.prom");

    metrics.write_textfile(&path, true).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("research_last_run_success 1"), "{text}");
    assert!(text.contains("research_last_run_timestamp_seconds"), "{text}");
    assert!(!path.with_extension("prom.tmp").exists());
}
