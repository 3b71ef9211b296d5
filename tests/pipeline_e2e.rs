// tests/pipeline_e2e.rs
use std::fs;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use crypto_research::config::{CollectConfig, SynthesisConfig};
use crypto_research::ingest::types::{
    RawBatch, RawItem, RawPoint, RawSeries, ScrapedArticle, SourceClient, SourceKind, SourceSpec,
};
use crypto_research::synthesize::client::{GenerationError, MockClient};
use crypto_research::{
    Collector, DocumentKind, ExportFormat, Exporter, Period, Pipeline, PipelineError, Report,
    ResearchConfig, Synthesizer,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Sites {
    delay: Duration,
}

#[async_trait]
impl SourceClient for Sites {
    async fn fetch(&self, spec: &SourceSpec) -> Result<RawBatch> {
        tokio::time::sleep(self.delay).await;
        match spec {
            SourceSpec::NewsSite { url } if url.contains("down") => bail!("dns failure"),
            _ => Ok(RawBatch::Items(vec![RawItem::Article(ScrapedArticle {
                title: Some("Solana fees fall".into()),
                summary: Some("Priority fees dropped 40%.".into()),
                link: Some("https://a.test/sol".into()),
            })])),
        }
    }
    fn name(&self) -> &'static str {
        "sites"
    }
}

struct Markets;

#[async_trait]
impl SourceClient for Markets {
    async fn fetch(&self, spec: &SourceSpec) -> Result<RawBatch> {
        let SourceSpec::Market { symbol, period } = spec else {
            bail!("not a market");
        };
        Ok(RawBatch::Series(RawSeries {
            symbol: symbol.clone(),
            period: *period,
            points: vec![RawPoint {
                timestamp: 1_714_521_600,
                close: Some(150.0),
                volume: Some(2.0e9),
            }],
        }))
    }
    fn name(&self) -> &'static str {
        "markets"
    }
}

fn sources() -> Vec<SourceSpec> {
    vec![
        SourceSpec::NewsSite {
            url: "https://a.test/".into(),
        },
        SourceSpec::NewsSite {
            url: "https://down.test/".into(),
        },
        SourceSpec::Market {
            symbol: "SOL".into(),
            period: Period::Week,
        },
    ]
}

fn collector(delay: Duration) -> Collector {
    Collector::new(&CollectConfig::default())
        .with_client(SourceKind::NewsSite, Arc::new(Sites { delay }))
        .with_client(SourceKind::Market, Arc::new(Markets))
}

#[tokio::test]
async fn run_writes_a_json_report_with_source_failures() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockClient::scripted(vec![
        Ok("digest".into()),
        Ok("# Crypto Report\n\n## Executive Summary\nQuiet week.".into()),
    ]));
    let pipeline = Pipeline::new(
        sources(),
        collector(Duration::ZERO),
        Synthesizer::new(mock.clone(), SynthesisConfig::default(), "m"),
        Exporter::new(dir.path()),
        ExportFormat::Json,
    );

    let outcome = pipeline.run().await.unwrap();
    assert!(outcome.is_complete());
    assert_eq!(outcome.records, 1);
    assert_eq!(outcome.snapshots, 1);
    assert_eq!(outcome.failures, 1);

    let report: Report = serde_json::from_str(&fs::read_to_string(&outcome.artifact).unwrap()).unwrap();
    assert!(!report.is_degraded());
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].source, "https://down.test/");

    // Single-point series: zero change, and it reaches the report prompt.
    let report_prompt = &mock.requests()[1].user;
    assert!(report_prompt.contains("SOL (7d): first close 150.00, last close 150.00, change +0.00%"));
}

#[tokio::test]
async fn generation_failure_exports_a_degraded_document() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockClient::scripted(vec![Err(GenerationError::Transport(
        "connection reset".into(),
    ))]));
    let pipeline = Pipeline::new(
        sources(),
        collector(Duration::ZERO),
        Synthesizer::new(mock, SynthesisConfig::default(), "m"),
        Exporter::new(dir.path()).with_renderer(DocumentKind::Html.renderer()),
        ExportFormat::Document,
    );

    let outcome = pipeline.run().await.unwrap();
    let msg = outcome.degraded.as_deref().unwrap();
    assert!(msg.contains("connection reset"));
    let html = fs::read_to_string(&outcome.artifact).unwrap();
    assert!(html.contains("<h1>Report generation failed</h1>"));
    assert!(html.contains("https://down.test/: dns failure"));
}

#[tokio::test]
async fn overall_timeout_fails_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(
        sources(),
        collector(Duration::from_secs(5)),
        Synthesizer::new(Arc::new(MockClient::always("x")), SynthesisConfig::default(), "m"),
        Exporter::new(dir.path()),
        ExportFormat::Json,
    )
    .with_run_timeout(Duration::from_millis(50));

    let err = pipeline.run().await.unwrap_err();
    assert!(matches!(err, PipelineError::Timeout(_)));
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

/// Full wiring from config against local HTTP mocks.
#[serial_test::serial]
#[tokio::test]
async fn configured_pipeline_runs_against_http_mocks() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(include_str!("fixtures/news_site.html")),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/everything"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(include_str!("fixtures/newsapi_everything.json")),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v8/finance/chart/BTC-USD"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(include_str!("fixtures/yahoo_chart.json")),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v3/coins/markets"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(include_str!("fixtures/coingecko_markets.json")),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut cfg = ResearchConfig {
        news_sites: vec![format!("{}/", server.uri())],
        news_keywords: vec!["defi".into()],
        symbols: vec!["BTC".into()],
        trend_categories: vec!["defi".into()],
        ..Default::default()
    };
    cfg.endpoints.news_api = server.uri();
    cfg.endpoints.yahoo = server.uri();
    cfg.endpoints.coingecko = server.uri();
    cfg.export.output_dir = dir.path().to_path_buf();

    std::env::set_var("NEWS_API_KEY", "test-key");
    let mock = Arc::new(MockClient::always("# Report"));
    let pipeline = Pipeline::from_config_with_generation(&cfg, mock.clone()).unwrap();
    let outcome = pipeline.run().await;
    std::env::remove_var("NEWS_API_KEY");
    let outcome = outcome.unwrap();

    assert!(outcome.is_complete());
    assert_eq!(outcome.failures, 0);
    // 2 scraped + 2 NewsAPI + 2 CoinGecko
    assert_eq!(outcome.records, 6);
    assert_eq!(outcome.snapshots, 1);

    // Collection order: sites, keywords, trending; K = 10 keeps all six.
    let digest = &mock.requests()[0].user;
    let site = digest.find("Bitcoin ETF inflows").unwrap();
    let news = digest.find("DeFi lending volumes climb").unwrap();
    let coin = digest.find("Uniswap (UNI)").unwrap();
    assert!(site < news && news < coin);
}
