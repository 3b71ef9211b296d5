// src/ingest/providers/yahoo_chart.rs
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;

use crate::ingest::types::{Period, RawBatch, RawPoint, RawSeries, SourceClient, SourceSpec};

pub const DEFAULT_YAHOO_BASE: &str = "https://query1.finance.yahoo.com";

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartData,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Option<Vec<i64>>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

/// Daily closes and volumes from the Yahoo v8 chart API.
pub struct YahooChartClient {
    http: reqwest::Client,
    base_url: String,
    quote_currency: String,
}

impl YahooChartClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            quote_currency: "USD".to_string(),
        }
    }

    fn ticker(&self, symbol: &str) -> String {
        format!("{}-{}", symbol.trim().to_ascii_uppercase(), self.quote_currency)
    }
}

/// Parse a chart body into a raw series. A response without data yields an
/// empty series; an explicit API error fails the source.
pub fn parse_chart(body: &str, symbol: &str, period: Period) -> Result<RawSeries> {
    let resp: ChartResponse = serde_json::from_str(body).context("parsing yahoo chart json")?;
    if let Some(err) = resp.chart.error.filter(|e| !e.is_null()) {
        bail!("yahoo chart error: {err}");
    }

    let mut points = Vec::new();
    if let Some(result) = resp.chart.result.and_then(|r| r.into_iter().next()) {
        let timestamps = result.timestamp.unwrap_or_default();
        let quote = result.indicators.quote.into_iter().next();
        let (closes, volumes) = quote
            .map(|q| (q.close, q.volume))
            .unwrap_or_default();
        for (i, ts) in timestamps.into_iter().enumerate() {
            points.push(RawPoint {
                timestamp: ts,
                close: closes.get(i).copied().flatten(),
                volume: volumes.get(i).copied().flatten(),
            });
        }
    }

    Ok(RawSeries {
        symbol: symbol.to_string(),
        period,
        points,
    })
}

#[async_trait]
impl SourceClient for YahooChartClient {
    async fn fetch(&self, spec: &SourceSpec) -> Result<RawBatch> {
        let SourceSpec::Market { symbol, period } = spec else {
            bail!("yahoo client cannot serve {}", spec.label());
        };

        let now = Utc::now().timestamp();
        let start = now - period.days() * 86_400;
        let (period1, period2) = (start.to_string(), now.to_string());

        let resp = self
            .http
            .get(format!("{}/v8/finance/chart/{}", self.base_url, self.ticker(symbol)))
            .query(&[
                ("period1", period1.as_str()),
                ("period2", period2.as_str()),
                ("interval", "1d"),
            ])
            .send()
            .await
            .context("yahoo http get()")?;

        let status = resp.status();
        let body = resp.text().await.context("yahoo http .text()")?;
        if !status.is_success() {
            // Yahoo puts the reason into the same chart envelope.
            return match parse_chart(&body, symbol, *period) {
                Err(e) => Err(e.context(format!("yahoo status {status}"))),
                Ok(_) => bail!("yahoo status {status}"),
            };
        }

        Ok(RawBatch::Series(parse_chart(&body, symbol, *period)?))
    }

    fn name(&self) -> &'static str {
        "yahoo"
    }
}
