// src/ingest/providers/news_api.rs
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use metrics::counter;
use serde::Deserialize;

use crate::ingest::types::{NewsApiArticle, RawBatch, RawItem, SourceClient, SourceSpec};

pub const DEFAULT_NEWS_API_BASE: &str = "https://newsapi.org";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EverythingResponse {
    status: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    articles: Vec<NewsApiArticle>,
}

/// Keyword search against NewsAPI `/v2/everything`.
pub struct NewsApiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    lookback_days: i64,
    page_size: u32,
}

impl NewsApiClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            lookback_days: 7,
            page_size: 10,
        }
    }

    pub fn with_window(mut self, lookback_days: i64, page_size: u32) -> Self {
        self.lookback_days = lookback_days.max(1);
        self.page_size = page_size.clamp(1, 100);
        self
    }
}

/// Parse an `/v2/everything` body; an `"error"` status fails the source.
pub fn parse_everything(body: &str) -> Result<Vec<RawItem>> {
    let resp: EverythingResponse = serde_json::from_str(body).context("parsing newsapi json")?;
    if resp.status != "ok" {
        bail!(
            "newsapi error {}: {}",
            resp.code.as_deref().unwrap_or("unknown"),
            resp.message.as_deref().unwrap_or("no message")
        );
    }
    Ok(resp.articles.into_iter().map(RawItem::NewsApi).collect())
}

#[async_trait]
impl SourceClient for NewsApiClient {
    async fn fetch(&self, spec: &SourceSpec) -> Result<RawBatch> {
        let SourceSpec::NewsKeyword { keyword } = spec else {
            bail!("newsapi client cannot serve {}", spec.label());
        };
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow!("missing NEWS_API_KEY"))?;

        let today = Utc::now().date_naive();
        let from = today - ChronoDuration::days(self.lookback_days);
        let from = from.format("%Y-%m-%d").to_string();
        let to = today.format("%Y-%m-%d").to_string();
        let page_size = self.page_size.to_string();

        let resp = self
            .http
            .get(format!("{}/v2/everything", self.base_url))
            .header("X-Api-Key", key)
            .query(&[
                ("q", keyword.as_str()),
                ("from", from.as_str()),
                ("to", to.as_str()),
                ("language", "en"),
                ("sortBy", "relevancy"),
                ("pageSize", page_size.as_str()),
            ])
            .send()
            .await
            .context("newsapi http get()")?;

        // NewsAPI reports errors as JSON bodies with non-2xx status; keep the message.
        let status = resp.status();
        let body = resp.text().await.context("newsapi http .text()")?;
        if !status.is_success() {
            return match parse_everything(&body) {
                Err(e) => Err(e.context(format!("newsapi status {status}"))),
                Ok(_) => Err(anyhow!("newsapi status {status}")),
            };
        }

        let items = parse_everything(&body)?;
        counter!("ingest_raw_items_total").increment(items.len() as u64);
        Ok(RawBatch::Items(items))
    }

    fn name(&self) -> &'static str {
        "newsapi"
    }
}
