// src/ingest/types.rs
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Normalized news item. `title` and `source` are never empty.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Record {
    pub title: String,
    pub body: String,
    pub url: String,
    pub published_at: Option<DateTime<Utc>>,
    pub source: String,
}

pub const NO_SUMMARY: &str = "No summary";
pub const NO_URL: &str = "#";

impl Record {
    /// Builds a record, applying sentinels for the optional fields.
    /// Returns `None` when `title` or `source` is blank.
    pub fn try_new(
        title: impl Into<String>,
        body: Option<String>,
        url: Option<String>,
        published_at: Option<DateTime<Utc>>,
        source: impl Into<String>,
    ) -> Option<Self> {
        let title = title.into();
        let source = source.into();
        if title.trim().is_empty() || source.trim().is_empty() {
            return None;
        }
        Some(Self {
            title,
            body: body
                .filter(|b| !b.trim().is_empty())
                .unwrap_or_else(|| NO_SUMMARY.to_string()),
            url: url
                .filter(|u| !u.trim().is_empty())
                .unwrap_or_else(|| NO_URL.to_string()),
            published_at,
            source,
        })
    }
}

/// Lookback window for market data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Period {
    #[serde(rename = "1d")]
    Day,
    #[default]
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "30d")]
    Month,
    #[serde(rename = "90d")]
    Quarter,
    #[serde(rename = "365d")]
    Year,
}

impl Period {
    pub fn days(self) -> i64 {
        match self {
            Period::Day => 1,
            Period::Week => 7,
            Period::Month => 30,
            Period::Quarter => 90,
            Period::Year => 365,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Period::Day => "1d",
            Period::Week => "7d",
            Period::Month => "30d",
            Period::Quarter => "90d",
            Period::Year => "365d",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1d" => Ok(Period::Day),
            "7d" | "1w" => Ok(Period::Week),
            "30d" | "1mo" => Ok(Period::Month),
            "90d" | "3mo" => Ok(Period::Quarter),
            "365d" | "1y" => Ok(Period::Year),
            other => anyhow::bail!("unsupported period: {other}"),
        }
    }
}

/// Normalized market data for one symbol over one period.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarketSnapshot {
    pub symbol: String,
    pub period: Period,
    /// Ascending by timestamp.
    pub close_series: Vec<(DateTime<Utc>, f64)>,
    /// Ascending by timestamp.
    pub volume_series: Vec<(DateTime<Utc>, f64)>,
    pub percent_change: f64,
}

impl MarketSnapshot {
    pub fn first_close(&self) -> Option<f64> {
        self.close_series.first().map(|(_, p)| *p)
    }

    pub fn last_close(&self) -> Option<f64> {
        self.close_series.last().map(|(_, p)| *p)
    }

    pub fn last_volume(&self) -> Option<f64> {
        self.volume_series.last().map(|(_, v)| *v)
    }
}

/// A whole source that could not be collected.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceFailure {
    pub source: String,
    pub reason: String,
}

impl SourceFailure {
    pub fn new(source: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            reason: reason.into(),
        }
    }
}

/// Routing key from a `SourceSpec` to the client that serves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    NewsSite,
    NewsKeyword,
    Market,
    Trending,
}

/// One configured source to collect from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceSpec {
    NewsSite { url: String },
    NewsKeyword { keyword: String },
    Market { symbol: String, period: Period },
    Trending { category: String },
}

impl SourceSpec {
    pub fn kind(&self) -> SourceKind {
        match self {
            SourceSpec::NewsSite { .. } => SourceKind::NewsSite,
            SourceSpec::NewsKeyword { .. } => SourceKind::NewsKeyword,
            SourceSpec::Market { .. } => SourceKind::Market,
            SourceSpec::Trending { .. } => SourceKind::Trending,
        }
    }

    /// Stable identifier used in logs and `SourceFailure::source`.
    pub fn label(&self) -> String {
        match self {
            SourceSpec::NewsSite { url } => url.clone(),
            SourceSpec::NewsKeyword { keyword } => format!("newsapi:{keyword}"),
            SourceSpec::Market { symbol, period } => format!("market:{symbol}/{period}"),
            SourceSpec::Trending { category } => format!("trending:{category}"),
        }
    }

    /// Source name stamped on records that carry no source of their own.
    pub fn record_source(&self) -> String {
        match self {
            SourceSpec::NewsSite { url } => reqwest::Url::parse(url)
                .ok()
                .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
                .unwrap_or_else(|| url.clone()),
            SourceSpec::NewsKeyword { .. } => "NewsAPI".to_string(),
            SourceSpec::Market { symbol, .. } => symbol.clone(),
            SourceSpec::Trending { .. } => "CoinGecko".to_string(),
        }
    }
}

// ---- Raw, source-specific shapes ----

/// One `<article>` element scraped from a news site.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScrapedArticle {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub link: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct NewsApiSource {
    pub id: Option<String>,
    pub name: Option<String>,
}

/// Article shape of the NewsAPI `/v2/everything` endpoint.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NewsApiArticle {
    #[serde(default)]
    pub source: Option<NewsApiSource>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub published_at: Option<String>,
}

/// Row of the CoinGecko `/coins/markets` endpoint.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct CoinMarket {
    pub id: Option<String>,
    pub symbol: Option<String>,
    pub name: Option<String>,
    pub current_price: Option<f64>,
    pub market_cap_rank: Option<u32>,
    pub price_change_percentage_24h: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RawItem {
    Article(ScrapedArticle),
    NewsApi(NewsApiArticle),
    Coin { category: String, coin: CoinMarket },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawPoint {
    /// Unix seconds.
    pub timestamp: i64,
    pub close: Option<f64>,
    pub volume: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawSeries {
    pub symbol: String,
    pub period: Period,
    pub points: Vec<RawPoint>,
}

/// What a source client hands back before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum RawBatch {
    Items(Vec<RawItem>),
    Series(RawSeries),
}

#[async_trait::async_trait]
pub trait SourceClient: Send + Sync {
    async fn fetch(&self, spec: &SourceSpec) -> Result<RawBatch>;
    fn name(&self) -> &'static str;
}
