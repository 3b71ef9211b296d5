// src/ingest/providers/mod.rs
pub mod coingecko;
pub mod news_api;
pub mod news_site;
pub mod yahoo_chart;

use anyhow::{Context, Result};
use std::time::Duration;

pub use coingecko::CoinGeckoClient;
pub use news_api::NewsApiClient;
pub use news_site::NewsSiteClient;
pub use yahoo_chart::YahooChartClient;

/// Browser-like agent; several news sites refuse the default reqwest agent.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Shared HTTP client construction for all source clients.
pub fn http_client(user_agent: &str, timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .connect_timeout(Duration::from_secs(4).min(timeout))
        .timeout(timeout)
        .build()
        .context("building http client")
}
