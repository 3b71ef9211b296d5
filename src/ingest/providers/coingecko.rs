// src/ingest/providers/coingecko.rs
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use metrics::counter;

use crate::ingest::types::{CoinMarket, RawBatch, RawItem, SourceClient, SourceSpec};

pub const DEFAULT_COINGECKO_BASE: &str = "https://api.coingecko.com";

/// Top coins by 24h volume within a CoinGecko category.
pub struct CoinGeckoClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    per_category: u32,
}

impl CoinGeckoClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            per_category: 10,
        }
    }

    pub fn with_per_category(mut self, n: u32) -> Self {
        self.per_category = n.clamp(1, 250);
        self
    }
}

/// Map short category names to CoinGecko category ids; unknown names pass through.
pub fn category_id(category: &str) -> String {
    match category.trim().to_ascii_lowercase().as_str() {
        "defi" => "decentralized-finance-defi".to_string(),
        "nft" => "non-fungible-tokens-nft".to_string(),
        "layer-2" | "l2" => "layer-2".to_string(),
        other => other.to_string(),
    }
}

pub fn parse_markets(body: &str, category: &str) -> Result<Vec<RawItem>> {
    let coins: Vec<CoinMarket> =
        serde_json::from_str(body).context("parsing coingecko markets json")?;
    Ok(coins
        .into_iter()
        .map(|coin| RawItem::Coin {
            category: category.to_string(),
            coin,
        })
        .collect())
}

#[async_trait]
impl SourceClient for CoinGeckoClient {
    async fn fetch(&self, spec: &SourceSpec) -> Result<RawBatch> {
        let SourceSpec::Trending { category } = spec else {
            bail!("coingecko client cannot serve {}", spec.label());
        };

        let per_page = self.per_category.to_string();
        let category_id = category_id(category);
        let mut req = self
            .http
            .get(format!("{}/api/v3/coins/markets", self.base_url))
            .query(&[
                ("vs_currency", "usd"),
                ("category", category_id.as_str()),
                ("order", "volume_desc"),
                ("per_page", per_page.as_str()),
                ("page", "1"),
            ]);
        if let Some(key) = &self.api_key {
            req = req.header("x-cg-demo-api-key", key);
        }

        let body = req
            .send()
            .await
            .context("coingecko http get()")?
            .error_for_status()
            .context("coingecko non-2xx")?
            .text()
            .await
            .context("coingecko http .text()")?;

        let mut items = parse_markets(&body, category)?;
        items.truncate(self.per_category as usize);
        counter!("ingest_raw_items_total").increment(items.len() as u64);
        Ok(RawBatch::Items(items))
    }

    fn name(&self) -> &'static str {
        "coingecko"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_categories_map_to_ids() {
        assert_eq!(category_id("DeFi"), "decentralized-finance-defi");
        assert_eq!(category_id("metaverse"), "metaverse");
    }

    #[test]
    fn non_array_body_is_an_error() {
        assert!(parse_markets(r#"{"error":"rate limited"}"#, "nft").is_err());
    }
}
