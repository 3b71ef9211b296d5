// src/ingest/providers/news_site.rs
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};

use crate::ingest::types::{RawBatch, RawItem, ScrapedArticle, SourceClient, SourceSpec};

/// Scrapes `<article>` blocks from a news site's front page.
pub struct NewsSiteClient {
    http: reqwest::Client,
}

impl NewsSiteClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

/// Text nodes are joined as-is; inline markup must not split words.
fn first_text(el: &ElementRef<'_>, sel: &Selector) -> Option<String> {
    el.select(sel)
        .next()
        .map(|e| e.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Parse a page into raw articles. Links are resolved against `base`.
pub fn parse_articles(html: &str, base: &Url) -> Vec<RawItem> {
    let doc = Html::parse_document(html);
    let (Ok(article), Ok(h2), Ok(p), Ok(a)) = (
        Selector::parse("article"),
        Selector::parse("h2"),
        Selector::parse("p"),
        Selector::parse("a[href]"),
    ) else {
        return Vec::new();
    };

    doc.select(&article)
        .map(|node| {
            let link = node
                .select(&a)
                .next()
                .and_then(|e| e.value().attr("href"))
                .and_then(|href| base.join(href.trim()).ok())
                .map(|u| u.to_string());
            RawItem::Article(ScrapedArticle {
                title: first_text(&node, &h2),
                summary: first_text(&node, &p),
                link,
            })
        })
        .collect()
}

#[async_trait]
impl SourceClient for NewsSiteClient {
    async fn fetch(&self, spec: &SourceSpec) -> Result<RawBatch> {
        let SourceSpec::NewsSite { url } = spec else {
            bail!("news site client cannot serve {}", spec.label());
        };
        let base = Url::parse(url).with_context(|| format!("invalid site url {url}"))?;

        let body = self
            .http
            .get(base.clone())
            .send()
            .await
            .context("site http get()")?
            .error_for_status()
            .context("site non-2xx")?
            .text()
            .await
            .context("site http .text()")?;

        // `Html` is not Send; parse fully before returning to the executor.
        let t0 = std::time::Instant::now();
        let items = parse_articles(&body, &base);
        histogram!("ingest_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        counter!("ingest_raw_items_total").increment(items.len() as u64);
        tracing::debug!(site = %base, articles = items.len(), "parsed site");

        Ok(RawBatch::Items(items))
    }

    fn name(&self) -> &'static str {
        "news_site"
    }
}
