// src/ingest/normalize.rs
//! Pure mapping from raw source shapes to `Record` / `MarketSnapshot`.
//! Nothing here does I/O; a missing required field yields `None` and the
//! caller counts it as a soft skip.

use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use regex::Regex;

use crate::ingest::types::{
    CoinMarket, MarketSnapshot, NewsApiArticle, RawItem, RawSeries, Record, ScrapedArticle,
};

const MAX_TEXT_CHARS: usize = 1500;
const NEWSAPI_REMOVED: &str = "[Removed]";

/// Normalize text: decode entities, strip tags, fold quotes, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
    out = re_tags.replace_all(&out, "").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").expect("ws regex"));
    out = re_ws.replace_all(&out, " ").trim().to_string();

    // 5) Length cap
    if out.chars().count() > MAX_TEXT_CHARS {
        out = out.chars().take(MAX_TEXT_CHARS).collect();
    }

    out
}

fn clean(field: Option<&str>) -> Option<String> {
    field.map(normalize_text).filter(|s| !s.is_empty())
}

fn parse_timestamp(ts: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(ts.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Map one raw item to a `Record`. `fallback_source` is used when the item
/// carries no source name of its own.
pub fn normalize(raw: &RawItem, fallback_source: &str) -> Option<Record> {
    match raw {
        RawItem::Article(a) => normalize_article(a, fallback_source),
        RawItem::NewsApi(a) => normalize_newsapi(a, fallback_source),
        RawItem::Coin { category, coin } => normalize_coin(category, coin),
    }
}

fn normalize_article(a: &ScrapedArticle, source: &str) -> Option<Record> {
    let title = clean(a.title.as_deref())?;
    Record::try_new(
        title,
        clean(a.summary.as_deref()),
        a.link.as_ref().map(|l| l.trim().to_string()),
        None,
        source,
    )
}

fn normalize_newsapi(a: &NewsApiArticle, fallback_source: &str) -> Option<Record> {
    let title = clean(a.title.as_deref()).filter(|t| t != NEWSAPI_REMOVED)?;
    let source = a
        .source
        .as_ref()
        .and_then(|s| clean(s.name.as_deref()))
        .unwrap_or_else(|| fallback_source.to_string());
    Record::try_new(
        title,
        clean(a.description.as_deref()),
        a.url.as_ref().map(|u| u.trim().to_string()),
        a.published_at.as_deref().and_then(parse_timestamp),
        source,
    )
}

fn normalize_coin(category: &str, coin: &CoinMarket) -> Option<Record> {
    let name = clean(coin.name.as_deref())?;
    let title = match coin.symbol.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(sym) => format!("{name} ({})", sym.to_ascii_uppercase()),
        None => name,
    };

    let mut parts = vec![format!("Trending in {category}")];
    if let Some(p) = coin.current_price {
        parts.push(format!("price ${p:.2}"));
    }
    if let Some(c) = coin.price_change_percentage_24h {
        parts.push(format!("24h change {c:+.2}%"));
    }
    if let Some(r) = coin.market_cap_rank {
        parts.push(format!("market cap rank #{r}"));
    }

    let url = coin
        .id
        .as_deref()
        .filter(|id| !id.trim().is_empty())
        .map(|id| format!("https://www.coingecko.com/en/coins/{}", id.trim()));

    Record::try_new(title, Some(parts.join(", ")), url, None, "CoinGecko")
}

/// Normalize a whole batch, preserving arrival order.
/// Returns the kept records and the number of soft-skipped items.
pub fn normalize_batch(items: &[RawItem], fallback_source: &str) -> (Vec<Record>, usize) {
    let mut skipped = 0usize;
    let mut out = Vec::with_capacity(items.len());
    for it in items {
        match normalize(it, fallback_source) {
            Some(r) => out.push(r),
            None => skipped += 1,
        }
    }
    (out, skipped)
}

/// Percent change from first to last close; 0 when undefined.
pub fn percent_change(first: f64, last: f64, points: usize) -> f64 {
    if points < 2 || first == 0.0 || !first.is_finite() || !last.is_finite() {
        return 0.0;
    }
    (last - first) / first * 100.0
}

/// Build a snapshot from a raw series. Points are sorted ascending, missing
/// closes are dropped, and an empty close series drops the snapshot.
pub fn snapshot_from_series(raw: RawSeries) -> Option<MarketSnapshot> {
    let mut points = raw.points;
    points.sort_by_key(|p| p.timestamp);

    let mut close_series = Vec::with_capacity(points.len());
    let mut volume_series = Vec::with_capacity(points.len());
    for p in &points {
        let Some(ts) = DateTime::<Utc>::from_timestamp(p.timestamp, 0) else {
            continue;
        };
        if let Some(c) = p.close.filter(|c| c.is_finite()) {
            close_series.push((ts, c));
        }
        if let Some(v) = p.volume.filter(|v| v.is_finite()) {
            volume_series.push((ts, v));
        }
    }

    let (first, last) = match (close_series.first(), close_series.last()) {
        (Some((_, f)), Some((_, l))) => (*f, *l),
        _ => return None,
    };

    Some(MarketSnapshot {
        percent_change: percent_change(first, last, close_series.len()),
        symbol: raw.symbol,
        period: raw.period,
        close_series,
        volume_series,
    })
}
