// src/synthesize/prompt.rs
//! Prompt assembly and output parsing. Everything here is pure so the
//! payload limits can be tested without a generation endpoint.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

use crate::ingest::types::{MarketSnapshot, Record};
use crate::report::{Section, TrendingTopic};
use crate::synthesize::client::GenerationError;
use crate::synthesize::{OutputMode, ReportSection};

pub const DIGEST_SYSTEM: &str = "You are an AI assistant specialized in summarizing cryptocurrency-related news. \
Your summary will be used by a main researcher to write a comprehensive final research report. \
Focus on providing clear, concise, and relevant information that can be easily integrated into a larger analysis.";

pub const REPORT_SYSTEM: &str = "You are an AI assistant specialized in cryptocurrency research and analysis. \
Your task is to synthesize information from various sources and generate a comprehensive, well-structured crypto research report. \
Use the provided data to create insightful analysis and actionable insights for crypto investors and enthusiasts.";

pub const TOPICS_SYSTEM: &str =
    "You are a crypto market analyst specializing in identifying trends from news articles.";

pub const TRUNCATION_MARKER: &str = "\n[truncated]";

/// The first `k` records, in collection order.
///
/// This is a positional cut, not a relevance ranking: records past `k` are
/// dropped no matter what they contain.
pub fn select_records(records: &[Record], k: usize) -> &[Record] {
    &records[..records.len().min(k)]
}

#[derive(Serialize)]
struct PromptRecord<'a> {
    title: &'a str,
    summary: String,
    source: &'a str,
    url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    published_at: Option<String>,
}

/// Pretty JSON array of records, each body cut to `max_body_chars`.
pub fn records_payload(records: &[Record], max_body_chars: usize) -> String {
    let rows: Vec<PromptRecord<'_>> = records
        .iter()
        .map(|r| PromptRecord {
            title: &r.title,
            summary: cut(&r.body, max_body_chars),
            source: &r.source,
            url: &r.url,
            published_at: r.published_at.map(|t| t.to_rfc3339()),
        })
        .collect();
    serde_json::to_string_pretty(&rows).unwrap_or_else(|_| "[]".to_string())
}

/// One line per symbol; full series never reach the prompt.
pub fn market_payload(snapshots: &[MarketSnapshot]) -> String {
    if snapshots.is_empty() {
        return "No market data available.".to_string();
    }
    let mut out = String::new();
    for s in snapshots {
        let _ = write!(out, "{} ({}): ", s.symbol, s.period);
        if let (Some(first), Some(last)) = (s.first_close(), s.last_close()) {
            let _ = write!(out, "first close {first:.2}, last close {last:.2}, ");
        }
        let _ = write!(out, "change {:+.2}%", s.percent_change);
        if let Some(v) = s.last_volume() {
            let _ = write!(out, ", last volume {v:.0}");
        }
        out.push('\n');
    }
    out
}

fn cut(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Hard cap on character count; the marker counts toward `max`.
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let keep = max.saturating_sub(TRUNCATION_MARKER.chars().count());
    let mut out = cut(s, keep);
    out.push_str(TRUNCATION_MARKER);
    out
}

pub fn digest_prompt(records_json: &str) -> String {
    format!(
        "Summarize the following cryptocurrency news data:\n\n\
{records_json}\n\n\
Provide a comprehensive summary that includes:\n\
1. Top headlines (list the 5 most important)\n\
2. Key topics and their frequency\n\
3. Main sources\n\
4. Emerging trends or patterns\n\
5. Notable price movements or market events\n\
6. Regulatory updates or government actions\n\
7. Significant partnerships or collaborations\n\
8. Technological advancements or innovations\n\
9. Expert opinions or predictions\n\n\
Ensure the summary is concise yet informative, highlighting the most crucial information \
for cryptocurrency market analysis. Include relevant statistics or data points where applicable."
    )
}

/// What the report stage is grounded on.
#[derive(Debug, Clone, Copy)]
pub enum ReportInput<'a> {
    Digest(&'a str),
    Records(&'a str),
}

pub fn report_prompt(
    input: ReportInput<'_>,
    market: &str,
    sections: &[ReportSection],
    mode: OutputMode,
) -> String {
    let mut out = String::from("Generate a comprehensive crypto research report based on the following data:\n\n");
    match input {
        ReportInput::Digest(d) => {
            let _ = write!(out, "News Summary:\n{d}\n\n");
        }
        ReportInput::Records(r) => {
            let _ = write!(out, "Recent News Articles:\n{r}\n\n");
        }
    }
    let _ = write!(out, "Market Data:\n{market}\n");
    out.push_str("The report should include:\n");
    for (i, s) in sections.iter().enumerate() {
        let _ = writeln!(out, "{}. {}", i + 1, s.title());
    }
    out.push('\n');
    match mode {
        OutputMode::Markdown => out.push_str(
            "Format the report in markdown with clear headings and subheadings. \
Ensure the information is concise, relevant, and provides valuable insights for crypto investors and enthusiasts.",
        ),
        OutputMode::Structured => out.push_str(
            "Respond with a single JSON object of the form \
{\"sections\": [{\"heading\": \"...\", \"body\": \"...\"}]}, \
one entry per section above, in that order. Bodies are plain text.",
        ),
    }
    out
}

pub fn topics_prompt(records: &[Record], max_topics: usize, max_body_chars: usize) -> String {
    let articles = records
        .iter()
        .map(|r| format!("Title: {}\nSummary: {}", r.title, cut(&r.body, max_body_chars)))
        .collect::<Vec<_>>()
        .join("\n\n");
    format!(
        "Analyze the following crypto news articles and extract the top {max_topics} trending topics or themes.\n\
For each topic, provide a brief explanation of its significance in the current crypto landscape.\n\n\
Articles:\n{articles}\n\n\
Format your response as a JSON object with the following structure:\n\
{{\"trending_topics\": [{{\"topic\": \"Name of the topic\", \"explanation\": \"Brief explanation of the topic's significance\"}}]}}"
    )
}

/// Drops a surrounding ```/```json fence if the model added one.
pub fn strip_code_fence(s: &str) -> &str {
    let t = s.trim();
    let Some(rest) = t.strip_prefix("```") else {
        return t;
    };
    let rest = match rest.find('\n') {
        Some(i) => &rest[i + 1..],
        None => rest,
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

#[derive(Deserialize)]
struct StructuredReport {
    sections: Vec<Section>,
}

#[derive(Deserialize)]
struct TopicsEnvelope {
    trending_topics: Vec<TrendingTopic>,
}

fn schema_error(message: impl Into<String>, raw: &str) -> GenerationError {
    GenerationError::Schema {
        message: message.into(),
        raw: raw.to_string(),
    }
}

/// `{"sections": [{"heading", "body"}]}` with at least one non-empty section.
pub fn parse_structured_report(raw: &str) -> Result<Vec<Section>, GenerationError> {
    let parsed: StructuredReport =
        serde_json::from_str(strip_code_fence(raw)).map_err(|e| schema_error(e.to_string(), raw))?;
    let sections: Vec<Section> = parsed
        .sections
        .into_iter()
        .filter(|s| !s.heading.trim().is_empty() && !s.body.trim().is_empty())
        .collect();
    if sections.is_empty() {
        return Err(schema_error("no non-empty sections", raw));
    }
    Ok(sections)
}

/// `{"trending_topics": [...]}`, keeping at most `max`.
pub fn parse_topics(raw: &str, max: usize) -> Result<Vec<TrendingTopic>, GenerationError> {
    let parsed: TopicsEnvelope =
        serde_json::from_str(strip_code_fence(raw)).map_err(|e| schema_error(e.to_string(), raw))?;
    Ok(parsed
        .trending_topics
        .into_iter()
        .filter(|t| !t.topic.trim().is_empty())
        .take(max)
        .collect())
}
