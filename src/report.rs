// src/report.rs
//! The single artifact a run produces. Serialized shape:
//! `{ "timestamp", "content" | "error", "trending_topics"?, "errors"? }`,
//! where `error` is the failure message string and a degraded report also
//! carries `error_kind` and, for schema failures, `raw_output`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

use crate::ingest::types::SourceFailure;
use crate::synthesize::client::{GenerationError, GenerationErrorKind};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Section {
    pub heading: String,
    pub body: String,
}

/// Free markdown, or headed sections from structured generation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ReportContent {
    Text(String),
    Sections(Vec<Section>),
}

/// Why generation produced no content. On the wire `message` is the
/// top-level `error` string; `kind` and `raw_output` sit next to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationFailure {
    pub kind: GenerationErrorKind,
    pub message: String,
    /// Model output that failed the schema, kept for a text fallback.
    pub raw_output: Option<String>,
}

impl From<&GenerationError> for GenerationFailure {
    fn from(e: &GenerationError) -> Self {
        Self {
            kind: e.kind(),
            message: format!("Failed to generate report: {e}"),
            raw_output: e.raw_output().map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportBody {
    Content(ReportContent),
    Error(GenerationFailure),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrendingTopic {
    pub topic: String,
    pub explanation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(into = "ReportWire", try_from = "ReportWire")]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    pub body: ReportBody,
    pub trending_topics: Vec<TrendingTopic>,
    pub errors: Vec<SourceFailure>,
}

/// Flat JSON layout of a report; exactly one of `content` / `error` is set.
#[derive(Serialize, Deserialize)]
struct ReportWire {
    timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<ReportContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_kind: Option<GenerationErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    raw_output: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    trending_topics: Vec<TrendingTopic>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    errors: Vec<SourceFailure>,
}

impl From<Report> for ReportWire {
    fn from(r: Report) -> Self {
        let (content, error, error_kind, raw_output) = match r.body {
            ReportBody::Content(c) => (Some(c), None, None, None),
            ReportBody::Error(f) => (None, Some(f.message), Some(f.kind), f.raw_output),
        };
        Self {
            timestamp: r.generated_at,
            content,
            error,
            error_kind,
            raw_output,
            trending_topics: r.trending_topics,
            errors: r.errors,
        }
    }
}

impl TryFrom<ReportWire> for Report {
    type Error = String;

    fn try_from(w: ReportWire) -> Result<Self, String> {
        let body = match (w.content, w.error) {
            (Some(c), None) => ReportBody::Content(c),
            (None, Some(message)) => ReportBody::Error(GenerationFailure {
                // Older artifacts carry only the message.
                kind: w.error_kind.unwrap_or(GenerationErrorKind::Transport),
                message,
                raw_output: w.raw_output,
            }),
            (Some(_), Some(_)) => return Err("report has both `content` and `error`".into()),
            (None, None) => return Err("report needs `content` or `error`".into()),
        };
        Ok(Self {
            generated_at: w.timestamp,
            body,
            trending_topics: w.trending_topics,
            errors: w.errors,
        })
    }
}

impl Report {
    pub fn is_degraded(&self) -> bool {
        matches!(self.body, ReportBody::Error(_))
    }

    pub fn failure(&self) -> Option<&GenerationFailure> {
        match &self.body {
            ReportBody::Error(f) => Some(f),
            ReportBody::Content(_) => None,
        }
    }

    /// Markdown view used by document export. Sections become `## ` blocks;
    /// topics and source failures are appended as their own sections.
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        match &self.body {
            ReportBody::Content(ReportContent::Text(t)) => {
                out.push_str(t.trim_end());
                out.push('\n');
            }
            ReportBody::Content(ReportContent::Sections(sections)) => {
                for s in sections {
                    let _ = write!(out, "## {}\n\n{}\n\n", s.heading.trim(), s.body.trim());
                }
            }
            ReportBody::Error(f) => {
                let _ = write!(out, "# Report generation failed\n\n{}\n", f.message);
            }
        }

        if !self.trending_topics.is_empty() {
            out.push_str("\n## Trending Topics\n\n");
            for t in &self.trending_topics {
                let _ = writeln!(out, "{}: {}", t.topic.trim(), t.explanation.trim());
            }
        }

        if !self.errors.is_empty() {
            out.push_str("\n## Source Failures\n\n");
            for e in &self.errors {
                let _ = writeln!(out, "{}: {}", e.source, e.reason);
            }
        }
        out
    }
}
