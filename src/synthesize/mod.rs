// src/synthesize/mod.rs
pub mod client;
pub mod prompt;

use std::time::{Duration, Instant};

use chrono::Utc;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::config::research::SynthesisConfig;
use crate::ingest::types::{MarketSnapshot, Record, SourceFailure};
use crate::report::{GenerationFailure, Report, ReportBody, ReportContent};
use crate::synthesize::client::{CompletionRequest, DynGenerationClient, GenerationError};
use crate::synthesize::prompt::ReportInput;

pub use client::{build_client_from_config, GenerationClient, GenerationErrorKind};

/// Shape of the report stage output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Free markdown text.
    #[default]
    Markdown,
    /// JSON object parsed into headed sections.
    Structured,
}

/// Sections the report stage asks for, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportSection {
    ExecutiveSummary,
    KeyNews,
    MarketImplications,
    OpportunitiesAndRisks,
    Outlook,
}

impl ReportSection {
    pub fn title(self) -> &'static str {
        match self {
            ReportSection::ExecutiveSummary => "Executive Summary",
            ReportSection::KeyNews => "Key News and Events",
            ReportSection::MarketImplications => "Market Implications",
            ReportSection::OpportunitiesAndRisks => "Potential Opportunities and Risks",
            ReportSection::Outlook => "Conclusion and Outlook",
        }
    }

    pub fn defaults() -> Vec<ReportSection> {
        vec![
            ReportSection::ExecutiveSummary,
            ReportSection::KeyNews,
            ReportSection::MarketImplications,
            ReportSection::OpportunitiesAndRisks,
            ReportSection::Outlook,
        ]
    }
}

pub const TOPICS_FAILURE_SOURCE: &str = "generation:topics";
pub const REPORT_FAILURE_SOURCE: &str = "generation:report";

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("generation_calls_total", "Generation requests issued, by stage.");
        describe_counter!(
            "generation_failures_total",
            "Generation requests that failed, by stage and kind."
        );
        describe_histogram!("generation_call_ms", "Generation latency in milliseconds.");
    });
}

/// Turns collected data into a `Report` through digest, report and
/// (optionally) topics calls. Never fails: generation errors become a
/// degraded report.
pub struct Synthesizer {
    client: DynGenerationClient,
    cfg: SynthesisConfig,
    model: String,
    call_timeout: Duration,
}

impl Synthesizer {
    pub fn new(client: DynGenerationClient, cfg: SynthesisConfig, model: impl Into<String>) -> Self {
        let call_timeout = Duration::from_secs(cfg.call_timeout_secs.max(1));
        Self {
            client,
            cfg,
            model: model.into(),
            call_timeout,
        }
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub async fn synthesize(
        &self,
        records: Vec<Record>,
        snapshots: Vec<MarketSnapshot>,
        failures: Vec<SourceFailure>,
    ) -> Report {
        ensure_metrics_described();
        let generated_at = Utc::now();
        let mut errors = failures;

        let k = self.cfg.max_records;
        let selected = prompt::select_records(&records, k);
        let dropped = records.len() - selected.len();
        if dropped > 0 {
            tracing::info!(kept = selected.len(), dropped, k, "records past K left out of generation");
        }
        let records_json = prompt::records_payload(selected, self.cfg.max_body_chars);
        let market = prompt::market_payload(&snapshots);

        let digest = if self.cfg.digest.enabled {
            let req = self.request(
                prompt::DIGEST_SYSTEM,
                prompt::digest_prompt(&records_json),
                self.cfg.digest.temperature,
                self.cfg.digest.max_tokens,
                false,
            );
            match self.call("digest", &req).await {
                Ok(text) => Some(text),
                Err(e) => return degraded(generated_at, &e, errors),
            }
        } else {
            None
        };

        let input = match &digest {
            Some(d) => ReportInput::Digest(d),
            None => ReportInput::Records(&records_json),
        };
        let report_cfg = &self.cfg.report;
        let structured = report_cfg.mode == OutputMode::Structured;
        let req = self.request(
            prompt::REPORT_SYSTEM,
            prompt::report_prompt(input, &market, &report_cfg.sections, report_cfg.mode),
            report_cfg.temperature,
            report_cfg.max_tokens,
            structured,
        );
        let raw = match self.call("report", &req).await {
            Ok(text) => text,
            Err(e) => return degraded(generated_at, &e, errors),
        };

        let content = if structured {
            match prompt::parse_structured_report(&raw) {
                Ok(sections) => ReportContent::Sections(sections),
                Err(e) => {
                    counter!("generation_failures_total", "stage" => "report", "kind" => e.kind().as_str())
                        .increment(1);
                    if !self.cfg.schema_fallback {
                        tracing::warn!(error = %e, "structured report failed schema");
                        return degraded(generated_at, &e, errors);
                    }
                    tracing::warn!(error = %e, "structured report failed schema, keeping raw text");
                    errors.push(SourceFailure::new(REPORT_FAILURE_SOURCE, e.to_string()));
                    ReportContent::Text(raw)
                }
            }
        } else {
            ReportContent::Text(raw)
        };

        let trending_topics = if self.cfg.topics.enabled {
            let topics = &self.cfg.topics;
            let req = self.request(
                prompt::TOPICS_SYSTEM,
                prompt::topics_prompt(selected, topics.max_topics, self.cfg.max_body_chars),
                topics.temperature,
                topics.max_tokens,
                true,
            );
            let parsed = match self.call("topics", &req).await {
                Ok(raw) => prompt::parse_topics(&raw, topics.max_topics),
                Err(e) => Err(e),
            };
            match parsed {
                Ok(t) => {
                    tracing::info!(topics = t.len(), "trending topics extracted");
                    t
                }
                Err(e) => {
                    tracing::warn!(error = %e, kind = e.kind().as_str(), "topic extraction failed");
                    errors.push(SourceFailure::new(TOPICS_FAILURE_SOURCE, e.to_string()));
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        Report {
            generated_at,
            body: ReportBody::Content(content),
            trending_topics,
            errors,
        }
    }

    fn request(
        &self,
        system: &str,
        user: String,
        temperature: f32,
        max_tokens: u32,
        json_mode: bool,
    ) -> CompletionRequest {
        CompletionRequest {
            system: system.to_string(),
            user: prompt::truncate_chars(&user, self.cfg.max_prompt_chars),
            model: self.model.clone(),
            temperature,
            max_tokens,
            json_mode,
        }
    }

    async fn call(&self, stage: &'static str, req: &CompletionRequest) -> Result<String, GenerationError> {
        counter!("generation_calls_total", "stage" => stage).increment(1);
        tracing::debug!(
            stage,
            provider = self.client.provider_name(),
            prompt_chars = req.user.chars().count(),
            "generation call"
        );

        let t0 = Instant::now();
        let result = match tokio::time::timeout(self.call_timeout, self.client.complete(req)).await {
            Ok(r) => r,
            Err(_) => Err(GenerationError::Timeout(self.call_timeout)),
        };
        histogram!("generation_call_ms", "stage" => stage).record(t0.elapsed().as_secs_f64() * 1_000.0);

        if let Err(e) = &result {
            counter!("generation_failures_total", "stage" => stage, "kind" => e.kind().as_str())
                .increment(1);
            tracing::warn!(error = %e, stage, provider = self.client.provider_name(), "generation failed");
        }
        result
    }
}

fn degraded(
    generated_at: chrono::DateTime<Utc>,
    e: &GenerationError,
    errors: Vec<SourceFailure>,
) -> Report {
    Report {
        generated_at,
        body: ReportBody::Error(GenerationFailure::from(e)),
        trending_topics: Vec::new(),
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthesize::client::MockClient;
    use std::sync::Arc;

    fn records(n: usize) -> Vec<Record> {
        (0..n)
            .map(|i| Record::try_new(format!("Article {i:02}"), None, None, None, "test").unwrap())
            .collect()
    }

    #[tokio::test]
    async fn digest_then_report_in_markdown() {
        let mock = Arc::new(MockClient::scripted(vec![
            Ok("digest text".into()),
            Ok("# Report".into()),
        ]));
        let s = Synthesizer::new(mock.clone(), SynthesisConfig::default(), "m");
        let report = s.synthesize(records(3), vec![], vec![]).await;
        assert_eq!(report.body, ReportBody::Content(ReportContent::Text("# Report".into())));

        let reqs = mock.requests();
        assert_eq!(reqs.len(), 2);
        assert!(reqs[1].user.contains("News Summary:\ndigest text"));
        assert_eq!(reqs[1].max_tokens, 4000);
    }

    #[tokio::test]
    async fn digest_disabled_sends_records_to_report() {
        let mock = Arc::new(MockClient::always("ok"));
        let mut cfg = SynthesisConfig::default();
        cfg.digest.enabled = false;
        let s = Synthesizer::new(mock.clone(), cfg, "m");
        s.synthesize(records(2), vec![], vec![]).await;

        let reqs = mock.requests();
        assert_eq!(reqs.len(), 1);
        assert!(reqs[0].user.contains("Recent News Articles:"));
        assert!(reqs[0].user.contains("Article 01"));
    }

    #[test]
    fn default_sections_are_the_five_report_parts() {
        let titles: Vec<_> = ReportSection::defaults().iter().map(|s| s.title()).collect();
        assert_eq!(titles[0], "Executive Summary");
        assert_eq!(titles.len(), 5);
    }
}
