// tests/synthesize.rs
use std::sync::Arc;
use std::time::Duration;

use crypto_research::config::SynthesisConfig;
use crypto_research::ingest::types::{Period, Record};
use crypto_research::report::{ReportBody, ReportContent};
use crypto_research::synthesize::client::{
    CompletionRequest, GenerationClient, GenerationError, GenerationFuture, MockClient,
};
use crypto_research::synthesize::{GenerationErrorKind, OutputMode};
use crypto_research::{MarketSnapshot, SourceFailure, Synthesizer};

fn records(n: usize) -> Vec<Record> {
    (0..n)
        .map(|i| {
            Record::try_new(
                format!("Article {i:02}"),
                Some(format!("Body of article {i:02}")),
                Some(format!("https://news.test/{i}")),
                None,
                "news.test",
            )
            .unwrap()
        })
        .collect()
}

fn snapshot() -> MarketSnapshot {
    let t0 = chrono::DateTime::from_timestamp(1_714_521_600, 0).unwrap();
    let t1 = chrono::DateTime::from_timestamp(1_714_608_000, 0).unwrap();
    MarketSnapshot {
        symbol: "ETH".into(),
        period: Period::Week,
        close_series: vec![(t0, 3000.0), (t1, 3150.0)],
        volume_series: vec![(t1, 1.0e9)],
        percent_change: 5.0,
    }
}

fn structured() -> SynthesisConfig {
    let mut cfg = SynthesisConfig::default();
    cfg.report.mode = OutputMode::Structured;
    cfg
}

#[tokio::test]
async fn digest_receives_exactly_the_first_k_records() {
    let mock = Arc::new(MockClient::always("summary"));
    let s = Synthesizer::new(mock.clone(), SynthesisConfig::default(), "test-model");
    s.synthesize(records(25), vec![], vec![]).await;

    let reqs = mock.requests();
    let digest = &reqs[0].user;
    for i in 0..10 {
        assert!(digest.contains(&format!("\"Article {i:02}\"")), "missing {i}");
    }
    for i in 10..25 {
        assert!(!digest.contains(&format!("Article {i:02}")), "leaked {i}");
    }
    assert_eq!(reqs[0].temperature, 0.2);
    assert_eq!(reqs[0].max_tokens, 500);
    assert_eq!(reqs[0].model, "test-model");
}

#[tokio::test]
async fn report_prompt_carries_market_lines_and_sections() {
    let mock = Arc::new(MockClient::always("text"));
    let s = Synthesizer::new(mock.clone(), SynthesisConfig::default(), "m");
    s.synthesize(records(2), vec![snapshot()], vec![]).await;

    let report = &mock.requests()[1].user;
    assert!(report.contains("ETH (7d): first close 3000.00, last close 3150.00, change +5.00%"));
    assert!(report.contains("1. Executive Summary"));
    assert!(report.contains("5. Conclusion and Outlook"));
    assert!(!report.contains("close_series"));
}

#[tokio::test]
async fn prompts_are_hard_capped() {
    let mock = Arc::new(MockClient::always("text"));
    let mut cfg = SynthesisConfig::default();
    cfg.max_prompt_chars = 1_000;
    cfg.max_body_chars = 10_000;
    let long: Vec<Record> = (0..10)
        .map(|i| Record::try_new(format!("t{i}"), Some("y".repeat(1_400)), None, None, "s").unwrap())
        .collect();
    Synthesizer::new(mock.clone(), cfg, "m")
        .synthesize(long, vec![], vec![])
        .await;
    for req in mock.requests() {
        assert!(req.user.chars().count() <= 1_000);
    }
    assert!(mock.requests()[0].user.ends_with("[truncated]"));
}

#[tokio::test]
async fn transport_failure_yields_degraded_report() {
    let mock = Arc::new(MockClient::scripted(vec![Err(GenerationError::Status {
        status: 401,
        body: "invalid api key".into(),
    })]));
    let failures = vec![SourceFailure::new("newsapi:defi", "missing NEWS_API_KEY")];
    let s = Synthesizer::new(mock.clone(), SynthesisConfig::default(), "m");
    let report = s.synthesize(records(3), vec![], failures.clone()).await;

    assert!(report.is_degraded());
    let f = report.failure().unwrap();
    assert_eq!(f.kind, GenerationErrorKind::Transport);
    assert!(f.message.starts_with("Failed to generate report:"));
    assert!(f.message.contains("401"));
    assert_eq!(report.errors, failures);
    // No retry, no report stage after a failed digest.
    assert_eq!(mock.requests().len(), 1);
}

struct Stalled;

impl GenerationClient for Stalled {
    fn complete<'a>(&'a self, _request: &'a CompletionRequest) -> GenerationFuture<'a> {
        Box::pin(async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok("late".to_string())
        })
    }
    fn provider_name(&self) -> &'static str {
        "stalled"
    }
}

#[tokio::test]
async fn call_timeout_is_a_transport_failure() {
    let s = Synthesizer::new(Arc::new(Stalled), SynthesisConfig::default(), "m")
        .with_call_timeout(Duration::from_millis(30));
    let report = s.synthesize(records(1), vec![], vec![]).await;
    let f = report.failure().unwrap();
    assert_eq!(f.kind, GenerationErrorKind::Transport);
    assert!(f.message.contains("timed out"));
}

#[tokio::test]
async fn structured_output_is_parsed_into_sections() {
    let mock = Arc::new(MockClient::scripted(vec![
        Ok("digest".into()),
        Ok("```json\n{\"sections\":[{\"heading\":\"Executive Summary\",\"body\":\"Risk-on.\"}]}\n```".into()),
    ]));
    let s = Synthesizer::new(mock.clone(), structured(), "m");
    let report = s.synthesize(records(2), vec![], vec![]).await;

    let ReportBody::Content(ReportContent::Sections(sections)) = &report.body else {
        panic!("expected sections, got {:?}", report.body);
    };
    assert_eq!(sections[0].heading, "Executive Summary");
    assert!(mock.requests()[1].json_mode);
    assert!(!mock.requests()[0].json_mode);
}

#[tokio::test]
async fn schema_failure_is_distinct_from_transport() {
    let mock = Arc::new(MockClient::scripted(vec![
        Ok("digest".into()),
        Ok("# Not JSON at all".into()),
    ]));
    let s = Synthesizer::new(mock, structured(), "m");
    let report = s.synthesize(records(2), vec![], vec![]).await;

    let f = report.failure().unwrap();
    assert_eq!(f.kind, GenerationErrorKind::Schema);
    assert_eq!(f.raw_output.as_deref(), Some("# Not JSON at all"));
}

#[tokio::test]
async fn schema_fallback_keeps_raw_text() {
    let mock = Arc::new(MockClient::scripted(vec![
        Ok("digest".into()),
        Ok("# Not JSON at all".into()),
    ]));
    let mut cfg = structured();
    cfg.schema_fallback = true;
    let report = Synthesizer::new(mock, cfg, "m")
        .synthesize(records(2), vec![], vec![])
        .await;

    assert!(!report.is_degraded());
    assert_eq!(
        report.body,
        ReportBody::Content(ReportContent::Text("# Not JSON at all".into()))
    );
    let last = report.errors.last().unwrap();
    assert_eq!(last.source, "generation:report");
}

#[tokio::test]
async fn topics_stage_adds_topics() {
    let mock = Arc::new(MockClient::scripted(vec![
        Ok("digest".into()),
        Ok("# Report".into()),
        Ok(r#"{"trending_topics":[{"topic":"Restaking","explanation":"Yield on staked ETH."}]}"#.into()),
    ]));
    let mut cfg = SynthesisConfig::default();
    cfg.topics.enabled = true;
    let report = Synthesizer::new(mock.clone(), cfg, "m")
        .synthesize(records(4), vec![], vec![])
        .await;

    assert_eq!(report.trending_topics.len(), 1);
    assert_eq!(report.trending_topics[0].topic, "Restaking");
    let topics_req = &mock.requests()[2];
    assert_eq!(topics_req.temperature, 0.5);
    assert_eq!(topics_req.max_tokens, 1000);
    assert!(topics_req.user.contains("Title: Article 03"));
}

#[tokio::test]
async fn topics_failure_is_not_fatal() {
    let mock = Arc::new(MockClient::scripted(vec![
        Ok("digest".into()),
        Ok("# Report".into()),
        Err(GenerationError::EmptyResponse),
    ]));
    let mut cfg = SynthesisConfig::default();
    cfg.topics.enabled = true;
    let failures = vec![SourceFailure::new("https://decrypt.co/", "timed out after 20s")];
    let report = Synthesizer::new(mock, cfg, "m")
        .synthesize(records(4), vec![], failures)
        .await;

    assert!(!report.is_degraded());
    assert!(report.trending_topics.is_empty());
    let sources: Vec<_> = report.errors.iter().map(|e| e.source.as_str()).collect();
    assert_eq!(sources, vec!["https://decrypt.co/", "generation:topics"]);
}

#[tokio::test]
async fn empty_collection_still_produces_a_report() {
    let mock = Arc::new(MockClient::always("Nothing to report."));
    let report = Synthesizer::new(mock, SynthesisConfig::default(), "m")
        .synthesize(vec![], vec![], vec![])
        .await;
    assert_eq!(
        report.body,
        ReportBody::Content(ReportContent::Text("Nothing to report.".into()))
    );
}
