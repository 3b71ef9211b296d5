// src/ingest/mod.rs
pub mod normalize;
pub mod providers;
pub mod types;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::OnceCell;

use crate::config::research::CollectConfig;
use crate::ingest::normalize::{normalize_batch, snapshot_from_series};
use crate::ingest::types::{
    MarketSnapshot, RawBatch, Record, SourceClient, SourceFailure, SourceKind, SourceSpec,
};

pub use crate::ingest::normalize::normalize_text;

/// One-time metrics registration.
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("collect_records_total", "Records kept after normalization.");
        describe_counter!(
            "collect_items_skipped_total",
            "Raw items dropped because a required field was missing."
        );
        describe_counter!(
            "collect_source_failures_total",
            "Sources that failed to fetch or parse."
        );
        describe_counter!(
            "collect_snapshots_dropped_total",
            "Market series dropped because they had no usable closes."
        );
        describe_histogram!("collect_fetch_ms", "Per-source fetch time in milliseconds.");
        describe_histogram!("ingest_parse_ms", "Provider payload parse time in milliseconds.");
        describe_counter!("ingest_raw_items_total", "Raw items returned by providers.");
    });
}

/// Aggregate of one collection pass. Order follows the input sources.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectOutput {
    pub records: Vec<Record>,
    pub snapshots: Vec<MarketSnapshot>,
    pub failures: Vec<SourceFailure>,
    /// Items soft-skipped by the normalizer (logging only).
    pub skipped: usize,
}

/// Result of a single source, before the in-order fold.
#[derive(Debug)]
enum SourceOutcome {
    Items { records: Vec<Record>, skipped: usize },
    Snapshot(Option<MarketSnapshot>),
    Failed(SourceFailure),
}

/// Drives the registered source clients over a list of sources.
pub struct Collector {
    clients: HashMap<SourceKind, Arc<dyn SourceClient>>,
    max_concurrency: usize,
    source_timeout: Duration,
}

impl Collector {
    pub fn new(cfg: &CollectConfig) -> Self {
        Self {
            clients: HashMap::new(),
            max_concurrency: cfg.max_concurrency.max(1),
            source_timeout: Duration::from_secs(cfg.source_timeout_secs.max(1)),
        }
    }

    pub fn with_client(mut self, kind: SourceKind, client: Arc<dyn SourceClient>) -> Self {
        self.clients.insert(kind, client);
        self
    }

    pub fn with_source_timeout(mut self, timeout: Duration) -> Self {
        self.source_timeout = timeout;
        self
    }

    /// Collect from every source. A failing source becomes a `SourceFailure`
    /// and never stops the others.
    pub async fn collect(&self, sources: &[SourceSpec]) -> CollectOutput {
        ensure_metrics_described();
        tracing::info!(sources = sources.len(), "collecting");

        // `buffered` keeps input order regardless of completion order.
        let outcomes: Vec<SourceOutcome> = stream::iter(sources)
            .map(|spec| self.collect_one(spec))
            .buffered(self.max_concurrency)
            .collect()
            .await;

        let mut out = CollectOutput::default();
        for outcome in outcomes {
            match outcome {
                SourceOutcome::Items { mut records, skipped } => {
                    out.skipped += skipped;
                    out.records.append(&mut records);
                }
                SourceOutcome::Snapshot(Some(s)) => out.snapshots.push(s),
                SourceOutcome::Snapshot(None) => {}
                SourceOutcome::Failed(f) => out.failures.push(f),
            }
        }

        counter!("collect_records_total").increment(out.records.len() as u64);
        counter!("collect_items_skipped_total").increment(out.skipped as u64);
        counter!("collect_source_failures_total").increment(out.failures.len() as u64);

        tracing::info!(
            records = out.records.len(),
            snapshots = out.snapshots.len(),
            failures = out.failures.len(),
            skipped = out.skipped,
            "collection finished"
        );
        out
    }

    async fn collect_one(&self, spec: &SourceSpec) -> SourceOutcome {
        let label = spec.label();
        let Some(client) = self.clients.get(&spec.kind()) else {
            tracing::warn!(source = %label, "no client registered for source kind");
            return SourceOutcome::Failed(SourceFailure::new(
                label,
                format!("no client registered for {:?} sources", spec.kind()),
            ));
        };

        let t0 = Instant::now();
        let fetched = tokio::time::timeout(self.source_timeout, client.fetch(spec)).await;
        histogram!("collect_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

        let batch = match fetched {
            Ok(Ok(batch)) => batch,
            Ok(Err(e)) => {
                tracing::warn!(error = ?e, source = %label, provider = client.name(), "source error");
                return SourceOutcome::Failed(SourceFailure::new(label, format!("{e:#}")));
            }
            Err(_) => {
                tracing::warn!(source = %label, provider = client.name(), timeout = ?self.source_timeout, "source timed out");
                return SourceOutcome::Failed(SourceFailure::new(
                    label,
                    format!("timed out after {}s", self.source_timeout.as_secs()),
                ));
            }
        };

        match (spec, batch) {
            (SourceSpec::Market { .. }, RawBatch::Series(series)) => {
                let snap = snapshot_from_series(series);
                match &snap {
                    Some(s) => tracing::debug!(
                        source = %label,
                        points = s.close_series.len(),
                        change = s.percent_change,
                        "snapshot built"
                    ),
                    None => {
                        counter!("collect_snapshots_dropped_total").increment(1);
                        tracing::info!(source = %label, "empty series, snapshot dropped");
                    }
                }
                SourceOutcome::Snapshot(snap)
            }
            (SourceSpec::Market { .. }, RawBatch::Items(_)) | (_, RawBatch::Series(_)) => {
                tracing::warn!(source = %label, provider = client.name(), "payload kind does not match source");
                SourceOutcome::Failed(SourceFailure::new(
                    label,
                    "client returned a payload of the wrong kind",
                ))
            }
            (_, RawBatch::Items(items)) => {
                let (records, skipped) = normalize_batch(&items, &spec.record_source());
                if skipped > 0 {
                    tracing::debug!(source = %label, skipped, "items skipped by normalizer");
                }
                tracing::info!(source = %label, records = records.len(), "source collected");
                SourceOutcome::Items { records, skipped }
            }
        }
    }
}
