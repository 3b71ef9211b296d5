// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod export;
pub mod ingest;
pub mod metrics;
pub mod pipeline;
pub mod report;
pub mod synthesize;

// ---- Re-exports for stable public API ----
pub use crate::config::ResearchConfig;
pub use crate::export::{DocumentKind, ExportError, ExportFormat, Exporter};
pub use crate::ingest::types::{MarketSnapshot, Period, Record, SourceFailure, SourceSpec};
pub use crate::ingest::{CollectOutput, Collector};
pub use crate::pipeline::{Pipeline, PipelineError, RunOutcome};
pub use crate::report::Report;
pub use crate::synthesize::Synthesizer;
