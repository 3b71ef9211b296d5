// src/config/mod.rs
pub mod ai;
pub mod research;

pub use ai::AiConfig;
pub use research::{
    CollectConfig, DigestConfig, EndpointsConfig, ExportConfig, ReportStageConfig,
    ResearchConfig, SynthesisConfig, TopicsConfig,
};
