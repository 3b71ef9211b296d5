// src/config/research.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::ai::AiConfig;
use crate::export::{DocumentKind, ExportFormat};
use crate::ingest::providers::coingecko::DEFAULT_COINGECKO_BASE;
use crate::ingest::providers::news_api::DEFAULT_NEWS_API_BASE;
use crate::ingest::providers::yahoo_chart::DEFAULT_YAHOO_BASE;
use crate::ingest::providers::DEFAULT_USER_AGENT;
use crate::ingest::types::{Period, SourceSpec};
use crate::synthesize::{OutputMode, ReportSection};

pub const ENV_CONFIG_PATH: &str = "RESEARCH_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/research.toml";

/// Top-level configuration for one research run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ResearchConfig {
    pub news_sites: Vec<String>,
    pub news_keywords: Vec<String>,
    pub symbols: Vec<String>,
    pub period: Period,
    pub trend_categories: Vec<String>,
    /// Coins fetched per trend category.
    pub num_trending: u32,
    /// Wall-clock cap for collect + synthesize + export.
    pub run_timeout_secs: u64,
    /// When set, Prometheus exposition text is written here after the run.
    pub metrics_textfile: Option<PathBuf>,
    pub collect: CollectConfig,
    pub synthesis: SynthesisConfig,
    pub export: ExportConfig,
    pub endpoints: EndpointsConfig,
    pub ai: AiConfig,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            news_sites: strings(&[
                "https://cointelegraph.com/",
                "https://www.coindesk.com/",
                "https://cryptonews.com/",
                "https://decrypt.co/",
                "https://www.theblockcrypto.com/",
            ]),
            news_keywords: strings(&[
                "cryptocurrency",
                "defi",
                "nft",
                "metaverse",
                "web3",
                "blockchain",
            ]),
            symbols: strings(&["BTC", "ETH", "SOL"]),
            period: Period::Week,
            trend_categories: strings(&["defi", "nft", "metaverse", "web3", "layer-2"]),
            num_trending: 10,
            run_timeout_secs: 600,
            metrics_textfile: None,
            collect: CollectConfig::default(),
            synthesis: SynthesisConfig::default(),
            export: ExportConfig::default(),
            endpoints: EndpointsConfig::default(),
            ai: AiConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CollectConfig {
    pub max_concurrency: usize,
    pub source_timeout_secs: u64,
    pub news_lookback_days: i64,
    pub news_page_size: u32,
    pub user_agent: String,
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            source_timeout_secs: 20,
            news_lookback_days: 7,
            news_page_size: 10,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DigestConfig {
    pub enabled: bool,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            temperature: 0.2,
            max_tokens: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReportStageConfig {
    pub mode: OutputMode,
    pub sections: Vec<ReportSection>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for ReportStageConfig {
    fn default() -> Self {
        Self {
            mode: OutputMode::Markdown,
            sections: ReportSection::defaults(),
            temperature: 0.2,
            max_tokens: 4000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TopicsConfig {
    pub enabled: bool,
    pub max_topics: usize,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for TopicsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_topics: 5,
            temperature: 0.5,
            max_tokens: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SynthesisConfig {
    /// K: records passed to generation, taken positionally from the front.
    pub max_records: usize,
    pub max_body_chars: usize,
    pub max_prompt_chars: usize,
    pub call_timeout_secs: u64,
    /// Keep raw text as content when structured output fails to parse.
    pub schema_fallback: bool,
    pub digest: DigestConfig,
    pub report: ReportStageConfig,
    pub topics: TopicsConfig,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            max_records: 10,
            max_body_chars: 400,
            max_prompt_chars: 24_000,
            call_timeout_secs: 90,
            schema_fallback: false,
            digest: DigestConfig::default(),
            report: ReportStageConfig::default(),
            topics: TopicsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExportConfig {
    pub format: ExportFormat,
    /// Backend for the document format.
    pub document: DocumentKind,
    pub output_dir: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            format: ExportFormat::Json,
            document: DocumentKind::Pdf,
            output_dir: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EndpointsConfig {
    pub news_api: String,
    pub yahoo: String,
    pub coingecko: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            news_api: DEFAULT_NEWS_API_BASE.to_string(),
            yahoo: DEFAULT_YAHOO_BASE.to_string(),
            coingecko: DEFAULT_COINGECKO_BASE.to_string(),
        }
    }
}

impl ResearchConfig {
    /// Load using env var + fallbacks, then apply env overrides:
    /// 1) $RESEARCH_CONFIG_PATH
    /// 2) config/research.toml
    /// 3) built-in defaults
    pub fn load() -> Result<Self> {
        let mut cfg = if let Ok(p) = env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            Self::read_file(&pb)?
        } else if Path::new(DEFAULT_CONFIG_PATH).exists() {
            Self::read_file(Path::new(DEFAULT_CONFIG_PATH))?
        } else {
            tracing::info!("no config file found, using defaults");
            Self::default()
        };
        cfg.apply_env_overrides()?;
        cfg.sanitize();
        Ok(cfg)
    }

    /// Load one file without env overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut cfg = Self::read_file(path)?;
        cfg.sanitize();
        Ok(cfg)
    }

    fn read_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(v) = env::var("CRYPTO_SYMBOLS") {
            self.symbols = split_list(&v);
        }
        if let Ok(v) = env::var("MARKET_PERIOD") {
            self.period = v.parse().context("MARKET_PERIOD")?;
        }
        if let Ok(v) = env::var("REPORT_FORMAT") {
            self.export.format = v.parse().context("REPORT_FORMAT")?;
        }
        if let Ok(v) = env::var("REPORT_OUTPUT_DIR") {
            self.export.output_dir = PathBuf::from(v);
        }
        if let Ok(v) = env::var("DIGEST_MAX_RECORDS") {
            self.synthesis.max_records = v
                .trim()
                .parse()
                .with_context(|| format!("DIGEST_MAX_RECORDS={v}"))?;
        }
        if let Ok(v) = env::var("GENERATION_MODEL") {
            if !v.trim().is_empty() {
                self.ai.model = v.trim().to_string();
            }
        }
        Ok(())
    }

    /// Clamp values into usable ranges.
    pub fn sanitize(&mut self) {
        self.ai.sanitize();
        let s = &mut self.synthesis;
        s.max_records = s.max_records.max(1);
        s.max_body_chars = s.max_body_chars.max(16);
        s.max_prompt_chars = s.max_prompt_chars.max(1_000);
        if s.call_timeout_secs == 0 {
            s.call_timeout_secs = SynthesisConfig::default().call_timeout_secs;
        }
        for t in [
            &mut s.digest.temperature,
            &mut s.report.temperature,
            &mut s.topics.temperature,
        ] {
            *t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.2 };
        }
        if s.report.sections.is_empty() {
            s.report.sections = ReportSection::defaults();
        }
        s.topics.max_topics = s.topics.max_topics.max(1);

        self.collect.max_concurrency = self.collect.max_concurrency.max(1);
        self.symbols = self
            .symbols
            .iter()
            .map(|s| s.trim().to_ascii_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
        if self.run_timeout_secs == 0 {
            self.run_timeout_secs = ResearchConfig::default().run_timeout_secs;
        }
    }

    /// Sources in collection order: sites, keywords, trend categories, markets.
    pub fn sources(&self) -> Vec<SourceSpec> {
        let sites = self
            .news_sites
            .iter()
            .map(|url| SourceSpec::NewsSite { url: url.clone() });
        let keywords = self
            .news_keywords
            .iter()
            .map(|k| SourceSpec::NewsKeyword { keyword: k.clone() });
        let trending = self
            .trend_categories
            .iter()
            .map(|c| SourceSpec::Trending { category: c.clone() });
        let markets = self.symbols.iter().map(|s| SourceSpec::Market {
            symbol: s.clone(),
            period: self.period,
        });
        sites.chain(keywords).chain(trending).chain(markets).collect()
    }
}

fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}
