//! Generation collaborator: one trait, an OpenAI-compatible chat client,
//! and deterministic stand-ins for tests and offline runs.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::ai::AiConfig;

// ------------------------------------------------------------
// Public surface
// ------------------------------------------------------------

/// One completion call: bounded prompts plus sampling parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Ask the endpoint for a JSON object response.
    pub json_mode: bool,
}

/// Coarse error class surfaced in reports and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationErrorKind {
    Transport,
    Schema,
}

impl GenerationErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            GenerationErrorKind::Transport => "transport",
            GenerationErrorKind::Schema => "schema",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("empty completion")]
    EmptyResponse,
    #[error("structured output did not match schema: {message}")]
    Schema { message: String, raw: String },
}

impl GenerationError {
    pub fn kind(&self) -> GenerationErrorKind {
        match self {
            GenerationError::Schema { .. } => GenerationErrorKind::Schema,
            _ => GenerationErrorKind::Transport,
        }
    }

    pub fn raw_output(&self) -> Option<&str> {
        match self {
            GenerationError::Schema { raw, .. } => Some(raw),
            _ => None,
        }
    }
}

pub type GenerationFuture<'a> =
    Pin<Box<dyn Future<Output = Result<String, GenerationError>> + Send + 'a>>;

/// Trait object handed to the synthesizer.
pub trait GenerationClient: Send + Sync {
    fn complete<'a>(&'a self, request: &'a CompletionRequest) -> GenerationFuture<'a>;
    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

/// Convenient alias used by callers.
pub type DynGenerationClient = Arc<dyn GenerationClient>;

/// Factory: build a client according to config and environment variables.
///
/// * If `GENERATION_TEST_MODE=mock` or `provider = "mock"`, returns a canned client.
/// * Else builds the OpenAI-compatible chat client for the configured provider.
pub fn build_client_from_config(config: &AiConfig) -> Result<DynGenerationClient> {
    let mock_env = std::env::var("GENERATION_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false);
    if mock_env || config.provider == "mock" {
        tracing::warn!("generation running in mock mode");
        return Ok(Arc::new(MockClient::canned()));
    }

    let client = ChatCompletionsClient::new(
        config.base_url(),
        config.resolve_api_key(),
        Duration::from_secs(config.request_timeout_secs),
    )?;
    tracing::info!(
        provider = %config.provider,
        model = %config.model,
        key_present = client.has_key(),
        "generation client ready"
    );
    Ok(Arc::new(client))
}

// ------------------------------------------------------------
// OpenAI-compatible chat completions (Groq, OpenAI)
// ------------------------------------------------------------

pub struct ChatCompletionsClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl ChatCompletionsClient {
    pub fn new(base_url: String, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("crypto-research/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4))
            .timeout(timeout)
            .build()
            .context("building generation http client")?;
        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key,
        })
    }

    pub fn has_key(&self) -> bool {
        self.api_key.is_some()
    }

    async fn complete_impl(&self, request: &CompletionRequest) -> Result<String, GenerationError> {
        let Some(key) = self.api_key.as_deref() else {
            return Err(GenerationError::Transport("missing API key".into()));
        };

        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct ResponseFormat {
            #[serde(rename = "type")]
            kind: &'static str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
            max_tokens: u32,
            #[serde(skip_serializing_if = "Option::is_none")]
            response_format: Option<ResponseFormat>,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            content: Option<String>,
        }

        let req = Req {
            model: &request.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: &request.system,
                },
                Msg {
                    role: "user",
                    content: &request.user,
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            response_format: request
                .json_mode
                .then_some(ResponseFormat { kind: "json_object" }),
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(key)
            .json(&req)
            .send()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body: truncate(&body, 300),
            });
        }

        let body: Resp = resp
            .json()
            .await
            .map_err(|e| GenerationError::Transport(format!("decoding completion: {e}")))?;
        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(GenerationError::EmptyResponse)
    }
}

impl GenerationClient for ChatCompletionsClient {
    fn complete<'a>(&'a self, request: &'a CompletionRequest) -> GenerationFuture<'a> {
        Box::pin(self.complete_impl(request))
    }
    fn provider_name(&self) -> &'static str {
        "chat-completions"
    }
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

// ------------------------------------------------------------
// Stand-ins
// ------------------------------------------------------------

/// Replays scripted responses in order and records every request it sees.
/// Once the script runs out it answers with `fallback` (or a transport error).
pub struct MockClient {
    script: Mutex<VecDeque<Result<String, GenerationError>>>,
    fallback: Option<String>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockClient {
    pub fn scripted(responses: Vec<Result<String, GenerationError>>) -> Self {
        Self {
            script: Mutex::new(responses.into()),
            fallback: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answers every call with the same text.
    pub fn always(text: impl Into<String>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Some(text.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Offline demo output for `GENERATION_TEST_MODE=mock`.
    pub fn canned() -> Self {
        Self::always(
            "# Crypto Research Report (mock)\n\n## Executive Summary\nGeneration ran in mock mode; no model was called.\n",
        )
    }

    /// Requests received so far, in call order.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .map(|g| g.clone())
            .unwrap_or_default()
    }

    fn next(&self, request: &CompletionRequest) -> Result<String, GenerationError> {
        if let Ok(mut g) = self.requests.lock() {
            g.push(request.clone());
        }
        let scripted = self.script.lock().ok().and_then(|mut g| g.pop_front());
        match (scripted, &self.fallback) {
            (Some(r), _) => r,
            (None, Some(text)) => Ok(text.clone()),
            (None, None) => Err(GenerationError::Transport("mock script exhausted".into())),
        }
    }
}

impl GenerationClient for MockClient {
    fn complete<'a>(&'a self, request: &'a CompletionRequest) -> GenerationFuture<'a> {
        let out = self.next(request);
        Box::pin(async move { out })
    }
    fn provider_name(&self) -> &'static str {
        "mock"
    }
}
