//! LLM provider abstraction.
//!
//! `LlmProvider` is an enum over concrete provider implementations.
//! Add a new variant + module in `providers/` for each additional backend.
//!
//! Provider instances are shared immutable capabilities — clone them freely.
//! `complete` is an `async fn` on the enum so callers need no trait-object
//! machinery. Cancellation is the caller's concern: dropping the returned
//! future aborts the in-flight HTTP request.

pub mod providers;
pub mod tokens;

use serde::Serialize;
use thiserror::Error;

use crate::config::TurnConfig;

pub use tokens::TokenCounter;

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    #[error("missing API key: set {0}")]
    MissingApiKey(&'static str),
    #[error("provider request failed: {0}")]
    Request(String),
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },
    #[error("completion response contained no choices")]
    EmptyResponse,
    #[error("tokenizer unavailable: {0}")]
    Tokenizer(String),
}

// ── Request / response ────────────────────────────────────────────────────────

/// A single text-completion call. Field names match the completions wire body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub prompt: Vec<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub presence_penalty: f32,
    pub frequency_penalty: f32,
    pub model: String,
    pub stop: Vec<String>,
}

impl CompletionRequest {
    /// One prompt entry; stop sequence and sampling parameters from `turn`.
    pub fn new(prompt: String, turn: &TurnConfig) -> Self {
        Self {
            prompt: vec![prompt],
            max_tokens: turn.max_tokens,
            temperature: turn.temperature,
            presence_penalty: turn.presence_penalty,
            frequency_penalty: turn.frequency_penalty,
            model: turn.model.clone(),
            stop: vec![turn.stop.clone()],
        }
    }
}

/// Token accounting reported by the provider, when available.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LlmUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// Provider reply: every choice's text, in the order returned.
#[derive(Debug, Clone, Default)]
pub struct Completion {
    pub choices: Vec<String>,
    pub usage: Option<LlmUsage>,
}

impl Completion {
    /// Take the first choice. A reply with no choices is an error.
    pub fn into_first_choice(self) -> Result<String, ProviderError> {
        self.choices.into_iter().next().ok_or(ProviderError::EmptyResponse)
    }
}

// ── Provider enum ─────────────────────────────────────────────────────────────

/// All available provider backends.
#[derive(Debug, Clone)]
pub enum LlmProvider {
    Azure(providers::azure_openai::AzureOpenAiProvider),
    Dummy(providers::dummy::DummyProvider),
}

impl LlmProvider {
    /// Send `request` to `deployment` and return the provider's choices.
    pub async fn complete(
        &self,
        deployment: &str,
        request: &CompletionRequest,
    ) -> Result<Completion, ProviderError> {
        match self {
            LlmProvider::Azure(p) => p.complete(deployment, request).await,
            LlmProvider::Dummy(p) => p.complete(deployment, request).await,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LlmProvider::Azure(_) => "azure",
            LlmProvider::Dummy(_) => "dummy",
        }
    }
}
