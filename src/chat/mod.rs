//! Conversational turn handling.
//!
//! ```text
//! ChatSession::handle_turn(input)
//!     ├─ trim::plan(system, transcript, budget)   ← borrowed view, no mutation
//!     ├─ LlmProvider::complete(deployment, req)   ← only await point, cancellable
//!     └─ transcript: drop planned + record user/assistant pair
//! ```
//!
//! A session owns its transcript; `&mut self` keeps one turn in flight.

pub mod chatml;
pub mod message;
pub mod transcript;
pub mod trim;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::TurnConfig;
use crate::llm::{CompletionRequest, LlmProvider, ProviderError, TokenCounter};

pub use message::{Message, Role};
pub use transcript::Transcript;

/// Key under which hosts that use a key/value context store the
/// termination flag (see [`TurnOutcome::stop_listening_value`]).
pub const STOP_LISTENING_KEY: &str = "StopListening";

const GOODBYE: &str = "goodbye";

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("remote completion failed: {0}")]
    Remote(#[from] ProviderError),
    #[error("turn cancelled")]
    Cancelled,
}

/// Result of one turn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnOutcome {
    /// Assistant reply; empty when the input was blank.
    pub response: String,
    /// The user said goodbye; the host should stop listening.
    pub termination_requested: bool,
}

impl TurnOutcome {
    /// Boolean-as-text form of the termination flag: `"True"` or empty.
    pub fn stop_listening_value(&self) -> &'static str {
        if self.termination_requested { "True" } else { "" }
    }
}

/// `true` when `input` starts with "goodbye", ignoring ASCII case.
pub fn requests_termination(input: &str) -> bool {
    input
        .get(..GOODBYE.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(GOODBYE))
}

pub struct ChatSession {
    config: TurnConfig,
    provider: LlmProvider,
    tokens: TokenCounter,
    transcript: Transcript,
}

impl ChatSession {
    pub fn new(config: TurnConfig, provider: LlmProvider, tokens: TokenCounter) -> Self {
        Self { config, provider, tokens, transcript: Transcript::new() }
    }

    pub fn config(&self) -> &TurnConfig {
        &self.config
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// The untrimmed prompt for the current transcript.
    pub fn render_prompt(&self) -> String {
        chatml::render(&self.config.system_prompt, self.transcript.messages())
    }

    /// Run one conversational turn.
    ///
    /// Blank input returns an empty outcome without touching the transcript
    /// or the provider. On success the planned trim is applied and the
    /// user/assistant pair is appended. On error or cancellation the
    /// transcript is left as it was.
    pub async fn handle_turn(
        &mut self,
        input: &str,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome, ChatError> {
        if input.trim().is_empty() {
            debug!("blank input, skipping turn");
            return Ok(TurnOutcome::default());
        }

        let termination_requested = requests_termination(input);
        if termination_requested {
            info!("termination requested by user");
        }

        let budget = self.config.max_tokens as usize;
        let plan = trim::plan(&self.config.system_prompt, &self.transcript, budget, &self.tokens);
        debug!(
            transcript_len = self.transcript.len(),
            dropped = plan.dropped,
            estimated_tokens = plan.estimated_tokens,
            budget,
            "prompt planned"
        );
        if !plan.within(budget) {
            warn!(
                estimated_tokens = plan.estimated_tokens,
                budget, "prompt still over budget after trimming"
            );
        }

        let dropped = plan.dropped;
        let request = CompletionRequest::new(plan.prompt, &self.config);

        let completion = tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                info!("turn cancelled while awaiting completion");
                return Err(ChatError::Cancelled);
            }

            result = self.provider.complete(&self.config.deployment, &request) => result?,
        };

        if let Some(usage) = completion.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "completion usage"
            );
        }
        let reply = completion.into_first_choice()?;

        self.transcript.drop_after_anchor(dropped);
        self.transcript.record_exchange(input, &reply);

        Ok(TurnOutcome { response: reply, termination_requested })
    }
}
