//! Dummy LLM provider — answers every request with a fixed reply.
//! Used to exercise the full turn without a real API key.

use tracing::debug;

use crate::llm::{Completion, CompletionRequest, ProviderError};

#[derive(Debug, Clone)]
pub struct DummyProvider {
    reply: String,
}

impl DummyProvider {
    pub fn new(reply: impl Into<String>) -> Self {
        Self { reply: reply.into() }
    }

    pub async fn complete(
        &self,
        deployment: &str,
        request: &CompletionRequest,
    ) -> Result<Completion, ProviderError> {
        debug!(%deployment, prompts = request.prompt.len(), "dummy completion");
        Ok(Completion { choices: vec![self.reply.clone()], usage: None })
    }
}
