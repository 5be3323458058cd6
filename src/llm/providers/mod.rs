//! LLM provider implementations.
//!
//! `build(config, api_key)` is the factory — called at startup.
//! Adding a new backend = new module + new match arm.

pub mod azure_openai;
pub mod dummy;

use crate::config::{API_KEY_ENV, LlmConfig};
use crate::llm::{LlmProvider, ProviderError};

/// Construct a `LlmProvider` from config and an optional API key.
///
/// `api_key` is sourced from `AZURE_OPENAI_API_KEY` (never TOML) and is only
/// required by the Azure backend.
pub fn build(config: &LlmConfig, api_key: Option<String>) -> Result<LlmProvider, ProviderError> {
    match config.provider.as_str() {
        "dummy" => Ok(LlmProvider::Dummy(dummy::DummyProvider::new(config.dummy.reply.clone()))),
        "azure" | "azure-openai" => {
            let key = api_key.ok_or(ProviderError::MissingApiKey(API_KEY_ENV))?;
            let az = &config.azure;
            let p = azure_openai::AzureOpenAiProvider::new(
                az.endpoint.clone(),
                az.api_version.clone(),
                az.timeout_seconds,
                key,
            )?;
            Ok(LlmProvider::Azure(p))
        }
        _ => Err(ProviderError::UnknownProvider(config.provider.clone())),
    }
}
