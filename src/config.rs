//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` (or the `-f` path), then applies
//! `CHATML_LOG_LEVEL` and `CHATML_SYSTEM_PROMPT` env overrides.
//! The Azure key is read from `AZURE_OPENAI_API_KEY` only.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::chat::chatml;
use crate::error::AppError;
use crate::logger;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
pub const API_KEY_ENV: &str = "AZURE_OPENAI_API_KEY";

/// Per-turn request parameters. Fixed for the lifetime of a chat session.
#[derive(Debug, Clone)]
pub struct TurnConfig {
    /// Rendered as the `system` block at the top of every prompt.
    pub system_prompt: String,
    /// Prompt token budget for trimming, also sent as the completion limit.
    pub max_tokens: u32,
    pub temperature: f32,
    pub presence_penalty: f32,
    pub frequency_penalty: f32,
    /// Model name carried in the request body.
    pub model: String,
    /// Azure deployment the request is routed to.
    pub deployment: String,
    /// Stop sequence sent with every request; always the ChatML end marker.
    pub stop: String,
}

/// Azure OpenAI endpoint settings (`[llm.azure]`).
#[derive(Debug, Clone)]
pub struct AzureConfig {
    /// Resource base URL, e.g. `https://my-resource.openai.azure.com`.
    pub endpoint: String,
    pub api_version: String,
    /// Per-request HTTP timeout in seconds.
    pub timeout_seconds: u64,
}

/// Offline provider settings (`[llm.dummy]`).
#[derive(Debug, Clone)]
pub struct DummyConfig {
    pub reply: String,
}

/// LLM subsystem configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Active provider (`"azure"` or `"dummy"`), `default` in the TOML.
    pub provider: String,
    /// Token estimator name (`"gpt3"` or `"heuristic"`).
    pub tokenizer: String,
    pub azure: AzureConfig,
    pub dummy: DummyConfig,
}

/// Fully-resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub turn: TurnConfig,
    pub llm: LlmConfig,
    /// From `AZURE_OPENAI_API_KEY`. Never sourced from TOML.
    pub llm_api_key: Option<String>,
}

/// Raw TOML shape — `serde` target before resolution.
#[derive(Deserialize)]
struct RawConfig {
    #[serde(default)]
    general: RawGeneral,
    #[serde(default)]
    llm: RawLlm,
}

#[derive(Deserialize)]
struct RawGeneral {
    #[serde(default = "default_system_prompt")]
    system_prompt: String,
    #[serde(default = "default_log_level")]
    log_level: String,
}

impl Default for RawGeneral {
    fn default() -> Self {
        Self { system_prompt: default_system_prompt(), log_level: default_log_level() }
    }
}

#[derive(Deserialize)]
struct RawLlm {
    #[serde(rename = "default", default = "default_llm_provider")]
    provider: String,
    #[serde(default = "default_tokenizer")]
    tokenizer: String,
    #[serde(default)]
    azure: RawAzure,
    #[serde(default)]
    dummy: RawDummy,
}

impl Default for RawLlm {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            tokenizer: default_tokenizer(),
            azure: RawAzure::default(),
            dummy: RawDummy::default(),
        }
    }
}

#[derive(Deserialize)]
struct RawAzure {
    #[serde(default)]
    endpoint: String,
    #[serde(default)]
    deployment: String,
    #[serde(default = "default_model")]
    model: String,
    #[serde(default = "default_api_version")]
    api_version: String,
    #[serde(default = "default_max_tokens")]
    max_tokens: u32,
    #[serde(default = "default_temperature")]
    temperature: f32,
    #[serde(default)]
    presence_penalty: f32,
    #[serde(default)]
    frequency_penalty: f32,
    #[serde(default = "default_timeout_seconds")]
    timeout_seconds: u64,
}

impl Default for RawAzure {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            deployment: String::new(),
            model: default_model(),
            api_version: default_api_version(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            presence_penalty: 0.0,
            frequency_penalty: 0.0,
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

#[derive(Deserialize)]
struct RawDummy {
    #[serde(default = "default_dummy_reply")]
    reply: String,
}

impl Default for RawDummy {
    fn default() -> Self {
        Self { reply: default_dummy_reply() }
    }
}

fn default_system_prompt() -> String {
    "You are a friendly, helpful assistant. Keep answers short.".to_string()
}
fn default_log_level() -> String { "info".to_string() }
fn default_llm_provider() -> String { "dummy".to_string() }
fn default_tokenizer() -> String { "gpt3".to_string() }
fn default_model() -> String { "gpt-35-turbo".to_string() }
fn default_api_version() -> String { "2022-12-01".to_string() }
fn default_max_tokens() -> u32 { 1500 }
fn default_temperature() -> f32 { 0.7 }
fn default_timeout_seconds() -> u64 { 60 }
fn default_dummy_reply() -> String { "[dummy] no provider configured".to_string() }

/// Load config from `path` (or `config/default.toml`), then apply env overrides.
pub fn load(path: Option<&str>) -> Result<Config, AppError> {
    let path = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_PATH));
    let log_level_override = env::var("CHATML_LOG_LEVEL").ok();
    let system_prompt_override = env::var("CHATML_SYSTEM_PROMPT").ok();
    let mut config = load_from(
        &path,
        log_level_override.as_deref(),
        system_prompt_override.as_deref(),
    )?;
    config.llm_api_key = env::var(API_KEY_ENV).ok().filter(|k| !k.trim().is_empty());
    Ok(config)
}

/// Internal loader — accepts an explicit path and optional overrides.
/// Tests pass overrides directly instead of mutating env vars.
pub fn load_from(
    path: &Path,
    log_level_override: Option<&str>,
    system_prompt_override: Option<&str>,
) -> Result<Config, AppError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;

    let parsed: RawConfig = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

    resolve(parsed, log_level_override, system_prompt_override)
}

fn resolve(
    parsed: RawConfig,
    log_level_override: Option<&str>,
    system_prompt_override: Option<&str>,
) -> Result<Config, AppError> {
    let g = parsed.general;
    let a = parsed.llm.azure;

    if a.max_tokens == 0 {
        return Err(AppError::Config("llm.azure.max_tokens must be greater than zero".into()));
    }
    let wants_azure = matches!(parsed.llm.provider.as_str(), "azure" | "azure-openai");
    if wants_azure && (a.endpoint.is_empty() || a.deployment.is_empty()) {
        return Err(AppError::Config(
            "llm.azure.endpoint and llm.azure.deployment are required for the azure provider".into(),
        ));
    }

    let log_level = log_level_override.unwrap_or(&g.log_level).to_string();
    logger::parse_level(&log_level)
        .map_err(|e| AppError::Config(format!("general.log_level: {e}")))?;

    Ok(Config {
        log_level,
        turn: TurnConfig {
            system_prompt: system_prompt_override.unwrap_or(&g.system_prompt).to_string(),
            max_tokens: a.max_tokens,
            temperature: a.temperature,
            presence_penalty: a.presence_penalty,
            frequency_penalty: a.frequency_penalty,
            model: a.model,
            deployment: a.deployment,
            stop: chatml::STOP_SEQUENCE.to_string(),
        },
        llm: LlmConfig {
            provider: parsed.llm.provider,
            tokenizer: parsed.llm.tokenizer,
            azure: AzureConfig {
                endpoint: a.endpoint,
                api_version: a.api_version,
                timeout_seconds: a.timeout_seconds,
            },
            dummy: DummyConfig { reply: parsed.llm.dummy.reply },
        },
        llm_api_key: None,
    })
}

// ── test helpers ──────────────────────────────────────────────────────────────

/// Safe `Config` for unit tests — dummy LLM, heuristic tokenizer, no API keys.
#[cfg(test)]
impl Config {
    pub fn test_default() -> Self {
        Self {
            log_level: "info".into(),
            turn: TurnConfig {
                system_prompt: "You are helpful.".into(),
                max_tokens: 1500,
                temperature: 0.0,
                presence_penalty: 0.0,
                frequency_penalty: 0.0,
                model: "test-model".into(),
                deployment: "test-deployment".into(),
                stop: chatml::STOP_SEQUENCE.to_string(),
            },
            llm: LlmConfig {
                provider: "dummy".into(),
                tokenizer: "heuristic".into(),
                azure: AzureConfig {
                    endpoint: "http://localhost:0".into(),
                    api_version: default_api_version(),
                    timeout_seconds: 1,
                },
                dummy: DummyConfig { reply: "Hi there".into() },
            },
            llm_api_key: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const AZURE_TOML: &str = r#"
[general]
system_prompt = "You are a speaker."
log_level = "debug"

[llm]
default = "azure"

[llm.azure]
endpoint = "https://example.openai.azure.com"
deployment = "chat"
model = "gpt-35-turbo"
max_tokens = 800
temperature = 0.5
presence_penalty = 0.1
frequency_penalty = 0.2
"#;

    fn write_toml(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn parse_azure_config() {
        let f = write_toml(AZURE_TOML);
        let cfg = load_from(f.path(), None, None).unwrap();
        assert_eq!(cfg.llm.provider, "azure");
        assert_eq!(cfg.llm.azure.endpoint, "https://example.openai.azure.com");
        assert_eq!(cfg.llm.azure.api_version, "2022-12-01");
        assert_eq!(cfg.turn.deployment, "chat");
        assert_eq!(cfg.turn.max_tokens, 800);
        assert_eq!(cfg.turn.system_prompt, "You are a speaker.");
        assert!((cfg.turn.frequency_penalty - 0.2).abs() < f32::EPSILON);
        assert!(cfg.llm_api_key.is_none());
    }

    #[test]
    fn empty_file_uses_defaults() {
        let f = write_toml("");
        let cfg = load_from(f.path(), None, None).unwrap();
        assert_eq!(cfg.llm.provider, "dummy");
        assert_eq!(cfg.llm.tokenizer, "gpt3");
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.turn.max_tokens, 1500);
    }

    #[test]
    fn azure_without_endpoint_errors() {
        let f = write_toml("[llm]\ndefault = \"azure\"\n");
        let err = load_from(f.path(), None, None).unwrap_err();
        assert!(err.to_string().contains("llm.azure.endpoint"));
    }

    #[test]
    fn zero_max_tokens_errors() {
        let f = write_toml("[llm.azure]\nmax_tokens = 0\n");
        assert!(load_from(f.path(), None, None).is_err());
    }

    #[test]
    fn missing_file_errors() {
        let result = load_from(Path::new("/nonexistent/config.toml"), None, None);
        let msg = result.unwrap_err().to_string();
        assert!(msg.contains("config error"));
    }

    #[test]
    fn malformed_toml_errors() {
        let f = write_toml("[general\nsystem_prompt = 1");
        let msg = load_from(f.path(), None, None).unwrap_err().to_string();
        assert!(msg.contains("parse error"));
    }

    #[test]
    fn env_overrides_apply() {
        let f = write_toml(AZURE_TOML);
        let cfg = load_from(f.path(), Some("trace"), Some("Be terse.")).unwrap();
        assert_eq!(cfg.log_level, "trace");
        assert_eq!(cfg.turn.system_prompt, "Be terse.");
    }

    #[test]
    fn unknown_log_level_errors() {
        let f = write_toml("[general]\nlog_level = \"verbose\"\n");
        let err = load_from(f.path(), None, None).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
        assert!(err.to_string().contains("general.log_level"));
    }

    #[test]
    fn unknown_log_level_override_errors() {
        let f = write_toml(AZURE_TOML);
        let err = load_from(f.path(), Some("loud"), None).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn stop_sequence_is_chatml_end_marker() {
        let f = write_toml("");
        let cfg = load_from(f.path(), None, None).unwrap();
        assert_eq!(cfg.turn.stop, "<|im_end|>");
    }
}
