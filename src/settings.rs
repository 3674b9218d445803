use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "openai/gpt-oss-20b";
pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const API_KEY_VARS: [&str; 2] = ["GROQ_API_KEY", "OPENAI_API_KEY"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TokenLimits {
    pub greeting: Option<u32>,
    pub chat: Option<u32>,
    pub summary: Option<u32>,
}

/// Settings as they appear in the optional JSON settings file. Every field is
/// optional; missing ones fall through to the built-in defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct FileSettings {
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub max_user_messages: Option<u32>,
    pub max_message_chars: Option<usize>,
    pub token_limits: Option<TokenLimits>,
    pub pacing_ms: Option<u64>,
    pub session_ttl_secs: Option<u64>,
    pub sweep_interval_secs: Option<u64>,
}

impl FileSettings {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let parsed = serde_json::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("invalid settings file {}: {}", path.display(), e))?;
        Ok(parsed)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliOverrides {
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub pacing_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveSettings {
    pub model: String,
    pub base_url: String,
    pub max_user_messages: u32,
    pub max_message_chars: usize,
    pub greeting_max_tokens: Option<u32>,
    pub chat_max_tokens: Option<u32>,
    pub summary_max_tokens: Option<u32>,
    pub pacing: Duration,
    pub session_ttl: Duration,
    pub sweep_interval: Duration,
}

impl Default for EffectiveSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.into(),
            base_url: DEFAULT_BASE_URL.into(),
            max_user_messages: 6,
            max_message_chars: 300,
            greeting_max_tokens: Some(300),
            chat_max_tokens: Some(5000),
            summary_max_tokens: None,
            pacing: Duration::from_millis(20),
            session_ttl: Duration::from_secs(30 * 60),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

pub fn resolve_effective_settings(
    file: &FileSettings,
    cli: &CliOverrides,
) -> anyhow::Result<EffectiveSettings> {
    let defaults = EffectiveSettings::default();

    let model = cli
        .model
        .clone()
        .or_else(|| file.model.clone())
        .unwrap_or(defaults.model);

    let base_url = cli
        .base_url
        .clone()
        .or_else(|| file.base_url.clone())
        .unwrap_or(defaults.base_url);
    let parsed = url::Url::parse(&base_url)?;
    if !matches!(parsed.scheme(), "http" | "https") {
        anyhow::bail!("unsupported base url scheme: {}", parsed.scheme());
    }

    let limits = file.token_limits.clone().unwrap_or_default();
    let max_user_messages = file.max_user_messages.unwrap_or(defaults.max_user_messages);
    if max_user_messages == 0 {
        anyhow::bail!("max_user_messages must be at least 1");
    }

    let pacing = cli
        .pacing_ms
        .or(file.pacing_ms)
        .map(Duration::from_millis)
        .unwrap_or(defaults.pacing);

    Ok(EffectiveSettings {
        model,
        base_url: base_url.trim_end_matches('/').to_string(),
        max_user_messages,
        max_message_chars: file.max_message_chars.unwrap_or(defaults.max_message_chars),
        greeting_max_tokens: limits.greeting.or(defaults.greeting_max_tokens),
        chat_max_tokens: limits.chat.or(defaults.chat_max_tokens),
        summary_max_tokens: limits.summary.or(defaults.summary_max_tokens),
        pacing,
        session_ttl: file.session_ttl_secs.map(Duration::from_secs).unwrap_or(defaults.session_ttl),
        sweep_interval: file
            .sweep_interval_secs
            .map(Duration::from_secs)
            .unwrap_or(defaults.sweep_interval),
    })
}

/// Looks up the completion API credential, first match wins.
pub fn api_key_from_env() -> anyhow::Result<String> {
    API_KEY_VARS
        .iter()
        .find_map(|var| std::env::var(var).ok().filter(|v| !v.trim().is_empty()))
        .ok_or_else(|| anyhow::anyhow!("missing API key: set {}", API_KEY_VARS.join(" or ")))
}
