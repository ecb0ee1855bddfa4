use std::{path::PathBuf, str::FromStr, time::Duration};

use anyhow::{Context, Result};

pub const API_KEY_VAR: &str = "GEMINI_API_KEY";
const LEGACY_API_KEY_VAR: &str = "API_KEY";

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Extra attempts after the first one; 0 means a single attempt.
    pub max_retries: u32,
    pub backoff: Duration,
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub settings_path: PathBuf,
    pub gemini: GeminiConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. A missing API key is not an
    /// error here; it surfaces when a generation is attempted.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_key = lookup(API_KEY_VAR)
            .or_else(|| lookup(LEGACY_API_KEY_VAR))
            .filter(|k| !k.trim().is_empty());

        Ok(Self {
            port: parse_or(&lookup, "PORT", 8080)?,
            settings_path: lookup("SETTINGS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("sequencer_settings.json")),
            gemini: GeminiConfig {
                api_key,
                base_url: lookup("GEMINI_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
                model: lookup("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                timeout: Duration::from_secs(parse_or(&lookup, "GENERATION_TIMEOUT_SECS", 60)?),
                retry: RetryPolicy {
                    max_retries: parse_or(&lookup, "GENERATION_MAX_RETRIES", 0)?,
                    backoff: Duration::from_millis(parse_or(&lookup, "GENERATION_RETRY_BACKOFF_MS", 500)?),
                },
            },
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().with_context(|| format!("invalid value for {key}: {raw:?}")),
        None => Ok(default),
    }
}
