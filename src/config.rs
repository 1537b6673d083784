//! Client configuration from the environment

use crate::api::SessionConfig;
use crate::controller::ControllerSettings;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://probe-api.sangonomiya.icu";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_TEMPERATURE: f64 = 0.2;
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful research assistant. When needed, browse using the search tool and cite links inline with proper formatting.";
pub const DEFAULT_HISTORY_LIMIT: usize = 50;
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Base URL of the research service
    pub api_url: String,
    pub model_name: String,
    pub temperature: f64,
    /// System prompt for sessions this client creates
    pub system_prompt: String,
    /// Messages fetched when a session is opened
    pub history_limit: usize,
    /// Per-request timeout, streamed replies included
    pub request_timeout: Duration,
    /// Send drafts over the streaming endpoint
    pub stream_replies: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            model_name: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            history_limit: DEFAULT_HISTORY_LIMIT,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            stream_replies: false,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset or unparseable values keep defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let text = |key: &str, default: String| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(default)
        };

        let temperature = parsed(&lookup, "DEEP_PROBE_TEMPERATURE", defaults.temperature);
        let temperature = if (0.0..=2.0).contains(&temperature) {
            temperature
        } else {
            tracing::warn!(
                value = temperature,
                default = defaults.temperature,
                "DEEP_PROBE_TEMPERATURE out of range, using default"
            );
            defaults.temperature
        };

        let history_limit = match parsed(&lookup, "DEEP_PROBE_HISTORY_LIMIT", defaults.history_limit) {
            0 => {
                tracing::warn!("DEEP_PROBE_HISTORY_LIMIT must be positive, using default");
                defaults.history_limit
            }
            n => n,
        };

        let timeout_secs = match parsed(&lookup, "DEEP_PROBE_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS) {
            0 => {
                tracing::warn!("DEEP_PROBE_TIMEOUT_SECS must be positive, using default");
                DEFAULT_TIMEOUT_SECS
            }
            n => n,
        };

        Self {
            api_url: text("DEEP_PROBE_API_URL", defaults.api_url)
                .trim_end_matches('/')
                .to_string(),
            model_name: text("DEEP_PROBE_MODEL", defaults.model_name),
            temperature,
            system_prompt: text("DEEP_PROBE_SYSTEM_PROMPT", defaults.system_prompt),
            history_limit,
            request_timeout: Duration::from_secs(timeout_secs),
            stream_replies: lookup("DEEP_PROBE_STREAM").is_some_and(|v| is_truthy(&v)),
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            model_name: self.model_name.clone(),
            temperature: self.temperature,
            system_prompt: self.system_prompt.clone(),
        }
    }

    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            session: self.session_config(),
            history_limit: self.history_limit,
            stream_replies: self.stream_replies,
        }
    }
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Display,
{
    let Some(raw) = lookup(key) else {
        return default;
    };
    raw.trim().parse().unwrap_or_else(|_| {
        tracing::warn!(key, value = %raw, %default, "Invalid configuration value, using default");
        default
    })
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
