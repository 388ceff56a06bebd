//! Configuration loading for Sagecord.
//!
//! Everything comes from the process environment (optionally seeded from a
//! `.env` file in the working directory). Required values are only checked
//! for presence: a missing key becomes an empty string and surfaces later as
//! a failure from whichever client needed it.

use std::collections::HashMap;
use std::str::FromStr;

/// Location tag stamped into every prepared query.
pub const DEFAULT_LOCATION_TAG: &str = "Kyoto";
/// Hard cap on reasoning iterations per message.
pub const DEFAULT_MAX_ITERATIONS: u32 = 5;
/// Completion budget per model call.
pub const DEFAULT_MAX_TOKENS: u32 = 1024;
/// Results requested per web search.
pub const DEFAULT_SEARCH_RESULTS: u8 = 10;
/// Sampling temperature for the model.
pub const DEFAULT_TEMPERATURE: f32 = 0.0;
/// Maximum characters per outgoing chat message.
pub const DEFAULT_CHUNK_LIMIT: usize = 1900;
/// Reaction placed on every handled message.
pub const DEFAULT_ACK_EMOJI: &str = "💬";

/// The root configuration structure.
#[derive(Clone)]
pub struct AppConfig {
    /// Custom Search JSON API key (`GOOGLE_API_KEY`)
    pub google_api_key: String,

    /// Programmable Search Engine ID (`GOOGLE_CSE_ID`)
    pub google_cse_id: String,

    /// Vertex AI model ID (`CLAUDE_MODEL`)
    pub claude_model: String,

    /// Google Cloud project (`GOOGLE_PROJECT`)
    pub google_project: String,

    /// Google Cloud region (`GOOGLE_LOCATION`)
    pub google_location: String,

    /// Discord bot token (`DISCORD_BOT_TOKEN`)
    pub discord_bot_token: String,

    /// OAuth access token for Vertex AI (`GOOGLE_ACCESS_TOKEN`).
    /// When unset the `gcloud` CLI is asked for one.
    pub google_access_token: Option<String>,

    /// Location tag for prepared queries (`SAGECORD_LOCATION_TAG`)
    pub location_tag: String,

    /// Reasoning iteration cap (`SAGECORD_MAX_ITERATIONS`)
    pub max_iterations: u32,

    /// Completion budget per model call (`SAGECORD_MAX_TOKENS`)
    pub max_tokens: u32,

    /// Results per web search, 1 to 10 (`SAGECORD_SEARCH_RESULTS`)
    pub search_results: u8,

    /// Sampling temperature
    pub temperature: f32,

    /// Outgoing message size limit
    pub chunk_limit: usize,

    /// Acknowledgement reaction
    pub ack_emoji: String,
}

/// Redact a secret string for Debug output.
fn redact(s: &str) -> &'static str {
    if s.is_empty() { "<unset>" } else { "[REDACTED]" }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("google_api_key", &redact(&self.google_api_key))
            .field("google_cse_id", &self.google_cse_id)
            .field("claude_model", &self.claude_model)
            .field("google_project", &self.google_project)
            .field("google_location", &self.google_location)
            .field("discord_bot_token", &redact(&self.discord_bot_token))
            .field(
                "google_access_token",
                &self.google_access_token.as_deref().map(redact),
            )
            .field("location_tag", &self.location_tag)
            .field("max_iterations", &self.max_iterations)
            .field("max_tokens", &self.max_tokens)
            .field("search_results", &self.search_results)
            .field("temperature", &self.temperature)
            .field("chunk_limit", &self.chunk_limit)
            .field("ack_emoji", &self.ack_emoji)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the process environment.
    ///
    /// A `.env` file in the working directory is applied first; variables
    /// already set in the environment take precedence over it.
    pub fn from_env() -> Result<Self, ConfigError> {
        match dotenv::dotenv() {
            Ok(path) => tracing::info!(path = %path.display(), "Loaded .env file"),
            Err(e) if e.not_found() => tracing::debug!("No .env file found"),
            Err(e) => tracing::warn!("Ignoring unreadable .env file: {e}"),
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            let value = lookup(key).unwrap_or_default();
            if value.is_empty() {
                tracing::warn!(key, "Environment variable is not set");
            }
            value
        };

        let config = Self {
            google_api_key: required("GOOGLE_API_KEY"),
            google_cse_id: required("GOOGLE_CSE_ID"),
            claude_model: required("CLAUDE_MODEL"),
            google_project: required("GOOGLE_PROJECT"),
            google_location: required("GOOGLE_LOCATION"),
            discord_bot_token: required("DISCORD_BOT_TOKEN"),
            google_access_token: lookup("GOOGLE_ACCESS_TOKEN").filter(|t| !t.is_empty()),
            location_tag: lookup("SAGECORD_LOCATION_TAG")
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| DEFAULT_LOCATION_TAG.into()),
            max_iterations: parse_override(&lookup, "SAGECORD_MAX_ITERATIONS")?
                .unwrap_or(DEFAULT_MAX_ITERATIONS),
            max_tokens: parse_override(&lookup, "SAGECORD_MAX_TOKENS")?
                .unwrap_or(DEFAULT_MAX_TOKENS),
            search_results: parse_override(&lookup, "SAGECORD_SEARCH_RESULTS")?
                .unwrap_or(DEFAULT_SEARCH_RESULTS),
            ..Self::default()
        };

        if config.max_iterations == 0 {
            return Err(ConfigError::Invalid {
                key: "SAGECORD_MAX_ITERATIONS".into(),
                reason: "must be at least 1".into(),
            });
        }
        if config.max_tokens == 0 {
            return Err(ConfigError::Invalid {
                key: "SAGECORD_MAX_TOKENS".into(),
                reason: "must be at least 1".into(),
            });
        }
        if !(1..=10).contains(&config.search_results) {
            return Err(ConfigError::Invalid {
                key: "SAGECORD_SEARCH_RESULTS".into(),
                reason: "must be between 1 and 10".into(),
            });
        }

        Ok(config)
    }
}

fn parse_override<F, T>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::Invalid {
                key: key.into(),
                reason: e.to_string(),
            }),
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            google_api_key: String::new(),
            google_cse_id: String::new(),
            claude_model: String::new(),
            google_project: String::new(),
            google_location: String::new(),
            discord_bot_token: String::new(),
            google_access_token: None,
            location_tag: DEFAULT_LOCATION_TAG.into(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            max_tokens: DEFAULT_MAX_TOKENS,
            search_results: DEFAULT_SEARCH_RESULTS,
            temperature: DEFAULT_TEMPERATURE,
            chunk_limit: DEFAULT_CHUNK_LIMIT,
            ack_emoji: DEFAULT_ACK_EMOJI.into(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },
}

/// Build a lookup over a fixed map (handy for tests and embedding).
pub fn map_lookup(vars: HashMap<String, String>) -> impl Fn(&str) -> Option<String> {
    move |key| vars.get(key).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn reads_all_named_variables() {
        let config = AppConfig::from_lookup(map_lookup(vars(&[
            ("GOOGLE_API_KEY", "key"),
            ("GOOGLE_CSE_ID", "cse"),
            ("CLAUDE_MODEL", "claude-3-5-sonnet-v2@20241022"),
            ("GOOGLE_PROJECT", "proj"),
            ("GOOGLE_LOCATION", "us-east5"),
            ("DISCORD_BOT_TOKEN", "discord"),
        ])))
        .unwrap();

        assert_eq!(config.google_api_key, "key");
        assert_eq!(config.google_cse_id, "cse");
        assert_eq!(config.claude_model, "claude-3-5-sonnet-v2@20241022");
        assert_eq!(config.google_project, "proj");
        assert_eq!(config.google_location, "us-east5");
        assert_eq!(config.discord_bot_token, "discord");
        assert!(config.google_access_token.is_none());
    }

    #[test]
    fn missing_variables_are_not_an_error() {
        let config = AppConfig::from_lookup(|_| None).unwrap();
        assert!(config.claude_model.is_empty());
        assert!(config.discord_bot_token.is_empty());
        assert_eq!(config.location_tag, "Kyoto");
        assert_eq!(config.max_iterations, 5);
        assert_eq!(config.max_tokens, 1024);
        assert_eq!(config.search_results, 10);
        assert_eq!(config.chunk_limit, 1900);
        assert_eq!(config.ack_emoji, "💬");
        assert!(config.temperature.abs() < f32::EPSILON);
    }

    #[test]
    fn optional_overrides_apply() {
        let config = AppConfig::from_lookup(map_lookup(vars(&[
            ("SAGECORD_LOCATION_TAG", "Osaka"),
            ("SAGECORD_MAX_ITERATIONS", " 3 "),
            ("SAGECORD_MAX_TOKENS", "512"),
            ("SAGECORD_SEARCH_RESULTS", "4"),
            ("GOOGLE_ACCESS_TOKEN", "ya29.token"),
        ])))
        .unwrap();
        assert_eq!(config.location_tag, "Osaka");
        assert_eq!(config.max_iterations, 3);
        assert_eq!(config.max_tokens, 512);
        assert_eq!(config.search_results, 4);
        assert_eq!(config.google_access_token.as_deref(), Some("ya29.token"));
    }

    #[test]
    fn malformed_override_rejected() {
        let err = AppConfig::from_lookup(map_lookup(vars(&[(
            "SAGECORD_MAX_ITERATIONS",
            "five",
        )])))
        .unwrap_err();
        assert!(err.to_string().contains("SAGECORD_MAX_ITERATIONS"));

        let err = AppConfig::from_lookup(map_lookup(vars(&[("SAGECORD_MAX_ITERATIONS", "0")])))
            .unwrap_err();
        assert!(err.to_string().contains("at least 1"));
    }

    #[test]
    fn out_of_range_budgets_rejected() {
        let err = AppConfig::from_lookup(map_lookup(vars(&[("SAGECORD_MAX_TOKENS", "0")])))
            .unwrap_err();
        assert!(err.to_string().contains("SAGECORD_MAX_TOKENS"));

        for raw in ["0", "11", "300"] {
            let err = AppConfig::from_lookup(map_lookup(vars(&[("SAGECORD_SEARCH_RESULTS", raw)])))
                .unwrap_err();
            assert!(err.to_string().contains("SAGECORD_SEARCH_RESULTS"), "{raw}: {err}");
        }
    }

    #[test]
    fn debug_redacts_secrets() {
        let config = AppConfig {
            google_api_key: "super-secret-key".into(),
            discord_bot_token: "super-secret-token".into(),
            google_access_token: Some("ya29.secret".into()),
            ..AppConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
        assert!(!debug.contains("ya29"));
        assert!(debug.contains("[REDACTED]"));
    }
}
