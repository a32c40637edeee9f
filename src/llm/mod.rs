pub mod chat;

use std::time::Duration;

use crate::cli::Args;
use crate::error::{ RelayError, Result };

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub api_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub request_timeout: Duration,
    pub stream_idle_timeout: Duration,
    pub stream_pace: Duration,
}

impl LlmConfig {
    pub fn new(api_key: impl Into<String>, api_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_url: api_url.into(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            max_tokens: Some(300),
            request_timeout: Duration::from_secs(60),
            stream_idle_timeout: Duration::from_secs(30),
            stream_pace: Duration::from_millis(10),
        }
    }

    /// Fails with `RelayError::Configuration` when the credential is absent or blank.
    pub fn from_args(args: &Args) -> Result<Self> {
        let api_key = args.llm_api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                RelayError::Configuration(
                    "LLM_API_KEY environment variable is not set.".to_string()
                )
            })?;

        if args.llm_api_url.trim().is_empty() {
            return Err(RelayError::Configuration("LLM_API_URL must not be empty".to_string()));
        }
        if args.upstream_timeout_secs == 0 || args.stream_idle_timeout_secs == 0 {
            return Err(RelayError::Configuration("Upstream timeouts must be positive".to_string()));
        }

        Ok(Self {
            api_key: api_key.to_string(),
            api_url: args.llm_api_url.clone(),
            model: args.llm_model.clone(),
            temperature: args.llm_temperature,
            max_tokens: Some(args.llm_max_tokens).filter(|n| *n > 0),
            request_timeout: Duration::from_secs(args.upstream_timeout_secs),
            stream_idle_timeout: Duration::from_secs(args.stream_idle_timeout_secs),
            stream_pace: Duration::from_millis(args.stream_pace_ms),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn args() -> Args {
        Args::try_parse_from(["chat-relay", "--llm-api-key", "sk-test"]).unwrap()
    }

    #[test]
    fn test_from_args() {
        let config = LlmConfig::from_args(&args()).unwrap();
        assert_eq!(config.api_key, "sk-test");
        assert_eq!(config.max_tokens, Some(300));
        assert_eq!(config.stream_pace, Duration::from_millis(10));
    }

    #[test]
    fn test_missing_key_is_configuration_error() {
        let mut args = args();
        args.llm_api_key = None;
        assert!(matches!(LlmConfig::from_args(&args), Err(RelayError::Configuration(_))));
    }

    #[test]
    fn test_blank_key_is_configuration_error() {
        let mut args = args();
        args.llm_api_key = Some("   ".to_string());
        assert!(matches!(LlmConfig::from_args(&args), Err(RelayError::Configuration(_))));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut args = args();
        args.stream_idle_timeout_secs = 0;
        assert!(LlmConfig::from_args(&args).is_err());
    }
}
