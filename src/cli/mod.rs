use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Upstream LLM Args ---
    /// API Key for the upstream chat-completion API. Required; the server refuses to start without it.
    #[arg(long, env = "LLM_API_KEY", hide_env_values = true)]
    pub llm_api_key: Option<String>,

    /// Full URL of the upstream chat-completion endpoint.
    #[arg(long, env = "LLM_API_URL", default_value = "https://api.openai.com/v1/chat/completions")]
    pub llm_api_url: String,

    /// Model name sent with every completion request.
    #[arg(long, env = "LLM_MODEL", default_value = "gpt-4o-mini")]
    pub llm_model: String,

    /// Sampling temperature.
    #[arg(long, env = "LLM_TEMPERATURE", default_value = "0.7")]
    pub llm_temperature: f32,

    /// Maximum tokens the upstream may generate per reply.
    #[arg(long, env = "LLM_MAX_TOKENS", default_value = "300")]
    pub llm_max_tokens: u32,

    /// Timeout in seconds for a whole non-streaming exchange, and for the streaming connect + headers.
    #[arg(long, env = "UPSTREAM_TIMEOUT_SECS", default_value = "60")]
    pub upstream_timeout_secs: u64,

    /// Maximum seconds to wait between two chunks of a streamed reply.
    #[arg(long, env = "STREAM_IDLE_TIMEOUT_SECS", default_value = "30")]
    pub stream_idle_timeout_secs: u64,

    /// Delay in milliseconds after each streamed fragment. 0 disables pacing.
    #[arg(long, env = "STREAM_PACE_MS", default_value = "10")]
    pub stream_pace_ms: u64,

    // --- Prompt Args ---
    /// System preamble prepended to every completion request.
    #[arg(long, env = "SYSTEM_PROMPT", default_value = "You are a helpful, emotionally aware assistant.")]
    pub system_prompt: String,

    /// Append the current UTC date and time to the system preamble.
    #[arg(long, env = "PROMPT_TIMESTAMP", default_value = "true", action = clap::ArgAction::Set)]
    pub prompt_timestamp: bool,

    // --- History Args ---
    /// Maximum number of turns kept in the conversation history. Unset or 0 keeps everything.
    #[arg(long, env = "HISTORY_MAX_TURNS")]
    pub history_max_turns: Option<usize>,

    // --- Server Args ---
    /// Host address and port for the HTTP server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:8000")]
    pub server_addr: String,

    /// Optional path to the TLS certificate file (PEM format). Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format). Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["chat-relay", "--llm-api-key", "sk-test"]).unwrap();
        assert_eq!(args.llm_api_key.as_deref(), Some("sk-test"));
        assert_eq!(args.llm_max_tokens, 300);
        assert!(args.prompt_timestamp);
        assert!(!args.enable_tls);
    }

    #[test]
    fn test_timestamp_can_be_disabled() {
        let args = Args::try_parse_from(["chat-relay", "--prompt-timestamp", "false"]).unwrap();
        assert!(!args.prompt_timestamp);
    }
}
