pub mod cli;
pub mod config;
pub mod error;
pub mod history;
pub mod llm;
pub mod models;
pub mod relay;
pub mod sentiment;
pub mod server;

use cli::Args;
use error::Result;
use history::ConversationStore;
use log::info;
use relay::Relay;
use server::Server;

/// Validates configuration, then serves until shutdown.
///
/// A missing credential fails here, before the listener is bound.
pub async fn run(args: Args) -> Result<()> {
    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("LLM API URL: {}", args.llm_api_url);
    info!("LLM Model: {}", args.llm_model);
    info!("LLM API Key: {}", if args.llm_api_key.is_some() { "set" } else { "NOT SET" });
    info!("Upstream Timeout: {}s", args.upstream_timeout_secs);
    info!("Stream Idle Timeout: {}s", args.stream_idle_timeout_secs);
    info!("Stream Pace: {}ms", args.stream_pace_ms);
    info!("Prompt Timestamp: {}", args.prompt_timestamp);
    info!("TLS Enabled: {}", args.enable_tls);
    info!("-------------------------");

    let relay = build_relay(&args)?;
    info!("Starting server on: {}", args.server_addr);
    let server = Server::new(args.server_addr.clone(), relay, args.clone());
    server.run().await
}

pub fn build_relay(args: &Args) -> Result<Relay> {
    let history = ConversationStore::from_args(args);
    Relay::from_args(args, history)
}
