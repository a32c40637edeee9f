use futures::StreamExt;
use log::{ info, warn, error };
use std::sync::Arc;

use crate::cli::Args;
use crate::config::prompt::PromptConfig;
use crate::error::{ RelayError, Result };
use crate::history::ConversationStore;
use crate::llm::chat::{ create_streaming_response, new_client as new_chat_client, ChatClient, FragmentStream };
use crate::llm::LlmConfig;
use crate::models::chat::Turn;

/// Ties the conversation history to the upstream chat client.
///
/// Every call appends the user turn before going upstream and the assistant turn only once a
/// complete reply exists. Failed or abandoned calls leave the user turn in place and nothing else.
#[derive(Clone)]
pub struct Relay {
    chat_client: Arc<dyn ChatClient>,
    history: ConversationStore,
    prompt_config: Arc<PromptConfig>,
}

impl Relay {
    pub fn new(
        chat_client: Arc<dyn ChatClient>,
        history: ConversationStore,
        prompt_config: PromptConfig
    ) -> Self {
        Self {
            chat_client,
            history,
            prompt_config: Arc::new(prompt_config),
        }
    }

    pub fn from_args(args: &Args, history: ConversationStore) -> Result<Self> {
        let llm_config = LlmConfig::from_args(args)?;
        let chat_client = new_chat_client(&llm_config)?;
        info!(
            "Chat client configured: Model={}, URL={}, Temperature={}, MaxTokens={:?}",
            llm_config.model,
            llm_config.api_url,
            llm_config.temperature,
            llm_config.max_tokens
        );
        Ok(Self::new(chat_client, history, PromptConfig::from_args(args)))
    }

    pub fn history(&self) -> &ConversationStore {
        &self.history
    }

    /// Preamble + the history as it was before this call + the new user turn.
    fn build_messages(&self, prior: Vec<Turn>, user_text: &str) -> Vec<Turn> {
        let mut messages = Vec::with_capacity(prior.len() + 2);
        messages.push(self.prompt_config.preamble());
        messages.extend(prior);
        messages.push(Turn::user(user_text));
        messages
    }

    /// Snapshots the history, then records the user turn.
    async fn begin_turn(&self, user_text: &str) -> Vec<Turn> {
        let prior = self.history.snapshot().await;
        self.history.append(Turn::user(user_text)).await;
        self.build_messages(prior, user_text)
    }

    pub async fn reply(&self, user_text: &str) -> Result<String> {
        let messages = self.begin_turn(user_text).await;

        match self.chat_client.complete(&messages).await {
            Ok(reply) => {
                self.history.append(Turn::assistant(reply.clone())).await;
                Ok(reply)
            }
            Err(e) => {
                error!("Completion failed, no assistant turn recorded: {}", e);
                Err(e)
            }
        }
    }

    /// Streams the reply fragment by fragment.
    ///
    /// The assistant turn is appended only when the upstream stream reaches its terminator.
    /// If the upstream fails midway, or the returned stream is dropped early, nothing is appended
    /// and the upstream connection is released.
    pub async fn reply_stream(&self, user_text: &str) -> Result<FragmentStream> {
        let messages = self.begin_turn(user_text).await;

        let mut upstream = match self.chat_client.stream_completion(&messages).await {
            Ok(stream) => stream,
            Err(e) => {
                error!("Failed to open completion stream: {}", e);
                return Err(e);
            }
        };

        let history = self.history.clone();
        Ok(
            create_streaming_response(move |tx| async move {
                let mut assembled = String::new();

                loop {
                    let item = tokio::select! {
                        _ = tx.closed() => {
                            warn!(
                                "Client left while waiting on upstream after {} chars; reply not recorded",
                                assembled.len()
                            );
                            return;
                        }
                        item = upstream.next() => item,
                    };

                    match item {
                        None => break,
                        Some(Ok(fragment)) => {
                            assembled.push_str(&fragment);
                            if tx.send(Ok(fragment)).await.is_err() {
                                warn!(
                                    "Client left mid-stream after {} chars; reply not recorded",
                                    assembled.len()
                                );
                                return;
                            }
                        }
                        Some(Err(e)) => {
                            warn!("Stream interrupted, reply not recorded: {}", e);
                            let _ = tx.send(Err(e)).await;
                            return;
                        }
                    }
                }

                info!("Stream complete ({} chars)", assembled.len());
                history.append(Turn::assistant(assembled)).await;
            })
        )
    }
}

impl std::fmt::Debug for Relay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Relay")
            .field("model", &self.chat_client.model())
            .field("history", &self.history)
            .finish()
    }
}

/// Checks the inbound `text` field. Runs before anything touches the history.
pub fn validate_text(text: Option<String>) -> Result<String> {
    match text {
        Some(t) if !t.trim().is_empty() => Ok(t),
        Some(_) => Err(RelayError::Validation("`text` must not be empty".to_string())),
        None => Err(RelayError::Validation("missing required field `text`".to_string())),
    }
}
