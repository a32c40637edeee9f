pub mod frame;
pub mod openai;

use async_trait::async_trait;
use futures::{ Future, Stream };
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use self::openai::OpenAIChatClient;
use super::LlmConfig;
use crate::error::Result;
use crate::models::chat::Turn;

/// Lazy, finite sequence of reply fragments. Dropping it stops the producer.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Sends `messages` and returns the first choice's content, trimmed.
    async fn complete(&self, messages: &[Turn]) -> Result<String>;

    /// Sends `messages` with incremental delivery.
    ///
    /// Connection and status failures are returned here, before any fragment exists.
    /// Failures after that arrive as an `Err` item and end the stream.
    async fn stream_completion(&self, messages: &[Turn]) -> Result<FragmentStream>;

    fn model(&self) -> &str;
}

/// Spawns `producer` with the sending half of a bounded channel and returns the receiving half
/// as a stream. The producer sees a closed channel once the stream is dropped.
pub fn create_streaming_response<F, Fut>(producer: F) -> FragmentStream
    where
        F: FnOnce(mpsc::Sender<Result<String>>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static
{
    let (tx, rx) = mpsc::channel(32);

    tokio::spawn(async move {
        producer(tx).await;
    });

    Box::pin(ReceiverStream::new(rx))
}

pub fn new_client(config: &LlmConfig) -> Result<Arc<dyn ChatClient>> {
    let client = OpenAIChatClient::from_config(config)?;
    Ok(Arc::new(client))
}
