//! The chat-completion capability.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::Result;
use crate::message::ChatMessage;

/// An ordered stream of answer text fragments.
///
/// The consumer concatenates fragments in arrival order. Dropping the
/// stream cancels the underlying provider request.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// A chat-completion model.
///
/// Implementations wrap a specific provider behind a unified async
/// interface. The default [`stream`](Llm::stream) implementation performs a
/// single [`complete`](Llm::complete) call and yields the whole answer as one
/// fragment; providers with native streaming should override it.
#[async_trait]
pub trait Llm: Send + Sync {
    /// Model identifier, used in logs.
    fn name(&self) -> &str;

    /// Send the conversation and wait for the full answer.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;

    /// Send the conversation and receive the answer as text fragments.
    ///
    /// Errors that happen before the first fragment are returned directly;
    /// later failures are yielded as stream items.
    async fn stream(&self, messages: &[ChatMessage]) -> Result<TextStream> {
        let text = self.complete(messages).await?;
        Ok(Box::pin(futures::stream::once(async move { Ok(text) })))
    }
}
