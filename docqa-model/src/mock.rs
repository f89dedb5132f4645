//! Scripted model for tests and offline development.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::error::Result;
use crate::llm::{Llm, TextStream};
use crate::message::ChatMessage;

/// A model that replays scripted replies and records every request.
///
/// Scripted replies are consumed in order; once exhausted the default reply
/// is returned. Streaming splits the reply after each space so consumers
/// see more than one fragment.
#[derive(Debug)]
pub struct MockLlm {
    name: String,
    default_reply: String,
    replies: Mutex<VecDeque<Result<String>>>,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
    calls: AtomicUsize,
}

impl MockLlm {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_reply: "mock response".to_string(),
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Reply used once all scripted replies have been consumed.
    pub fn with_default_reply(mut self, reply: impl Into<String>) -> Self {
        self.default_reply = reply.into();
        self
    }

    /// Queue a reply (or an error) for the next call.
    pub fn with_reply(self, reply: Result<String>) -> Self {
        self.replies.lock().unwrap_or_else(|e| e.into_inner()).push_back(reply);
        self
    }

    /// Number of `complete`/`stream` calls received so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every conversation sent to the model, in call order.
    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn next_reply(&self, messages: &[ChatMessage]) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).push(messages.to_vec());
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_else(|| Ok(self.default_reply.clone()))
    }
}

#[async_trait]
impl Llm for MockLlm {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.next_reply(messages)
    }

    async fn stream(&self, messages: &[ChatMessage]) -> Result<TextStream> {
        let reply = self.next_reply(messages)?;
        let fragments: Vec<Result<String>> =
            reply.split_inclusive(' ').map(|fragment| Ok(fragment.to_string())).collect();
        Ok(Box::pin(futures::stream::iter(fragments)))
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;
    use crate::error::ModelError;

    #[tokio::test]
    async fn replays_scripted_replies_then_default() {
        let llm = MockLlm::new("mock")
            .with_default_reply("fallback")
            .with_reply(Ok("first".into()))
            .with_reply(Err(ModelError::from_status("mock", 503, "busy")));

        assert_eq!(llm.complete(&[ChatMessage::user("a")]).await.unwrap(), "first");
        assert!(llm.complete(&[ChatMessage::user("b")]).await.is_err());
        assert_eq!(llm.complete(&[ChatMessage::user("c")]).await.unwrap(), "fallback");
        assert_eq!(llm.call_count(), 3);
        assert_eq!(llm.requests()[1], vec![ChatMessage::user("b")]);
    }

    #[tokio::test]
    async fn stream_splits_on_spaces() {
        let llm = MockLlm::new("mock").with_default_reply("one two three");
        let stream = llm.stream(&[ChatMessage::user("q")]).await.unwrap();
        let fragments: Vec<String> = stream.map(|f| f.unwrap()).collect().await;
        assert_eq!(fragments, vec!["one ", "two ", "three"]);
    }
}
