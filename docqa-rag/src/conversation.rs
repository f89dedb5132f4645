//! Per-topic chat history for multi-turn question-bank conversations.

use std::collections::{HashMap, VecDeque};

use docqa_model::{ChatMessage, Role};

use crate::prompt::{Prompt, Topic};

/// Default number of messages retained per topic.
pub const DEFAULT_MAX_MESSAGES: usize = 50;

/// Owned conversation state, one bounded history per [`Topic`].
///
/// Once a history holds `max_messages` messages, recording more evicts the
/// oldest ones. Callers share a context across requests behind an async
/// mutex.
#[derive(Debug, Clone)]
pub struct ConversationContext {
    max_messages: usize,
    histories: HashMap<Topic, VecDeque<ChatMessage>>,
}

impl Default for ConversationContext {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MESSAGES)
    }
}

impl ConversationContext {
    pub fn new(max_messages: usize) -> Self {
        Self { max_messages: max_messages.max(2), histories: HashMap::new() }
    }

    pub fn max_messages(&self) -> usize {
        self.max_messages
    }

    /// Append the messages of `prompt` to `topic` and return the full
    /// history to send.
    pub fn record_exchange(&mut self, topic: Topic, prompt: Prompt) -> Vec<ChatMessage> {
        for message in prompt.messages {
            self.push(topic, message);
        }
        self.history(topic)
    }

    /// Append the model's reply to `topic`.
    pub fn record_reply(&mut self, topic: Topic, reply: impl Into<String>) {
        self.push(topic, ChatMessage::assistant(reply));
    }

    /// Current history of `topic`, oldest first.
    pub fn history(&self, topic: Topic) -> Vec<ChatMessage> {
        self.histories.get(&topic).map(|h| h.iter().cloned().collect()).unwrap_or_default()
    }

    /// Append to `topic`, evicting the oldest messages beyond the cap.
    /// A system message opening the history is pinned so the rules
    /// survive long conversations.
    fn push(&mut self, topic: Topic, message: ChatMessage) {
        let history = self.histories.entry(topic).or_default();
        history.push_back(message);
        while history.len() > self.max_messages {
            let pinned = history.front().is_some_and(|m| m.role == Role::System);
            history.remove(usize::from(pinned));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topics_have_separate_histories() {
        let mut ctx = ConversationContext::default();
        let sent = ctx.record_exchange(
            Topic::Technical,
            Prompt::new(vec![ChatMessage::system("rules"), ChatMessage::user("q1")]),
        );
        assert_eq!(sent.len(), 2);
        ctx.record_reply(Topic::Technical, "a1");

        assert_eq!(ctx.history(Topic::Technical).len(), 3);
        assert!(ctx.history(Topic::Domain).is_empty());
    }

    #[test]
    fn oldest_messages_are_evicted() {
        let mut ctx = ConversationContext::new(3);
        for i in 0..5 {
            ctx.record_reply(Topic::Domain, format!("a{i}"));
        }
        let contents: Vec<String> =
            ctx.history(Topic::Domain).into_iter().map(|m| m.content).collect();
        assert_eq!(contents, vec!["a2", "a3", "a4"]);
    }

    #[test]
    fn opening_rules_survive_eviction() {
        let mut ctx = ConversationContext::new(4);
        let turn = |q: &str| Prompt::new(vec![ChatMessage::system("rules"), ChatMessage::user(q)]);

        ctx.record_exchange(Topic::Technical, turn("q1"));
        ctx.record_reply(Topic::Technical, "a1");
        let sent = ctx.record_exchange(Topic::Technical, turn("q2"));

        assert_eq!(sent.len(), 4);
        assert_eq!(sent[0], ChatMessage::system("rules"));
        let contents: Vec<&str> = sent.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["rules", "a1", "rules", "q2"]);

        for i in 0..10 {
            ctx.record_reply(Topic::Technical, format!("r{i}"));
        }
        let history = ctx.history(Topic::Technical);
        assert_eq!(history.len(), 4);
        assert_eq!(history[0].role, Role::System);
        assert_eq!(history[3].content, "r9");
    }
}
