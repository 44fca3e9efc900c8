//! Assistant chat transcript.
//!
//! A thin observable transcript over the chat completions service. Failures
//! land in the transcript as error entries; the send itself never fails.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::warn;

use crate::kernel::BaseChatService;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Assistant,
    /// A failed request, kept in the transcript like the original exchange.
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatEntry {
    pub role: ChatRole,
    pub text: String,
}

pub struct ChatLog {
    chat: Arc<dyn BaseChatService>,
    state: watch::Sender<Vec<ChatEntry>>,
}

impl ChatLog {
    pub fn new(chat: Arc<dyn BaseChatService>) -> Self {
        let (state, _) = watch::channel(Vec::new());
        Self { chat, state }
    }

    /// Read-only snapshot stream of the transcript.
    pub fn state(&self) -> watch::Receiver<Vec<ChatEntry>> {
        self.state.subscribe()
    }

    pub fn entries(&self) -> Vec<ChatEntry> {
        self.state.borrow().clone()
    }

    /// Append the user line, ask the assistant, append the reply (or the
    /// error, if the service failed).
    pub async fn send(&self, prompt: &str) {
        self.push(ChatRole::User, prompt.to_string());
        match self.chat.send(prompt).await {
            Ok(reply) => self.push(ChatRole::Assistant, reply),
            Err(err) => {
                warn!("chat request failed: {err}");
                self.push(ChatRole::Error, err.to_string());
            }
        }
    }

    fn push(&self, role: ChatRole, text: String) {
        self.state
            .send_modify(|entries| entries.push(ChatEntry { role, text }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::{MockChatService, TestDependencies};

    #[tokio::test]
    async fn a_reply_lands_after_the_user_line() {
        let ds = TestDependencies {
            chat: Arc::new(MockChatService::new().with_reply("water or foam")),
            ..TestDependencies::new()
        };
        let log = ChatLog::new(ds.chat.clone());

        log.send("which extinguisher for a wood fire?").await;

        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].role, ChatRole::User);
        assert_eq!(entries[1].role, ChatRole::Assistant);
        assert_eq!(entries[1].text, "water or foam");
        assert_eq!(ds.chat.prompts(), vec!["which extinguisher for a wood fire?".to_string()]);
    }

    #[tokio::test]
    async fn a_service_failure_becomes_an_error_entry() {
        let ds = TestDependencies {
            chat: Arc::new(MockChatService::new().with_error("completion request failed with status 503")),
            ..TestDependencies::new()
        };
        let log = ChatLog::new(ds.chat.clone());

        log.send("hello").await;

        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].role, ChatRole::Error);
        assert!(entries[1].text.contains("503"));
    }

    #[tokio::test]
    async fn the_transcript_keeps_order_across_sends() {
        let ds = TestDependencies {
            chat: Arc::new(
                MockChatService::new()
                    .with_reply("first reply")
                    .with_reply("second reply"),
            ),
            ..TestDependencies::new()
        };
        let log = ChatLog::new(ds.chat.clone());

        log.send("first").await;
        log.send("second").await;

        let texts: Vec<_> = log.entries().into_iter().map(|e| e.text).collect();
        assert_eq!(texts, vec!["first", "first reply", "second", "second reply"]);
    }
}
