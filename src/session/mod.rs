//! Conversation state for one interactive session.
//!
//! A [`Session`] is an append-only list of messages that always starts with a
//! single system instruction. The full list is what gets sent to the
//! completion service; [`Session::visible`] is what a transcript shows.

mod store;

use serde::Serialize;
use uuid::Uuid;

use crate::chat::{ChatMessage, ChatRole};

pub use store::{MemorySessionStore, SessionStore, SharedSession, DEFAULT_SESSION_KEY};

/// Instruction every session is seeded with
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant. When provided with documents, you will analyze them and answer questions about their content.";

/// Ordered, append-only conversation.
#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    messages: Vec<ChatMessage>,
    /// Display text per message, when it differs from what was transmitted
    displayed: Vec<Option<String>>,
}

/// One transcript row, as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisibleMessage {
    pub role: ChatRole,
    pub content: String,
}

impl Session {
    /// Starts a session seeded with `system_prompt`.
    pub fn new(system_prompt: impl Into<String>) -> Self {
        let id = Uuid::new_v4();
        log::debug!("starting session {id}");
        Self {
            id,
            messages: vec![ChatMessage::system().content(system_prompt).build()],
            displayed: vec![None],
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The instruction the session was seeded with.
    pub fn system_prompt(&self) -> &str {
        &self.messages[0].content
    }

    /// Appends a message shown exactly as transmitted.
    pub fn append(&mut self, message: ChatMessage) {
        self.messages.push(message);
        self.displayed.push(None);
    }

    /// Appends a message whose transcript entry shows `display` instead of
    /// its content.
    pub fn append_displayed(&mut self, message: ChatMessage, display: impl Into<String>) {
        self.messages.push(message);
        self.displayed.push(Some(display.into()));
    }

    /// Every message in order, system message first.
    pub fn all(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// The transcript: all non-system messages with their display text.
    pub fn visible(&self) -> Vec<VisibleMessage> {
        self.messages
            .iter()
            .zip(&self.displayed)
            .filter(|(message, _)| message.role != ChatRole::System)
            .map(|(message, display)| VisibleMessage {
                role: message.role,
                content: display.clone().unwrap_or_else(|| message.content.clone()),
            })
            .collect()
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Always false: a session holds at least its system message.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(DEFAULT_SYSTEM_PROMPT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_holds_only_the_system_message() {
        let session = Session::default();
        assert_eq!(session.len(), 1);
        assert_eq!(session.all()[0].role, ChatRole::System);
        assert_eq!(session.system_prompt(), DEFAULT_SYSTEM_PROMPT);
        assert!(session.visible().is_empty());
    }

    #[test]
    fn visible_hides_system_and_keeps_order() {
        let mut session = Session::new("be terse");
        session.append(ChatMessage::user().content("Hello").build());
        session.append(ChatMessage::assistant().content("Hi!").build());

        let visible = session.visible();
        assert_eq!(visible.len(), 2);
        assert_eq!(visible[0].role, ChatRole::User);
        assert_eq!(visible[0].content, "Hello");
        assert_eq!(visible[1].role, ChatRole::Assistant);
        assert_eq!(session.all().len(), 3);
    }

    #[test]
    fn displayed_text_overrides_content_in_transcript_only() {
        let mut session = Session::default();
        session.append_displayed(
            ChatMessage::user()
                .content("Document content:\nsecret\n\nQuestion: Q?")
                .build(),
            "Q?",
        );

        assert_eq!(session.visible()[0].content, "Q?");
        assert!(session.all()[1].content.contains("secret"));
    }

    #[test]
    fn visible_serializes_like_wire_messages() {
        let mut session = Session::default();
        session.append(ChatMessage::user().content("Hello").build());
        let json = serde_json::to_string(&session.visible()).unwrap();
        assert_eq!(json, r#"[{"role":"user","content":"Hello"}]"#);
    }
}
