//! Conversation session: an append-only, session-scoped message log.
//!
//! `append` is the only mutator; `reset` clears the log and is invoked
//! explicitly by the user, never automatically. History is unbounded by
//! design — if bounding is ever wanted it should become an explicit
//! trimming policy in config, not an implicit cutoff.

use crate::models::ChatMessage;

#[derive(Debug, Default)]
pub struct ConversationSession {
    messages: Vec<ChatMessage>,
}

impl ConversationSession {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
        }
    }

    pub fn append(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// All prior turns excluding the in-flight question — the prompt
    /// assembler's history input.
    pub fn history_excluding_last(&self) -> &[ChatMessage] {
        match self.messages.len() {
            0 => &[],
            n => &self.messages[..n - 1],
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn reset(&mut self) {
        self.messages.clear();
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_excludes_in_flight_question() {
        let mut session = ConversationSession::new();
        session.append(ChatMessage::user("第一问"));
        session.append(ChatMessage::assistant("第一答", vec![]));
        session.append(ChatMessage::user("第二问"));

        let history = session.history_excluding_last();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "第一问");
        assert_eq!(history[1].content, "第一答");
    }

    #[test]
    fn test_empty_session_history_is_empty() {
        let session = ConversationSession::new();
        assert!(session.history_excluding_last().is_empty());
    }

    #[test]
    fn test_reset_clears_all_messages() {
        let mut session = ConversationSession::new();
        session.append(ChatMessage::user("问"));
        session.append(ChatMessage::assistant("答", vec!["X1".to_string()]));
        session.reset();
        assert!(session.is_empty());
        assert!(session.history_excluding_last().is_empty());
    }

    #[test]
    fn test_append_preserves_order_and_sources() {
        let mut session = ConversationSession::new();
        session.append(ChatMessage::user("问"));
        session.append(ChatMessage::assistant("答", vec!["X1".to_string()]));
        assert_eq!(session.len(), 2);
        assert_eq!(session.messages()[1].sources, vec!["X1".to_string()]);
    }
}
