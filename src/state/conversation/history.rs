use super::streaming::ConversationState;
use super::ChatSession;
use crate::api::ChatStore;
use crate::error::SessionError;
use crate::types::{MessagePart, Role};
use anyhow::{Context, Result};

impl ChatSession {
    /// Replaces the transcript with persisted messages; status returns to idle.
    pub fn hydrate(&mut self, messages: Vec<crate::types::Message>) -> Result<(), SessionError> {
        self.ensure_not_busy()?;
        self.state = ConversationState::with_messages(messages);
        Ok(())
    }

    /// Loads this session's persisted transcript, typically on first render.
    pub async fn hydrate_from(&mut self, store: &dyn ChatStore) -> Result<()> {
        let messages = store
            .list_messages(&self.id)
            .await
            .with_context(|| format!("failed to load messages for chat {}", self.id))?;
        tracing::debug!(session_id = %self.id, count = messages.len(), "hydrated transcript");
        self.hydrate(messages)?;
        Ok(())
    }

    /// Rewrites a prior user message, discards everything after it and
    /// resubmits from there.
    pub fn edit_message(&mut self, message_id: &str, text: impl Into<String>) -> Result<(), SessionError> {
        self.ensure_not_busy()?;
        let text = text.into();
        if text.trim().is_empty() {
            return Err(SessionError::EmptyInput);
        }

        let index = self
            .state
            .messages
            .iter()
            .position(|message| message.id == message_id)
            .ok_or_else(|| SessionError::MessageNotFound(message_id.to_string()))?;
        if self.state.messages[index].role != Role::User {
            return Err(SessionError::NotUserMessage(message_id.to_string()));
        }
        self.gate.check(&self.state.messages[..index])?;

        self.state.messages.truncate(index + 1);
        let message = &mut self.state.messages[index];
        message
            .parts
            .retain(|part| !matches!(part, MessagePart::Text { .. }));
        message.parts.insert(0, MessagePart::Text { text });

        let request = self.request(None);
        self.open_stream(request, false);
        Ok(())
    }
}
