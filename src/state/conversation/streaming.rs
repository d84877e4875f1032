use super::super::status::SessionStatus;
use crate::types::{Message, MessagePart, Role, StreamEvent, ToolInvocation};
use serde_json::Value;

/// Transcript plus stream bookkeeping; the input and output of [`fold`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationState {
    pub messages: Vec<Message>,
    pub status: SessionStatus,
    pub last_error: Option<String>,
    /// Assistant message the live stream writes into, created lazily.
    pub open_assistant: Option<usize>,
}

/// What a fold did to the transcript, as seen by scroll and render observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptChange {
    Unchanged,
    MessageAppended,
    MessageUpdated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ToolResultRejection {
    UnknownCall,
    AlreadyResolved,
}

#[derive(Clone, Copy)]
enum DeltaKind {
    Text,
    Reasoning,
}

impl ConversationState {
    pub fn with_messages(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    pub(crate) fn begin_stream(&mut self, continue_last_assistant: bool) {
        self.status = SessionStatus::Submitted;
        self.last_error = None;
        self.open_assistant = match self.messages.last() {
            Some(last) if continue_last_assistant && last.role == Role::Assistant => {
                Some(self.messages.len() - 1)
            }
            _ => None,
        };
    }

    pub(crate) fn end_stream(&mut self, status: SessionStatus) {
        self.status = status;
        self.open_assistant = None;
    }

    pub(crate) fn fail(&mut self, message: String) {
        self.last_error = Some(message);
        self.end_stream(SessionStatus::Error);
    }

    fn ensure_open_assistant(&mut self, message_id: Option<String>) -> (usize, bool) {
        if let Some(index) = self.open_assistant {
            if index < self.messages.len() {
                return (index, false);
            }
        }
        let message = match message_id {
            Some(id) => Message::assistant_with_id(id),
            None => Message::assistant_with_id(crate::types::message::new_message_id()),
        };
        self.messages.push(message);
        let index = self.messages.len() - 1;
        self.open_assistant = Some(index);
        (index, true)
    }

    fn append_delta(&mut self, kind: DeltaKind, delta: String) -> TranscriptChange {
        if delta.is_empty() {
            return TranscriptChange::Unchanged;
        }
        let (index, created) = self.ensure_open_assistant(None);
        let parts = &mut self.messages[index].parts;
        match (kind, parts.last_mut()) {
            (DeltaKind::Text, Some(MessagePart::Text { text }))
            | (DeltaKind::Reasoning, Some(MessagePart::Reasoning { text })) => {
                text.push_str(&delta);
            }
            (DeltaKind::Text, _) => parts.push(MessagePart::Text { text: delta }),
            (DeltaKind::Reasoning, _) => parts.push(MessagePart::Reasoning { text: delta }),
        }
        appended_or_updated(created)
    }

    fn push_tool_call(&mut self, invocation: ToolInvocation) -> TranscriptChange {
        if self.find_invocation(&invocation.tool_call_id).is_some() {
            tracing::warn!(
                tool_call_id = %invocation.tool_call_id,
                tool_name = %invocation.tool_name,
                "dropping duplicate tool-call"
            );
            return TranscriptChange::Unchanged;
        }
        let (index, created) = self.ensure_open_assistant(None);
        self.messages[index]
            .parts
            .push(MessagePart::ToolInvocation(invocation));
        appended_or_updated(created)
    }

    fn find_invocation(&self, tool_call_id: &str) -> Option<&ToolInvocation> {
        self.messages
            .iter()
            .rev()
            .flat_map(|message| message.tool_invocations())
            .find(|invocation| invocation.tool_call_id == tool_call_id)
    }

    /// Transitions a `call` part to `result`; the only writer of tool results.
    pub(crate) fn resolve_tool_call(
        &mut self,
        tool_call_id: &str,
        result: Value,
    ) -> Result<usize, ToolResultRejection> {
        for (index, message) in self.messages.iter_mut().enumerate().rev() {
            if let Some(invocation) = message.tool_invocation_mut(tool_call_id) {
                return if invocation.resolve(result) {
                    Ok(index)
                } else {
                    Err(ToolResultRejection::AlreadyResolved)
                };
            }
        }
        Err(ToolResultRejection::UnknownCall)
    }
}

fn appended_or_updated(created: bool) -> TranscriptChange {
    if created {
        TranscriptChange::MessageAppended
    } else {
        TranscriptChange::MessageUpdated
    }
}

/// Applies one stream event. Total over [`StreamEvent`]: protocol violations
/// are logged and dropped, failures only ever change the status.
pub fn fold(state: &mut ConversationState, event: StreamEvent) -> TranscriptChange {
    if state.status == SessionStatus::Submitted {
        state.status = SessionStatus::Streaming;
    }

    match event {
        StreamEvent::Start { message_id } => {
            if state.open_assistant.is_some() {
                TranscriptChange::Unchanged
            } else {
                state.ensure_open_assistant(message_id);
                TranscriptChange::MessageAppended
            }
        }
        StreamEvent::TextDelta { text } => state.append_delta(DeltaKind::Text, text),
        StreamEvent::ReasoningDelta { text } => state.append_delta(DeltaKind::Reasoning, text),
        StreamEvent::ToolCall {
            tool_call_id,
            tool_name,
            args,
        } => state.push_tool_call(ToolInvocation::call(tool_call_id, tool_name, args)),
        StreamEvent::ToolResult {
            tool_call_id,
            result,
        } => match state.resolve_tool_call(&tool_call_id, result) {
            Ok(_) => TranscriptChange::MessageUpdated,
            Err(rejection) => {
                tracing::warn!(
                    %tool_call_id,
                    ?rejection,
                    "dropping tool-result without an open tool-call"
                );
                TranscriptChange::Unchanged
            }
        },
        StreamEvent::Finish { finish_reason } => {
            tracing::debug!(?finish_reason, "stream finished");
            state.end_stream(SessionStatus::Ready);
            TranscriptChange::Unchanged
        }
        StreamEvent::Error { message } => {
            tracing::error!(%message, "agent stream reported an error");
            state.fail(message);
            TranscriptChange::Unchanged
        }
    }
}
