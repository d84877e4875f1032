use crate::error::SessionError;
use crate::types::{Message, ToolInvocation};
use std::collections::BTreeSet;

/// Derives the "input locked" signal from the transcript.
///
/// Nothing here is stored: a pending confirmation is any open `call` whose
/// tool is in the required set. There is no timeout; a human
/// may take as long as they like to answer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfirmationGate {
    required: BTreeSet<String>,
}

impl ConfirmationGate {
    pub fn new(required: impl IntoIterator<Item = String>) -> Self {
        Self {
            required: required.into_iter().collect(),
        }
    }

    pub fn extend(&mut self, names: impl IntoIterator<Item = String>) {
        self.required.extend(names);
    }

    pub fn requires_confirmation(&self, tool_name: &str) -> bool {
        self.required.contains(tool_name)
    }

    pub fn pending<'a>(
        &'a self,
        messages: &'a [Message],
    ) -> impl Iterator<Item = &'a ToolInvocation> + 'a {
        messages
            .iter()
            .flat_map(|message| message.tool_invocations())
            .filter(|invocation| {
                invocation.is_open() && self.requires_confirmation(&invocation.tool_name)
            })
    }

    pub fn has_pending(&self, messages: &[Message]) -> bool {
        self.pending(messages).next().is_some()
    }

    pub fn check(&self, messages: &[Message]) -> Result<(), SessionError> {
        match self.pending(messages).next() {
            Some(invocation) => Err(SessionError::PendingConfirmation {
                tool_call_id: invocation.tool_call_id.clone(),
                tool_name: invocation.tool_name.clone(),
            }),
            None => Ok(()),
        }
    }
}

/// Every tool call of the trailing assistant message has a result.
pub(super) fn last_assistant_turn_resolved(messages: &[Message]) -> bool {
    let Some(last) = messages.last() else {
        return false;
    };
    if last.role != crate::types::Role::Assistant {
        return false;
    }
    let mut invocations = last.tool_invocations().peekable();
    invocations.peek().is_some() && invocations.all(|invocation| !invocation.is_open())
}
