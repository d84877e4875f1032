use super::state::{StreamItem, StreamUpdate};
use super::streaming::{fold, TranscriptChange};
use super::tools::last_assistant_turn_resolved;
use super::ChatSession;
use crate::api::Transport;
use crate::error::SessionError;
use crate::state::SessionStatus;
use crate::types::{Attachment, Message, Role, StreamEvent, StreamRequest, ToolResultPayload};
use futures::StreamExt;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

impl ChatSession {
    /// Appends a user turn and opens a stream for it.
    ///
    /// Rejected (never queued) while a stream is open or a confirmation is
    /// pending. Returns as soon as the stream is spawned; apply its events
    /// with [`ChatSession::next_change`] or [`ChatSession::drain_pending`].
    pub fn submit(
        &mut self,
        text: impl Into<String>,
        attachments: Vec<Attachment>,
    ) -> Result<(), SessionError> {
        self.ensure_not_busy()?;
        self.gate.check(&self.state.messages)?;
        let text = text.into();
        if text.trim().is_empty() && attachments.is_empty() {
            return Err(SessionError::EmptyInput);
        }

        let turn = Message::user(text, attachments);
        let request = self.request(Some(turn.clone()));
        self.state.messages.push(turn);
        self.open_stream(request, false);
        Ok(())
    }

    /// Regenerates the last answer: drops a trailing assistant message and
    /// resubmits the remaining transcript under the same session id.
    pub fn reload(&mut self) -> Result<(), SessionError> {
        let status = self.state.status;
        if !status.is_terminal() {
            return Err(SessionError::NotReloadable(status));
        }

        let mut end = self.state.messages.len();
        if self
            .state
            .messages
            .last()
            .is_some_and(|message| message.role == Role::Assistant)
        {
            end -= 1;
        }
        let kept = &self.state.messages[..end];
        if !kept.iter().any(|message| message.role == Role::User) {
            return Err(SessionError::NothingToResubmit);
        }
        self.gate.check(kept)?;

        self.state.messages.truncate(end);
        let request = self.request(None);
        self.open_stream(request, false);
        Ok(())
    }

    /// Cancels the open stream, keeping whatever was already applied.
    /// A no-op when nothing is streaming.
    pub fn stop(&mut self) {
        if !self.is_busy() {
            return;
        }
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        // Anything the pump already queued for this stream is now stale.
        self.generation += 1;
        self.state.end_stream(SessionStatus::Ready);
        tracing::debug!(session_id = %self.id, "stream stopped by user");
    }

    /// Resolves an open tool call with a human's answer.
    ///
    /// When no stream is open and every tool call of the last assistant
    /// message now has a result, a continuation stream is opened so the agent
    /// can act on the answers.
    pub fn add_tool_result(
        &mut self,
        tool_call_id: &str,
        result: ToolResultPayload,
    ) -> Result<(), SessionError> {
        let value = json!({ "success": result.success, "output": result.output });
        if let Err(rejection) = self.state.resolve_tool_call(tool_call_id, value) {
            if self.strict_tool_results {
                return Err(SessionError::ToolCallNotPending(tool_call_id.to_string()));
            }
            tracing::warn!(
                session_id = %self.id,
                tool_call_id,
                ?rejection,
                "ignoring tool result for a call that is not pending"
            );
            return Ok(());
        }

        if self.auto_resubmit_tool_results
            && !self.is_busy()
            && last_assistant_turn_resolved(&self.state.messages)
        {
            let request = self.request(None);
            self.open_stream(request, true);
        }
        Ok(())
    }

    /// Waits for and applies the next update of the open stream.
    ///
    /// Returns `None` once no stream is open.
    pub async fn next_change(&mut self) -> Option<TranscriptChange> {
        while self.is_busy() {
            let update = self.update_rx.recv().await?;
            if let Some(change) = self.apply_update(update) {
                return Some(change);
            }
        }
        None
    }

    /// Applies every update that has already arrived, without waiting.
    pub fn drain_pending(&mut self) -> Vec<TranscriptChange> {
        let mut changes = Vec::new();
        while let Ok(update) = self.update_rx.try_recv() {
            if let Some(change) = self.apply_update(update) {
                changes.push(change);
            }
        }
        changes
    }

    /// Applies updates until the open stream (if any) ends.
    pub async fn settle(&mut self) -> SessionStatus {
        while self.next_change().await.is_some() {}
        self.state.status
    }

    pub(super) fn ensure_not_busy(&self) -> Result<(), SessionError> {
        if self.is_busy() {
            return Err(SessionError::Busy(self.state.status));
        }
        Ok(())
    }

    pub(super) fn open_stream(&mut self, request: StreamRequest, continue_last_assistant: bool) {
        if let Some(previous) = self.cancel.take() {
            previous.cancel();
        }
        self.generation += 1;
        let generation = self.generation;
        let cancel = CancellationToken::new();
        self.cancel = Some(cancel.clone());
        self.state.begin_stream(continue_last_assistant);

        tracing::debug!(
            session_id = %self.id,
            generation,
            messages = request.messages.len(),
            "opening agent stream"
        );
        tokio::spawn(pump_stream(
            Arc::clone(&self.transport),
            request,
            generation,
            cancel,
            self.update_tx.clone(),
        ));
    }

    /// Folds one forwarded update; `None` when it belongs to a finished or
    /// cancelled stream and was discarded.
    pub(super) fn apply_update(&mut self, update: StreamUpdate) -> Option<TranscriptChange> {
        if update.generation != self.generation || !self.is_busy() {
            tracing::trace!(
                session_id = %self.id,
                generation = update.generation,
                current = self.generation,
                "discarding stale stream update"
            );
            return None;
        }

        let change = match update.item {
            StreamItem::Event(event) => fold(&mut self.state, event),
            StreamItem::Failed(message) => {
                self.state.fail(message);
                TranscriptChange::Unchanged
            }
            StreamItem::Closed => {
                self.state.end_stream(SessionStatus::Ready);
                TranscriptChange::Unchanged
            }
        };
        if !self.is_busy() {
            self.cancel = None;
        }
        Some(change)
    }
}

async fn pump_stream(
    transport: Arc<dyn Transport>,
    request: StreamRequest,
    generation: u64,
    cancel: CancellationToken,
    update_tx: mpsc::UnboundedSender<StreamUpdate>,
) {
    let opened = tokio::select! {
        biased;
        _ = cancel.cancelled() => return,
        opened = transport.open_stream(request) => opened,
    };
    let mut events = match opened {
        Ok(events) => events,
        Err(error) => {
            tracing::error!(generation, %error, "failed to open agent stream");
            let _ = update_tx.send(StreamUpdate {
                generation,
                item: StreamItem::Failed(error.to_string()),
            });
            return;
        }
    };

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(generation, "agent stream cancelled");
                return;
            }
            next = events.next() => next,
        };

        let item = match next {
            Some(Ok(event)) => StreamItem::Event(event),
            Some(Err(error)) => {
                tracing::error!(generation, %error, "agent stream failed");
                StreamItem::Failed(error.to_string())
            }
            None => StreamItem::Closed,
        };
        let terminal = match &item {
            StreamItem::Event(event) => matches!(
                event,
                StreamEvent::Finish { .. } | StreamEvent::Error { .. }
            ),
            StreamItem::Failed(_) | StreamItem::Closed => true,
        };

        if update_tx.send(StreamUpdate { generation, item }).is_err() || terminal {
            return;
        }
    }
}
