use super::streaming::ConversationState;
use super::tools::ConfirmationGate;
use crate::api::Transport;
use crate::config::Config;
use crate::state::SessionStatus;
use crate::types::{AgentBinding, Message, StreamEvent, StreamRequest, ToolInvocation, Visibility};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// One item forwarded by the pump task, tagged with the stream it belongs to.
pub(super) struct StreamUpdate {
    pub(super) generation: u64,
    pub(super) item: StreamItem,
}

pub(super) enum StreamItem {
    Event(StreamEvent),
    Failed(String),
    Closed,
}

/// Single authority over one conversation's transcript and status.
///
/// All transcript mutation happens through `&mut self`, on whatever task the
/// host drives the session from; stream I/O runs on a spawned pump task that
/// only forwards updates. Methods that open a stream must be called from
/// within a Tokio runtime.
pub struct ChatSession {
    pub(super) id: String,
    pub(super) agent: Option<AgentBinding>,
    pub(super) visibility: Visibility,
    pub(super) state: ConversationState,
    pub(super) gate: ConfirmationGate,
    pub(super) transport: Arc<dyn Transport>,
    pub(super) generation: u64,
    pub(super) cancel: Option<CancellationToken>,
    pub(super) update_tx: mpsc::UnboundedSender<StreamUpdate>,
    pub(super) update_rx: mpsc::UnboundedReceiver<StreamUpdate>,
    pub(super) strict_tool_results: bool,
    pub(super) auto_resubmit_tool_results: bool,
}

impl ChatSession {
    pub fn new(transport: Arc<dyn Transport>, config: &Config) -> Self {
        Self::with_id(crate::types::message::new_message_id(), transport, config)
    }

    pub fn with_id(id: impl Into<String>, transport: Arc<dyn Transport>, config: &Config) -> Self {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        Self {
            id: id.into(),
            agent: None,
            visibility: Visibility::default(),
            state: ConversationState::default(),
            gate: ConfirmationGate::new(config.confirmation_required.iter().cloned()),
            transport,
            generation: 0,
            cancel: None,
            update_tx,
            update_rx,
            strict_tool_results: config.strict_tool_results,
            auto_resubmit_tool_results: config.auto_resubmit_tool_results,
        }
    }

    /// Binds an agent; its confirmation-required tools join the gate.
    pub fn with_agent(mut self, agent: AgentBinding) -> Self {
        self.gate.extend(agent.confirmation_required.iter().cloned());
        self.agent = Some(agent);
        self
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn agent(&self) -> Option<&AgentBinding> {
        self.agent.as_ref()
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn messages(&self) -> &[Message] {
        &self.state.messages
    }

    pub fn status(&self) -> SessionStatus {
        self.state.status
    }

    pub fn is_busy(&self) -> bool {
        self.state.status.is_busy()
    }

    /// Message for the user-visible notice after a transport failure.
    pub fn last_error(&self) -> Option<&str> {
        self.state.last_error.as_deref()
    }

    pub fn gate(&self) -> &ConfirmationGate {
        &self.gate
    }

    pub fn has_pending_confirmation(&self) -> bool {
        self.gate.has_pending(&self.state.messages)
    }

    /// Calls the host must render an approve/deny affordance for.
    pub fn pending_confirmations(&self) -> Vec<&ToolInvocation> {
        self.gate.pending(&self.state.messages).collect()
    }

    pub(super) fn request(&self, new_user_turn: Option<Message>) -> StreamRequest {
        StreamRequest {
            session_id: self.id.clone(),
            messages: self.state.messages.clone(),
            new_user_turn,
            agent: self.agent.clone(),
            visibility: self.visibility,
        }
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
    }
}
