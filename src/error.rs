use crate::state::SessionStatus;

/// Precondition violations raised synchronously by the session controller.
///
/// These are caller bugs, not runtime conditions: the transcript is never
/// touched when one of them is returned.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("session is busy ({0:?}); wait for the current stream to end")]
    Busy(SessionStatus),

    #[error("tool call {tool_call_id} ({tool_name}) is awaiting confirmation")]
    PendingConfirmation {
        tool_call_id: String,
        tool_name: String,
    },

    #[error("message text is empty")]
    EmptyInput,

    #[error("cannot reload while {0:?}")]
    NotReloadable(SessionStatus),

    #[error("transcript has no user message to resubmit")]
    NothingToResubmit,

    #[error("message not found: {0}")]
    MessageNotFound(String),

    #[error("message {0} is not a user message")]
    NotUserMessage(String),

    #[error("no open tool call with id {0}")]
    ToolCallNotPending(String),
}

#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),

    #[error("agent endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed stream line: {0}")]
    Decode(String),

    #[error("transport failed: {0}")]
    Other(String),
}

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),

    #[error("store returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("chat not found: {0}")]
    NotFound(String),

    #[error("write rejected: {0}")]
    Rejected(String),
}
