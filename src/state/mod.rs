mod chat_history;
mod conversation;
mod optimistic;
mod status;

pub use chat_history::{ChatField, ChatFieldKey, ChatFieldValue, ChatHistory};
pub use conversation::{fold, ChatSession, ConfirmationGate, ConversationState, TranscriptChange};
pub use optimistic::{CommitState, OptimisticCache, OptimisticEdit};
pub use status::SessionStatus;
