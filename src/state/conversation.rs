mod core;
mod history;
mod state;
mod streaming;
mod tools;


pub use state::ChatSession;
pub use streaming::{fold, ConversationState, TranscriptChange};
pub use tools::ConfirmationGate;
