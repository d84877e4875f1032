pub mod api;
pub mod message;

pub use api::{
    AgentBinding, ChatRecord, StreamEvent, StreamRequest, ToolResultPayload, Visibility,
};
pub use message::{Attachment, Message, MessagePart, Role, ToolInvocation, ToolState};
