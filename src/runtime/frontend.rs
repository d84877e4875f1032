use crate::types::{Attachment, ToolResultPayload};
use crate::ui::{ScrollBehavior, ScrollGesture};

/// Host-side transcript viewport the runtime scrolls.
pub trait Viewport {
    fn scroll_to_bottom(&mut self, behavior: ScrollBehavior);
}

/// Everything the host input surface can send into a conversation view.
pub enum UserInputEvent {
    Submit {
        text: String,
        attachments: Vec<Attachment>,
    },
    Interrupt,
    Regenerate,
    Edit {
        message_id: String,
        text: String,
    },
    ToolDecision {
        tool_call_id: String,
        result: ToolResultPayload,
    },
    Gesture(ScrollGesture),
}
