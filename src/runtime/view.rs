use super::frontend::{UserInputEvent, Viewport};
use crate::error::SessionError;
use crate::state::{ChatSession, TranscriptChange};
use crate::types::{Attachment, ToolResultPayload};
use crate::ui::{ScrollFollow, ScrollGesture};

/// Binds one session and its scroll-follow state to a host viewport.
pub struct ChatView<V: Viewport> {
    session: ChatSession,
    follow: ScrollFollow,
    viewport: V,
}

impl<V: Viewport> ChatView<V> {
    /// Mounts the view; the first render always lands on the newest message.
    pub fn mount(session: ChatSession, mut viewport: V, scroll_tolerance: f64) -> Self {
        let mut follow = ScrollFollow::new(scroll_tolerance);
        viewport.scroll_to_bottom(follow.mount(session.messages().len()));
        Self {
            session,
            follow,
            viewport,
        }
    }

    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    pub fn viewport(&self) -> &V {
        &self.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut V {
        &mut self.viewport
    }

    pub fn auto_follow(&self) -> bool {
        self.follow.auto_follow()
    }

    /// The input surface must be disabled while this is true.
    pub fn input_locked(&self) -> bool {
        self.session.is_busy() || self.session.has_pending_confirmation()
    }

    pub fn handle_input(&mut self, event: UserInputEvent) -> Result<(), SessionError> {
        match event {
            UserInputEvent::Submit { text, attachments } => self.submit(text, attachments),
            UserInputEvent::Interrupt => {
                self.stop();
                Ok(())
            }
            UserInputEvent::Regenerate => self.reload(),
            UserInputEvent::Edit { message_id, text } => self.edit_message(&message_id, text),
            UserInputEvent::ToolDecision {
                tool_call_id,
                result,
            } => self.add_tool_result(&tool_call_id, result),
            UserInputEvent::Gesture(gesture) => {
                self.on_gesture(gesture);
                Ok(())
            }
        }
    }

    pub fn submit(&mut self, text: impl Into<String>, attachments: Vec<Attachment>) -> Result<(), SessionError> {
        self.session.submit(text, attachments)?;
        self.observe(TranscriptChange::MessageAppended);
        Ok(())
    }

    pub fn reload(&mut self) -> Result<(), SessionError> {
        self.session.reload()?;
        self.observe(TranscriptChange::MessageUpdated);
        Ok(())
    }

    pub fn edit_message(&mut self, message_id: &str, text: impl Into<String>) -> Result<(), SessionError> {
        self.session.edit_message(message_id, text)?;
        self.observe(TranscriptChange::MessageUpdated);
        Ok(())
    }

    pub fn add_tool_result(&mut self, tool_call_id: &str, result: ToolResultPayload) -> Result<(), SessionError> {
        self.session.add_tool_result(tool_call_id, result)?;
        self.observe(TranscriptChange::MessageUpdated);
        Ok(())
    }

    pub fn stop(&mut self) {
        self.session.stop();
    }

    pub fn on_gesture(&mut self, gesture: ScrollGesture) {
        self.follow.on_gesture(gesture);
    }

    /// Waits for the next stream update and lets the tracker react to it.
    pub async fn pump(&mut self) -> Option<TranscriptChange> {
        let change = self.session.next_change().await?;
        self.observe(change);
        Some(change)
    }

    /// Applies already-arrived updates without waiting.
    pub fn drain(&mut self) -> usize {
        let changes = self.session.drain_pending();
        for change in &changes {
            self.observe(*change);
        }
        changes.len()
    }

    fn observe(&mut self, change: TranscriptChange) {
        let len = self.session.messages().len();
        if let Some(behavior) = self.follow.on_transcript_change(len, change) {
            self.viewport.scroll_to_bottom(behavior);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockTransport;
    use crate::config::Config;
    use crate::types::StreamEvent;
    use crate::ui::{ScrollBehavior, ScrollMetrics};
    use std::sync::Arc;

    #[derive(Default)]
    struct RecordingViewport {
        scrolls: Vec<ScrollBehavior>,
    }

    impl Viewport for RecordingViewport {
        fn scroll_to_bottom(&mut self, behavior: ScrollBehavior) {
            self.scrolls.push(behavior);
        }
    }

    fn metrics(offset: f64) -> ScrollMetrics {
        ScrollMetrics {
            offset,
            viewport_height: 200.0,
            content_height: 2000.0,
        }
    }

    fn delta(text: &str) -> StreamEvent {
        StreamEvent::TextDelta {
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn test_manual_scroll_up_suppresses_follow_until_bottom() {
        let transport = MockTransport::new();
        let handle = transport.push_live();
        let session = ChatSession::new(Arc::new(transport), &Config::default());
        let mut view = ChatView::mount(session, RecordingViewport::default(), 8.0);
        assert_eq!(view.viewport().scrolls, vec![ScrollBehavior::Instant]);

        view.submit("tell me a long story", Vec::new()).expect("submit");
        handle.send(delta("Once"));
        view.pump().await.expect("first delta");
        let scrolls_before = view.viewport().scrolls.len();

        view.handle_input(UserInputEvent::Gesture(ScrollGesture::Scroll(metrics(1800.0))))
            .expect("gesture");
        view.handle_input(UserInputEvent::Gesture(ScrollGesture::Scroll(metrics(900.0))))
            .expect("gesture");
        assert!(!view.auto_follow());

        for word in [" upon", " a", " time"] {
            handle.send(delta(word));
            view.pump().await.expect("delta");
        }
        assert_eq!(
            view.viewport().scrolls.len(),
            scrolls_before,
            "no programmatic scroll while the user reads older content"
        );

        view.on_gesture(ScrollGesture::Scroll(metrics(1795.0)));
        handle.send(delta("."));
        view.pump().await.expect("fourth delta");
        assert_eq!(
            view.viewport().scrolls.last(),
            Some(&ScrollBehavior::Smooth)
        );
        assert_eq!(view.viewport().scrolls.len(), scrolls_before + 1);
    }

    #[tokio::test]
    async fn test_input_locked_while_streaming_and_released_after_finish() {
        let transport = MockTransport::new();
        transport.push_events(vec![delta("hi"), StreamEvent::Finish { finish_reason: None }]);
        let session = ChatSession::new(Arc::new(transport), &Config::default());
        let mut view = ChatView::mount(session, RecordingViewport::default(), 8.0);

        view.handle_input(UserInputEvent::Submit {
            text: "hello".to_string(),
            attachments: Vec::new(),
        })
        .expect("submit");
        assert!(view.input_locked());

        while view.pump().await.is_some() {}
        assert!(!view.input_locked());
        assert_eq!(view.session().messages().len(), 2);
    }
}
