use serde::{Deserialize, Serialize};

/// Lifecycle of one conversation view.
///
/// `Idle` until the first stream runs (or after the transcript is replaced by
/// hydration); `Submitted` until the first event arrives; `Streaming` while
/// events flow; `Ready` after a clean end or `stop()`; `Error` after a
/// transport failure.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Idle,
    Submitted,
    Streaming,
    Ready,
    Error,
}

impl SessionStatus {
    /// A stream is open; new turns must wait.
    pub fn is_busy(self) -> bool {
        matches!(self, SessionStatus::Submitted | SessionStatus::Streaming)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Ready | SessionStatus::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_busy_and_terminal_are_disjoint() {
        for status in [
            SessionStatus::Idle,
            SessionStatus::Submitted,
            SessionStatus::Streaming,
            SessionStatus::Ready,
            SessionStatus::Error,
        ] {
            assert!(!(status.is_busy() && status.is_terminal()), "{status:?}");
        }
        assert!(!SessionStatus::Idle.is_busy());
        assert!(!SessionStatus::Idle.is_terminal());
    }
}
