use crate::state::TranscriptChange;

/// Scroll geometry of the transcript viewport, in host units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollMetrics {
    pub offset: f64,
    pub viewport_height: f64,
    pub content_height: f64,
}

impl ScrollMetrics {
    pub fn distance_to_bottom(&self) -> f64 {
        (self.content_height - self.offset - self.viewport_height).max(0.0)
    }
}

/// Raw input the host forwards from the transcript viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScrollGesture {
    /// The scroll position changed, by the user or programmatically.
    Scroll(ScrollMetrics),
    /// Wheel motion; negative `delta_y` moves toward older content.
    Wheel { delta_y: f64, metrics: ScrollMetrics },
    /// Touch drag; `delta_y` is finger travel, positive when the finger moves
    /// down, which pulls older content into view.
    Touch { delta_y: f64, metrics: ScrollMetrics },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollBehavior {
    Instant,
    Smooth,
}

/// Decides whether transcript growth should pull the viewport to the bottom.
#[derive(Debug, Clone)]
pub struct ScrollFollow {
    auto_follow: bool,
    tolerance: f64,
    last_offset: Option<f64>,
    observed_len: usize,
}

impl ScrollFollow {
    pub fn new(tolerance: f64) -> Self {
        Self {
            auto_follow: true,
            tolerance,
            last_offset: None,
            observed_len: 0,
        }
    }

    pub fn auto_follow(&self) -> bool {
        self.auto_follow
    }

    pub fn is_at_bottom(&self, metrics: &ScrollMetrics) -> bool {
        metrics.distance_to_bottom() <= self.tolerance
    }

    /// First render always jumps straight to the newest content.
    pub fn mount(&mut self, transcript_len: usize) -> ScrollBehavior {
        self.observed_len = transcript_len;
        self.last_offset = None;
        ScrollBehavior::Instant
    }

    pub fn on_gesture(&mut self, gesture: ScrollGesture) {
        let (moving_up, metrics) = match gesture {
            // Without a baseline the viewport was last pinned by mount, so
            // landing off the bottom means the user moved away from the tail.
            ScrollGesture::Scroll(metrics) => (
                self.last_offset
                    .map_or(true, |previous| metrics.offset < previous),
                metrics,
            ),
            ScrollGesture::Wheel { delta_y, metrics } => (delta_y < 0.0, metrics),
            ScrollGesture::Touch { delta_y, metrics } => (delta_y > 0.0, metrics),
        };
        self.last_offset = Some(metrics.offset);

        if self.is_at_bottom(&metrics) {
            self.auto_follow = true;
        } else if moving_up {
            self.auto_follow = false;
        }
    }

    /// Returns the scroll to perform after the transcript changed, if any.
    pub fn on_transcript_change(
        &mut self,
        transcript_len: usize,
        change: TranscriptChange,
    ) -> Option<ScrollBehavior> {
        let grew = transcript_len != self.observed_len;
        self.observed_len = transcript_len;
        if change == TranscriptChange::Unchanged && !grew {
            return None;
        }
        self.auto_follow.then_some(ScrollBehavior::Smooth)
    }
}
