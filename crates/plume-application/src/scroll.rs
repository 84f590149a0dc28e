//! Scroll-position arbitration.
//!
//! Pure state machine, no framework ties. Tracks whether the viewport sits
//! within a small threshold of the transcript's bottom and decides, on each
//! growth of the materialized list, between sticking to the bottom and
//! raising a "new content" affordance.

/// What the view should do after the transcript grew.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirective {
    /// Scroll to the new bottom. Smooth for user-initiated sends, immediate
    /// otherwise.
    Stick { smooth: bool },
    /// Leave the viewport alone and show the "new content" affordance.
    Notify,
}

/// Default distance from the bottom still counted as "at bottom", in pixels.
const DEFAULT_THRESHOLD: f64 = 40.0;

/// Tracks viewport position relative to the transcript bottom.
#[derive(Debug, Clone)]
pub struct ScrollArbiter {
    at_bottom: bool,
    new_content_notice: bool,
    threshold: f64,
}

impl ScrollArbiter {
    /// Creates an arbiter starting at the bottom (empty transcript).
    pub fn new() -> Self {
        Self {
            at_bottom: true,
            new_content_notice: false,
            threshold: DEFAULT_THRESHOLD,
        }
    }

    /// Overrides the bottom threshold.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// True while the viewport counts as at the bottom.
    pub fn is_at_bottom(&self) -> bool {
        self.at_bottom
    }

    /// True while the "new content" affordance should be visible.
    pub fn has_new_content_notice(&self) -> bool {
        self.new_content_notice
    }

    /// Records a viewport position report.
    ///
    /// `offset` is the scroll offset, `viewport` the visible height,
    /// `content` the full content height. Returning to the bottom clears the
    /// new-content affordance.
    pub fn observe_position(&mut self, offset: f64, viewport: f64, content: f64) {
        let distance_from_bottom = (content - viewport - offset).max(0.0);
        self.at_bottom = distance_from_bottom <= self.threshold;
        if self.at_bottom {
            self.new_content_notice = false;
        }
    }

    /// Decides what to do after the materialized list grew.
    pub fn on_content_growth(&mut self, user_initiated: bool) -> ScrollDirective {
        if self.at_bottom {
            ScrollDirective::Stick {
                smooth: user_initiated,
            }
        } else {
            self.new_content_notice = true;
            ScrollDirective::Notify
        }
    }

    /// Forces the viewport to the bottom (the affordance was clicked).
    pub fn force_bottom(&mut self) {
        self.at_bottom = true;
        self.new_content_notice = false;
    }
}

impl Default for ScrollArbiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sticks_to_bottom_while_at_bottom() {
        let mut arbiter = ScrollArbiter::new();
        assert_eq!(
            arbiter.on_content_growth(true),
            ScrollDirective::Stick { smooth: true }
        );
        assert_eq!(
            arbiter.on_content_growth(false),
            ScrollDirective::Stick { smooth: false }
        );
        assert!(arbiter.is_at_bottom());
        assert!(!arbiter.has_new_content_notice());
    }

    #[test]
    fn test_scrolled_up_raises_notice_instead_of_scrolling() {
        let mut arbiter = ScrollArbiter::new();
        // 1000px of content, 400px viewport, scrolled to 100: 500px from bottom.
        arbiter.observe_position(100.0, 400.0, 1000.0);
        assert!(!arbiter.is_at_bottom());

        assert_eq!(arbiter.on_content_growth(false), ScrollDirective::Notify);
        assert!(arbiter.has_new_content_notice());
    }

    #[test]
    fn test_returning_to_bottom_clears_notice() {
        let mut arbiter = ScrollArbiter::new();
        arbiter.observe_position(0.0, 400.0, 1000.0);
        arbiter.on_content_growth(false);
        assert!(arbiter.has_new_content_notice());

        arbiter.observe_position(600.0, 400.0, 1000.0);
        assert!(arbiter.is_at_bottom());
        assert!(!arbiter.has_new_content_notice());
    }

    #[test]
    fn test_within_threshold_counts_as_bottom() {
        let mut arbiter = ScrollArbiter::new().with_threshold(40.0);
        arbiter.observe_position(570.0, 400.0, 1000.0); // 30px from bottom
        assert!(arbiter.is_at_bottom());
    }

    #[test]
    fn test_force_bottom() {
        let mut arbiter = ScrollArbiter::new();
        arbiter.observe_position(0.0, 400.0, 1000.0);
        arbiter.on_content_growth(false);

        arbiter.force_bottom();
        assert!(arbiter.is_at_bottom());
        assert!(!arbiter.has_new_content_notice());
    }
}
