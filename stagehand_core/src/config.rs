// Copyright 2026 the Stagehand Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Stage configuration.

use kurbo::Rect;

use crate::clock::GracePeriod;
use crate::stage::RetentionPolicy;

/// Configuration for a [`Stage`](crate::stage::Stage).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StageConfig {
    /// Top-level frame that root objects anchor against.
    pub frame: Rect,
    /// Retention policy for objects created without an explicit one.
    pub default_retention: RetentionPolicy,
    /// Pre-register the built-in `group`, `rect`, and `label` types.
    pub builtin_types: bool,
    /// Queue [`ATTACHED`](crate::event::EventType::ATTACHED) and
    /// [`DETACHED`](crate::event::EventType::DETACHED) notifications on tree
    /// mutations. They are delivered by
    /// [`flush_notifications`](crate::stage::Stage::flush_notifications) and
    /// at every [`tick`](crate::stage::Stage::tick).
    pub lifecycle_events: bool,
}

impl StageConfig {
    /// Bare configuration for tests and tools: zero frame, immediate
    /// disposal, no built-in types, no lifecycle notifications.
    #[must_use]
    pub const fn headless() -> Self {
        Self {
            frame: Rect::ZERO,
            default_retention: RetentionPolicy::DisposeImmediately,
            builtin_types: false,
            lifecycle_events: false,
        }
    }

    /// Configuration for an interactive application window of the given
    /// frame: built-in types, lifecycle notifications, and a two-frame grace
    /// period so that handles held by in-flight input survive a destroy.
    #[must_use]
    pub const fn interactive(frame: Rect) -> Self {
        Self {
            frame,
            default_retention: RetentionPolicy::Grace(GracePeriod::Frames(2)),
            builtin_types: true,
            lifecycle_events: true,
        }
    }

    /// Replaces the top-level frame.
    #[must_use]
    pub const fn with_frame(mut self, frame: Rect) -> Self {
        self.frame = frame;
        self
    }

    /// Replaces the default retention policy.
    #[must_use]
    pub const fn with_default_retention(mut self, policy: RetentionPolicy) -> Self {
        self.default_retention = policy;
        self
    }
}

impl Default for StageConfig {
    /// An 800×600 frame with built-in types and immediate disposal.
    fn default() -> Self {
        Self {
            frame: Rect::new(0.0, 0.0, 800.0, 600.0),
            default_retention: RetentionPolicy::DisposeImmediately,
            builtin_types: true,
            lifecycle_events: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets() {
        let headless = StageConfig::headless();
        assert!(!headless.builtin_types);
        assert_eq!(headless.frame, Rect::ZERO);

        let frame = Rect::new(0.0, 0.0, 1280.0, 720.0);
        let interactive = StageConfig::interactive(frame);
        assert!(interactive.lifecycle_events);
        assert_eq!(
            interactive.default_retention,
            RetentionPolicy::Grace(GracePeriod::Frames(2))
        );

        let custom = StageConfig::default()
            .with_frame(frame)
            .with_default_retention(RetentionPolicy::RetainUntilRelease);
        assert_eq!(custom.frame, frame);
        assert_eq!(custom.default_retention, RetentionPolicy::RetainUntilRelease);
    }
}
