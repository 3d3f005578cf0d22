// Copyright 2026 the Stagehand Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Frame and host-time stamps.
//!
//! The stage never reads a clock itself. The frame loop that owns it calls
//! [`Stage::tick`](crate::stage::Stage::tick) with the current [`HostTime`],
//! and the stage counts frames. Grace-period retention can then be expressed
//! either in frames or in host ticks (see [`GracePeriod`]).

use core::fmt;
use core::ops::{Add, Sub};

/// A point in time expressed as monotonic host ticks.
///
/// The tick unit is whatever the embedding frame loop uses (nanoseconds,
/// `mach_absolute_time` ticks, milliseconds...). The stage only compares and
/// adds values.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct HostTime(pub u64);

impl HostTime {
    /// Returns the raw tick value.
    #[inline]
    #[must_use]
    pub const fn ticks(self) -> u64 {
        self.0
    }

    /// Returns the duration between `self` and an earlier time, or zero if
    /// `earlier` is after `self`.
    #[inline]
    #[must_use]
    pub const fn saturating_duration_since(self, earlier: Self) -> Duration {
        Duration(self.0.saturating_sub(earlier.0))
    }

    /// Saturating addition of a duration.
    #[inline]
    #[must_use]
    pub const fn saturating_add(self, duration: Duration) -> Self {
        Self(self.0.saturating_add(duration.0))
    }
}

impl Add<Duration> for HostTime {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Duration) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub for HostTime {
    type Output = Duration;

    #[inline]
    fn sub(self, rhs: Self) -> Duration {
        Duration(self.0 - rhs.0)
    }
}

impl fmt::Debug for HostTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostTime({})", self.0)
    }
}

/// A duration in host ticks.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Duration(pub u64);

impl Duration {
    /// A zero-length duration.
    pub const ZERO: Self = Self(0);

    /// Returns the raw tick value.
    #[inline]
    #[must_use]
    pub const fn ticks(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Duration({})", self.0)
    }
}

/// The stage's notion of "now": a frame counter plus the host time passed to
/// the most recent [`tick`](crate::stage::Stage::tick).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct FrameStamp {
    /// Number of completed ticks.
    pub frame: u64,
    /// Host time of the most recent tick.
    pub time: HostTime,
}

/// How long a detached, destroyed object stays resolvable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GracePeriod {
    /// Reclaim once this many further ticks have completed.
    Frames(u64),
    /// Reclaim once host time has advanced by at least this much.
    Ticks(Duration),
}

/// A point after which a grace period is over.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Deadline {
    /// Expires when the frame counter reaches this value.
    Frame(u64),
    /// Expires when host time reaches this value.
    Time(HostTime),
}

impl GracePeriod {
    /// Converts the period into an absolute deadline starting at `now`.
    #[must_use]
    pub const fn deadline_from(self, now: FrameStamp) -> Deadline {
        match self {
            Self::Frames(n) => Deadline::Frame(now.frame.saturating_add(n)),
            Self::Ticks(d) => Deadline::Time(now.time.saturating_add(d)),
        }
    }
}

impl Deadline {
    /// Returns `true` once `now` has reached the deadline.
    #[must_use]
    pub const fn has_passed(self, now: FrameStamp) -> bool {
        match self {
            Self::Frame(frame) => now.frame >= frame,
            Self::Time(time) => now.time.0 >= time.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_deadline() {
        let start = FrameStamp {
            frame: 10,
            time: HostTime(0),
        };
        let deadline = GracePeriod::Frames(2).deadline_from(start);
        assert_eq!(deadline, Deadline::Frame(12));
        assert!(!deadline.has_passed(FrameStamp {
            frame: 11,
            time: HostTime(999),
        }));
        assert!(deadline.has_passed(FrameStamp {
            frame: 12,
            time: HostTime(0),
        }));
    }

    #[test]
    fn time_deadline_ignores_frames() {
        let start = FrameStamp {
            frame: 0,
            time: HostTime(1_000),
        };
        let deadline = GracePeriod::Ticks(Duration(500)).deadline_from(start);
        assert!(!deadline.has_passed(FrameStamp {
            frame: 100,
            time: HostTime(1_499),
        }));
        assert!(deadline.has_passed(FrameStamp {
            frame: 1,
            time: HostTime(1_500),
        }));
    }

    #[test]
    fn saturating_arithmetic() {
        assert_eq!(
            HostTime(5).saturating_duration_since(HostTime(9)),
            Duration::ZERO
        );
        assert_eq!(HostTime(u64::MAX).saturating_add(Duration(1)).ticks(), u64::MAX);
        assert_eq!(HostTime(9) - HostTime(5), Duration(4));
    }
}
