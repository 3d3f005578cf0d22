// Copyright 2026 the Stagehand Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Display-object identity.

use core::fmt;

/// Sentinel value meaning "no object" in slot-index fields.
pub const INVALID: u32 = u32::MAX;

/// A handle to a display object owned by a [`Stage`](crate::stage::Stage).
///
/// Contains both a slot index and a generation counter so that stale handles
/// can be detected after an object is freed and its slot is reused. Handles
/// carry no ownership; the stage is the sole owner of every object.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle {
    /// Slot index into the stage's arrays.
    pub(crate) idx: u32,
    /// Generation counter, must equal the stage's generation for this slot.
    pub(crate) generation: u32,
}

impl Handle {
    pub(crate) const fn new(idx: u32, generation: u32) -> Self {
        Self { idx, generation }
    }

    /// Returns the raw slot index (for diagnostics and renderer bookkeeping).
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.idx
    }

    /// Returns the generation counter.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }

    /// Packs the handle into a single integer for scripting hosts.
    ///
    /// The generation occupies the high 32 bits.
    #[inline]
    #[must_use]
    pub const fn to_bits(self) -> u64 {
        ((self.generation as u64) << 32) | self.idx as u64
    }

    /// Inverse of [`to_bits`](Self::to_bits).
    ///
    /// The result is only meaningful to the stage that issued it; resolving
    /// a forged value simply yields "not found".
    #[inline]
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "each half is masked to 32 bits before narrowing"
    )]
    pub const fn from_bits(bits: u64) -> Self {
        Self {
            idx: (bits & 0xFFFF_FFFF) as u32,
            generation: (bits >> 32) as u32,
        }
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({}@gen{})", self.idx, self.generation)
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}@{}", self.idx, self.generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bits_round_trip() {
        let h = Handle::new(17, 3);
        assert_eq!(Handle::from_bits(h.to_bits()), h);
        assert_eq!(h.to_bits() >> 32, 3);
    }

    #[test]
    fn debug_format() {
        use alloc::format;
        assert_eq!(format!("{:?}", Handle::new(2, 5)), "Handle(2@gen5)");
    }
}
