// Copyright 2026 the Stagehand Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dirty-tracking channel constants.
//!
//! The stage uses multi-channel dirty tracking (via [`understory_dirty`]) to
//! propagate invalidation through the display tree.
//!
//! - **[`LAYOUT`]**: propagating. Every attached child has a dependency edge
//!   on its parent, and marks use
//!   [`EagerPolicy`](understory_dirty::EagerPolicy), so invalidating an
//!   object invalidates its whole subtree (bounds are parent-relative).
//!   Marks are only *recorded* here; the stage drains this channel into its
//!   per-slot cached-bounds flags the next time any bounds are requested and
//!   recomputes those bounds on demand.
//! - **[`TOPOLOGY`]**: local-only. Marked on structural changes (create,
//!   attach, detach, reorder, hide, retain, reclaim). Draining it triggers a
//!   rebuild of the cached draw order.

use understory_dirty::Channel;

/// Anchor rule, frame, content transform, or tree position changed; the
/// cached bounds of the object and all its descendants are stale.
pub const LAYOUT: Channel = Channel::new(0);

/// Tree structure or visibility changed; the draw order must be rebuilt.
pub const TOPOLOGY: Channel = Channel::new(1);
