// Copyright 2026 the Stagehand Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Render-plan extraction and damage tracking for stagehand.
//!
//! This crate is the read-only bridge between a
//! [`Stage`](stagehand_core::Stage) and whatever draws it. After the frame
//! loop calls [`Stage::update_layout`](stagehand_core::Stage::update_layout),
//! it provides:
//!
//! - [`RenderItem`]: one visible object with its world geometry
//! - [`RenderPlan`]: the back-to-front list of items for one frame
//! - [`DamageRegion`]: what changed between two plans

#![no_std]
#![cfg_attr(docsrs, feature(doc_cfg))]

extern crate alloc;

mod damage;
mod plan;

pub use damage::DamageRegion;
pub use plan::{RenderItem, RenderPlan};
