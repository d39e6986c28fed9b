/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Action scheduler – deferred and periodic callbacks over a fixed slot pool
//!
//! Module layout:
//!
//! ```text
//! lib.rs
//! ├── action          – callback contract, generational ActionId handle
//! ├── scheduler/      – ActionScheduler: pool, delta timeline, tick engine
//! │   ├── timeline    – slot pool + index-linked chain (no locking)
//! │   └── error       – SchedulerError
//! └── config/         – YAML scenarios for the action-sim driver
//! ```

pub mod action;
pub mod config;
pub mod scheduler;

pub use action::{Action, ActionId, ActionReturn, Millis};
pub use scheduler::{ActionScheduler, SchedulerError, DEFAULT_CAPACITY, MAX_CAPACITY};
