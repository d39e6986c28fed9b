/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Structured error types for the action scheduler.
//!
//! Every failure is local and recoverable: the scheduler state is left
//! exactly as it was before the call.  There is no retry policy; a caller
//! that hits [`SchedulerError::PoolExhausted`] decides for itself whether to
//! try again after the next `advance()`.
//!
//! A missing callback cannot be expressed at all, since an
//! [`Action`](crate::action::Action) is a non-null function pointer.

use thiserror::Error;

use crate::action::ActionId;

/// Error returned by the fallible [`ActionScheduler`](super::ActionScheduler)
/// operations.
///
/// | Variant | Returned by |
/// |---|---|
/// | `PoolExhausted` | `schedule`, `schedule_reload` |
/// | `StaleHandle` | `unschedule` |
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// Every slot of the pool holds an armed or running action.
    #[error("no free slot, all {capacity} slots are in use")]
    PoolExhausted { capacity: usize },

    /// The handle is out of range, its slot is free, or the slot has been
    /// reallocated since the handle was issued.
    #[error("handle {id} is stale or invalid")]
    StaleHandle { id: ActionId },
}
