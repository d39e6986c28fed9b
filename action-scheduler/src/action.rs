/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Core value types shared by the scheduler and its callers.
//!
//! ```text
//! caller ──(Action, arg, delay)──►  ActionScheduler  ──►  ActionId (index | generation << 8)
//!                                         │
//!                       advance() ──► Action(&scheduler, arg) ──► ActionReturn
//! ```
//!
//! # Callback model
//! An [`Action`] is a plain function pointer.  It receives the scheduler that
//! fired it (so it can chain further work without any global instance) and
//! the caller-defined argument that was stored at schedule time.  The
//! argument is opaque to the scheduler; any `Copy` value works: an integer
//! tag, a `&'static` reference to caller state, an index into a table.
//!
//! Function pointers are compared by address when looking up an action
//! ([`is_armed`], [`unschedule_all`]).
//!
//! [`is_armed`]: crate::scheduler::ActionScheduler::is_armed
//! [`unschedule_all`]: crate::scheduler::ActionScheduler::unschedule_all

use std::fmt;

use crate::scheduler::ActionScheduler;

/// Relative duration in milliseconds.
pub type Millis = u32;

// ── Callback contract ─────────────────────────────────────────────────────────

/// What the scheduler should do with a node after its action has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActionReturn {
    /// Free the slot.
    #[default]
    OneShot,
    /// Re-arm the node with its reload interval, keeping the same handle.
    Reload,
}

/// A deferred callback.
///
/// `R` is the critical-section primitive of the scheduler; see
/// [`ActionScheduler`].
pub type Action<A, const N: usize, R = parking_lot::RawMutex> =
    fn(&ActionScheduler<A, N, R>, A) -> ActionReturn;

/// Address identity of an action.
pub(crate) fn same_action<A, const N: usize, R>(
    a: Action<A, N, R>,
    b: Action<A, N, R>,
) -> bool {
    a as usize == b as usize
}

// ── Handle ────────────────────────────────────────────────────────────────────

/// Generational handle to a scheduled action.
///
/// Packs the slot index into the low byte and the slot's generation into the
/// high byte.  A handle stays valid only while the slot still carries the same
/// generation; once the action fires (one-shot) or is unscheduled, the handle
/// goes stale and any further use of it is rejected.
///
/// The generation is a single byte, so after 255 reuses of the same slot an
/// old handle can alias a new occupant.  Generation `0` is never issued,
/// which keeps every live handle distinct from [`ActionId::INVALID`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ActionId(u16);

impl ActionId {
    /// The handle that never refers to any slot.
    pub const INVALID: ActionId = ActionId(0);

    pub(crate) fn new(index: u8, generation: u8) -> Self {
        ActionId(u16::from(index) | (u16::from(generation) << 8))
    }

    /// Rebuild a handle from its packed 16-bit form.
    pub fn from_raw(raw: u16) -> Self {
        ActionId(raw)
    }

    /// The packed 16-bit form, e.g. for handing across an FFI boundary.
    pub fn into_raw(self) -> u16 {
        self.0
    }

    /// Slot index encoded in the handle.
    pub fn index(self) -> u8 {
        (self.0 & 0xff) as u8
    }

    /// Slot generation encoded in the handle.
    pub fn generation(self) -> u8 {
        (self.0 >> 8) as u8
    }

    /// `false` only for [`ActionId::INVALID`].
    ///
    /// A `true` result says nothing about whether the action is still armed;
    /// only the scheduler can answer that.
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

impl fmt::Debug for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "ActionId({}@{})", self.index(), self.generation())
        } else {
            write!(f, "ActionId(INVALID)")
        }
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}@{}", self.index(), self.generation())
    }
}

/// Next generation for a slot being (re)allocated, skipping zero.
pub(crate) fn next_generation(current: u8) -> u8 {
    match current.wrapping_add(1) {
        0 => 1,
        g => g,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
