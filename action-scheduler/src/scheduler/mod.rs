/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Deferred callback scheduler over a fixed slot pool.
//!
//! [`ActionScheduler`] runs an [`Action`] once or periodically after a
//! relative delay.  All bookkeeping lives in a pre-allocated array of `N`
//! slots; nothing is allocated after construction.
//!
//! # Critical section discipline
//!
//! Every structural change (allocating a slot, splicing the timeline,
//! counters) happens while holding the scheduler's lock, which stands in for
//! "interrupts disabled".  The one exception is the action itself: during
//! [`advance`](ActionScheduler::advance) the due node is detached from the
//! timeline first, then the lock is released for the call.  An action, or
//! any interrupt/thread that runs while it executes, may therefore call
//! `schedule`, `schedule_reload` or `unschedule` freely, including on the
//! very node that is firing.
//!
//! The lock type is the `R` parameter, a [`RawMutex`].  Hosted
//! builds use `parking_lot::RawMutex`; a bare-metal port supplies one that
//! masks interrupts.
//!
//! # Example
//! ```rust
//! use action_scheduler::{ActionReturn, ActionScheduler};
//!
//! type Sched = ActionScheduler<u32, 8>;
//!
//! fn blink(_: &Sched, led: u32) -> ActionReturn {
//!     println!("toggle led {led}");
//!     ActionReturn::Reload
//! }
//!
//! let sched = Sched::new();
//! sched.schedule_reload(100, 500, blink, 3).unwrap();
//! assert_eq!(sched.next_delay(), Some(100));
//! assert!(sched.advance(100));
//! assert_eq!(sched.next_delay(), Some(500));
//! ```

pub mod error;
mod timeline;

pub use error::SchedulerError;

use std::fmt;

use parking_lot::lock_api::{Mutex, RawMutex};
use tracing::{debug, trace, warn};

use crate::action::{same_action, Action, ActionId, ActionReturn, Millis};

use timeline::{Settled, Timeline};

// ── Constants ─────────────────────────────────────────────────────────────────

/// Largest supported pool: a slot index has to fit in the low byte of an
/// [`ActionId`].
pub const MAX_CAPACITY: usize = 255;

/// Pool size used by the `action-sim` driver.
pub const DEFAULT_CAPACITY: usize = 64;

// ── ActionScheduler ───────────────────────────────────────────────────────────

/// Caller-owned scheduler with `N` slots and argument type `A`.
///
/// Several independent instances may coexist, each with its own pool and
/// timeline.  The scheduler is `Sync` whenever `A: Send`, so a shared
/// reference can be handed to an interrupt context or another thread.
pub struct ActionScheduler<A, const N: usize, R = parking_lot::RawMutex> {
    state: Mutex<R, Timeline<Action<A, N, R>, A, N>>,
}

impl<A: Copy, const N: usize, R: RawMutex> ActionScheduler<A, N, R> {
    const VALID_CAPACITY: () = assert!(
        N > 0 && N <= MAX_CAPACITY,
        "ActionScheduler capacity must be between 1 and 255 slots"
    );

    /// Create a scheduler with every slot free.
    pub fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::VALID_CAPACITY;
        Self {
            state: Mutex::new(Timeline::new()),
        }
    }

    /// Number of slots in the pool.
    pub fn capacity(&self) -> usize {
        N
    }

    // ── Scheduling ────────────────────────────────────────────────────────────

    /// Run `action(arg)` once, `delay` milliseconds from now.
    ///
    /// If the action returns [`ActionReturn::Reload`] it is re-armed with
    /// `delay` as its interval.
    ///
    /// # Errors
    /// [`SchedulerError::PoolExhausted`] if no slot is free.
    pub fn schedule(
        &self,
        delay: Millis,
        action: Action<A, N, R>,
        arg: A,
    ) -> Result<ActionId, SchedulerError> {
        self.arm(delay, delay, action, arg)
    }

    /// Run `action(arg)` after `delay`, then every `reload` milliseconds for
    /// as long as it returns [`ActionReturn::Reload`].
    ///
    /// A `reload` of 0 is accepted; if the action then asks to be reloaded it
    /// is retired instead, with a warning.
    ///
    /// # Errors
    /// [`SchedulerError::PoolExhausted`] if no slot is free.
    pub fn schedule_reload(
        &self,
        delay: Millis,
        reload: Millis,
        action: Action<A, N, R>,
        arg: A,
    ) -> Result<ActionId, SchedulerError> {
        self.arm(delay, reload, action, arg)
    }

    fn arm(
        &self,
        delay: Millis,
        reload: Millis,
        action: Action<A, N, R>,
        arg: A,
    ) -> Result<ActionId, SchedulerError> {
        let id = self.state.lock().allocate(action, arg, delay, reload);
        match id {
            Some(id) => {
                trace!(%id, delay, reload, "action armed");
                Ok(id)
            }
            None => {
                debug!(capacity = N, delay, "slot pool exhausted");
                Err(SchedulerError::PoolExhausted { capacity: N })
            }
        }
    }

    /// Cancel the action behind `id` and reset `id` to
    /// [`ActionId::INVALID`].
    ///
    /// Works on an action that is currently running too: a periodic action
    /// that unschedules itself is not re-armed, whatever it returns.
    ///
    /// # Errors
    /// [`SchedulerError::StaleHandle`] if the action already fired, was
    /// cancelled, or its slot has been reused.  `id` is left untouched.
    pub fn unschedule(&self, id: &mut ActionId) -> Result<(), SchedulerError> {
        {
            let mut state = self.state.lock();
            match state.validate(*id) {
                Some(index) => state.remove(index),
                None => {
                    drop(state);
                    debug!(id = %id, "unschedule of stale handle");
                    return Err(SchedulerError::StaleHandle { id: *id });
                }
            }
        }
        trace!(id = %id, "action unscheduled");
        *id = ActionId::INVALID;
        Ok(())
    }

    /// Cancel every armed instance of `action`.
    ///
    /// Returns `true` if at least one was removed.  An instance that is
    /// running right now is not on the timeline and is left alone.
    pub fn unschedule_all(&self, action: Action<A, N, R>) -> bool {
        let removed = self
            .state
            .lock()
            .remove_matching(|a| same_action(a, action));
        if removed {
            trace!("matching actions unscheduled");
        }
        removed
    }

    /// Free every slot and reset the timeline and the proceeding time.
    ///
    /// Handles issued before the call are stale afterwards.  The high-water
    /// mark is kept.
    pub fn clear(&self) {
        self.state.lock().clear();
        debug!("scheduler cleared");
    }

    // ── Tick engine ───────────────────────────────────────────────────────────

    /// Move time forward by `elapsed` milliseconds and run everything that
    /// became due, in deadline order (insertion order for ties).
    ///
    /// Time left over after the last due action is banked against the next
    /// one, so calling this at irregular intervals does not drift.
    ///
    /// Returns `true` if at least one action ran.
    pub fn advance(&self, elapsed: Millis) -> bool {
        let mut remaining = elapsed;
        let mut fired_any = false;

        loop {
            let fired = {
                let mut state = self.state.lock();
                match state.pop_due(&mut remaining) {
                    Some(fired) => fired,
                    None => {
                        // Same critical section as the due check: nothing
                        // may become the head before the leftover is banked.
                        state.bank(remaining);
                        break;
                    }
                }
            };

            trace!(slot = fired.index, "action firing");
            let ret = (fired.action)(self, fired.arg);
            fired_any = true;

            let settled = self.state.lock().settle(&fired, ret);
            match settled {
                Settled::RetiredZeroReload => warn!(
                    slot = fired.index,
                    "action asked to reload with a zero interval; retired instead"
                ),
                Settled::Cancelled => trace!(slot = fired.index, "action cancelled itself"),
                Settled::Retired | Settled::Rearmed => {}
            }
        }

        fired_any
    }

    // ── Introspection ─────────────────────────────────────────────────────────

    /// Time until the next action is due, or `None` when nothing is armed
    /// and the driver may sleep without bound.
    pub fn next_delay(&self) -> Option<Millis> {
        self.state.lock().next_delay()
    }

    /// Total time consumed by `advance` since construction or the last
    /// [`clear_proceeding_time`](Self::clear_proceeding_time).
    ///
    /// Time that passes while the timeline is empty is not counted.  Wraps
    /// at `u32::MAX`.
    pub fn proceeding_time(&self) -> Millis {
        self.state.lock().proceeding()
    }

    /// Reset [`proceeding_time`](Self::proceeding_time) to 0.
    pub fn clear_proceeding_time(&self) {
        self.state.lock().reset_proceeding();
    }

    /// `true` if any slot holds `action`, including one that is running.
    pub fn is_armed(&self, action: Action<A, N, R>) -> bool {
        self.state.lock().any_action(|a| same_action(a, action))
    }

    /// Highest number of simultaneously armed actions seen so far.
    pub fn high_water_mark(&self) -> usize {
        usize::from(self.state.lock().high_water())
    }

    /// Number of actions currently on the timeline.
    pub fn active_count(&self) -> usize {
        usize::from(self.state.lock().active())
    }

    /// `true` when nothing is armed.
    pub fn is_idle(&self) -> bool {
        self.active_count() == 0
    }
}

impl<A: Copy, const N: usize, R: RawMutex> Default for ActionScheduler<A, N, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Copy, const N: usize, R: RawMutex> fmt::Debug for ActionScheduler<A, N, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("ActionScheduler");
        s.field("capacity", &N);
        match self.state.try_lock() {
            Some(state) => s
                .field("active", &state.active())
                .field("next_delay", &state.next_delay()),
            None => s.field("state", &"<locked>"),
        };
        s.finish()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
