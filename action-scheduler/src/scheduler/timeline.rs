/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Fixed slot pool and the delta-encoded timeline threaded through it.
//!
//! The pool is an array of `N` nodes.  Occupied nodes form a doubly linked
//! chain ordered by deadline; links are slot indices, never pointers.  Each
//! chained node stores the delay relative to its predecessor, so the head's
//! delta is "time from now" and the sum of deltas from the head to any node
//! is that node's remaining delay.
//!
//! ```text
//!  head                                 tail
//!   [3] Δ=50  ──►  [0] Δ=50  ──►  [1] Δ=50
//!   due at 50      due at 100     due at 150
//! ```
//!
//! Link conventions:
//! * the head's `prev` and the tail's `next` point at themselves;
//! * a node outside the chain (free, or detached while its action runs)
//!   links to itself in both directions.
//!
//! Nothing here locks.  Every method assumes the caller holds the critical
//! section of the owning [`ActionScheduler`](super::ActionScheduler).

use crate::action::{next_generation, ActionId, ActionReturn, Millis};

// ── Node ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct Node<F, A> {
    /// `None` means the slot is free.
    action: Option<F>,
    arg: Option<A>,
    delta: Millis,
    reload: Millis,
    generation: u8,
    prev: u8,
    next: u8,
}

impl<F, A> Node<F, A> {
    fn vacant(index: u8) -> Self {
        Self {
            action: None,
            arg: None,
            delta: 0,
            reload: 0,
            generation: 0,
            prev: index,
            next: index,
        }
    }
}

/// A head node taken off the timeline by [`Timeline::pop_due`].
///
/// The node keeps its slot (action still set) but is isolated from the chain
/// until [`Timeline::settle`] frees or re-arms it.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Fired<F, A> {
    pub index: u8,
    pub generation: u8,
    pub action: F,
    pub arg: A,
}

/// What [`Timeline::settle`] did with a fired node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Settled {
    /// Slot freed.
    Retired,
    /// Reinserted with its reload interval.
    Rearmed,
    /// Asked to reload with a zero interval; freed instead.
    RetiredZeroReload,
    /// The action unscheduled itself while running; slot left as it was.
    Cancelled,
}

// ── Timeline ──────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub(crate) struct Timeline<F, A, const N: usize> {
    nodes: [Node<F, A>; N],
    head: u8,
    tail: u8,
    active: u16,
    proceeding: Millis,
    high_water: u16,
}

impl<F: Copy, A: Copy, const N: usize> Timeline<F, A, N> {
    pub fn new() -> Self {
        Self {
            nodes: std::array::from_fn(|i| Node::vacant(i as u8)),
            head: 0,
            tail: 0,
            active: 0,
            proceeding: 0,
            high_water: 0,
        }
    }

    fn node(&self, index: u8) -> &Node<F, A> {
        &self.nodes[usize::from(index)]
    }

    fn node_mut(&mut self, index: u8) -> &mut Node<F, A> {
        &mut self.nodes[usize::from(index)]
    }

    // ── Introspection ─────────────────────────────────────────────────────────

    pub fn active(&self) -> u16 {
        self.active
    }

    pub fn high_water(&self) -> u16 {
        self.high_water
    }

    pub fn proceeding(&self) -> Millis {
        self.proceeding
    }

    pub fn reset_proceeding(&mut self) {
        self.proceeding = 0;
    }

    /// Delay until the head is due, `None` when the chain is empty.
    pub fn next_delay(&self) -> Option<Millis> {
        (self.active > 0).then(|| self.node(self.head).delta)
    }

    /// `true` if any occupied slot (chained, or detached and running) holds
    /// an action matching `pred`.
    pub fn any_action(&self, pred: impl Fn(F) -> bool) -> bool {
        self.nodes.iter().any(|n| n.action.is_some_and(&pred))
    }

    // ── Slot pool ─────────────────────────────────────────────────────────────

    /// First free slot after the tail, wrapping; the tail slot itself is
    /// looked at last.
    fn free_slot(&self) -> Option<u8> {
        let start = usize::from(self.tail);
        (1..=N)
            .map(|step| (start + step) % N)
            .find(|&i| self.nodes[i].action.is_none())
            .map(|i| i as u8)
    }

    /// Claim a free slot, arm it and link it into the timeline.
    ///
    /// Returns `None` when every slot is occupied; nothing changes then.
    pub fn allocate(&mut self, action: F, arg: A, delay: Millis, reload: Millis) -> Option<ActionId> {
        let index = self.free_slot()?;
        let node = self.node_mut(index);
        node.generation = next_generation(node.generation);
        node.action = Some(action);
        node.arg = Some(arg);
        node.reload = reload;
        let generation = node.generation;

        self.link(index, delay);
        Some(ActionId::new(index, generation))
    }

    /// Resolve a handle to its slot, if the handle is still current.
    pub fn validate(&self, id: ActionId) -> Option<u8> {
        let index = id.index();
        if usize::from(index) >= N {
            return None;
        }
        let node = self.node(index);
        (node.action.is_some() && node.generation == id.generation()).then_some(index)
    }

    fn release(&mut self, index: u8) {
        let node = self.node_mut(index);
        node.action = None;
        node.arg = None;
    }

    // ── Chain maintenance ─────────────────────────────────────────────────────

    /// Add an isolated node to the chain `delay` from now.
    fn link(&mut self, index: u8, delay: Millis) {
        self.insert(index, delay);
        self.active += 1;
        self.high_water = self.high_water.max(self.active);
    }

    /// Splice `index` into the chain at the position matching `delay`.
    ///
    /// Nodes whose deadline equals the new one stay in front of it, so equal
    /// deadlines fire in insertion order.
    fn insert(&mut self, index: u8, mut delay: Millis) {
        let mut before: Option<u8> = None;
        let mut cursor = (self.active > 0).then_some(self.head);

        while let Some(c) = cursor {
            let d = self.node(c).delta;
            if delay < d {
                break;
            }
            delay -= d;
            before = Some(c);
            cursor = if c == self.tail {
                None
            } else {
                Some(self.node(c).next)
            };
        }

        self.node_mut(index).delta = delay;

        match (before, cursor) {
            // Empty chain
            (None, None) => {
                let node = self.node_mut(index);
                node.prev = index;
                node.next = index;
                self.head = index;
                self.tail = index;
            }
            // New head
            (None, Some(after)) => {
                let node = self.node_mut(index);
                node.prev = index;
                node.next = after;
                let next = self.node_mut(after);
                next.prev = index;
                next.delta -= delay;
                self.head = index;
            }
            // New tail
            (Some(before), None) => {
                let node = self.node_mut(index);
                node.prev = before;
                node.next = index;
                self.node_mut(before).next = index;
                self.tail = index;
            }
            (Some(before), Some(after)) => {
                let node = self.node_mut(index);
                node.prev = before;
                node.next = after;
                self.node_mut(before).next = index;
                let next = self.node_mut(after);
                next.prev = index;
                next.delta -= delay;
            }
        }
    }

    /// `true` if `index` is currently part of the chain.
    fn is_linked(&self, index: u8) -> bool {
        if self.active == 0 {
            return false;
        }
        let node = self.node(index);
        index == self.head || index == self.tail || node.prev != index || node.next != index
    }

    /// Take `index` out of the chain, handing its delta to its successor so
    /// every later deadline is preserved.  No-op for a node that is not
    /// chained.
    fn unlink(&mut self, index: u8) {
        if !self.is_linked(index) {
            return;
        }
        let Node {
            prev, next, delta, ..
        } = *self.node(index);

        if self.active == 1 {
            self.head = index;
            self.tail = index;
        } else if index == self.head {
            let successor = self.node_mut(next);
            successor.prev = next;
            successor.delta += delta;
            self.head = next;
        } else if index == self.tail {
            self.node_mut(prev).next = prev;
            self.tail = prev;
        } else {
            self.node_mut(prev).next = next;
            let successor = self.node_mut(next);
            successor.prev = prev;
            successor.delta += delta;
        }

        let node = self.node_mut(index);
        node.prev = index;
        node.next = index;
        self.active -= 1;
    }

    /// Unlink (if chained) and free a slot.
    ///
    /// Freeing a detached node whose action is currently running is how an
    /// action cancels its own reload.
    pub fn remove(&mut self, index: u8) {
        self.unlink(index);
        self.release(index);
    }

    /// Remove every chained node whose action matches `pred`.
    pub fn remove_matching(&mut self, pred: impl Fn(F) -> bool) -> bool {
        if self.active == 0 {
            return false;
        }
        let mut removed = false;
        let mut cursor = self.head;
        loop {
            // Capture the walk state before the current node is unlinked.
            let next = self.node(cursor).next;
            let last = cursor == self.tail;
            if self.node(cursor).action.is_some_and(&pred) {
                self.remove(cursor);
                removed = true;
            }
            if last {
                break;
            }
            cursor = next;
        }
        removed
    }

    /// Free every slot and forget the chain.  Generations and the
    /// high-water mark are kept, so handles issued before stay stale.
    pub fn clear(&mut self) {
        for (i, node) in self.nodes.iter_mut().enumerate() {
            let generation = node.generation;
            *node = Node::vacant(i as u8);
            node.generation = generation;
        }
        self.head = 0;
        self.tail = 0;
        self.active = 0;
        self.proceeding = 0;
    }

    // ── Tick engine primitives ────────────────────────────────────────────────

    /// Detach the head if it is due within `elapsed`, consuming its delta
    /// from `elapsed`.
    ///
    /// The new head needs no adjustment: its delta was relative to the old
    /// head, which is now "now".
    pub fn pop_due(&mut self, elapsed: &mut Millis) -> Option<Fired<F, A>> {
        if self.active == 0 {
            return None;
        }
        let index = self.head;
        let node = *self.node(index);
        if node.delta > *elapsed {
            return None;
        }
        let (action, arg) = (node.action?, node.arg?);

        *elapsed -= node.delta;
        self.proceeding = self.proceeding.wrapping_add(node.delta);
        self.active -= 1;

        if self.active > 0 {
            let next = node.next;
            self.node_mut(next).prev = next;
            self.head = next;
        }
        let detached = self.node_mut(index);
        detached.prev = index;
        detached.next = index;

        Some(Fired {
            index,
            generation: node.generation,
            action,
            arg,
        })
    }

    /// Apply the disposition returned by a fired action.
    pub fn settle(&mut self, fired: &Fired<F, A>, ret: ActionReturn) -> Settled {
        let node = *self.node(fired.index);
        // Unscheduled from inside the action; the slot may even have been
        // handed to someone else since.
        if node.action.is_none() || node.generation != fired.generation {
            return Settled::Cancelled;
        }
        match ret {
            ActionReturn::OneShot => {
                self.release(fired.index);
                Settled::Retired
            }
            ActionReturn::Reload if node.reload == 0 => {
                self.release(fired.index);
                Settled::RetiredZeroReload
            }
            ActionReturn::Reload => {
                self.link(fired.index, node.reload);
                Settled::Rearmed
            }
        }
    }

    /// Bank time that elapsed without reaching the head.
    ///
    /// Callers must have just seen `pop_due` return `None` under the same
    /// lock, which guarantees `elapsed` is below the head's delta.
    pub fn bank(&mut self, elapsed: Millis) {
        if self.active == 0 {
            return;
        }
        let head = self.head;
        self.node_mut(head).delta -= elapsed;
        self.proceeding = self.proceeding.wrapping_add(elapsed);
    }
}

// ── Test support ──────────────────────────────────────────────────────────────

#[cfg(test)]
impl<F: Copy, A: Copy, const N: usize> Timeline<F, A, N> {
    /// `(slot, absolute deadline)` for every chained node, head first.
    pub fn deadlines(&self) -> Vec<(u8, u64)> {
        let mut out = Vec::new();
        if self.active == 0 {
            return out;
        }
        let mut sum = 0u64;
        let mut cursor = self.head;
        loop {
            sum += u64::from(self.node(cursor).delta);
            out.push((cursor, sum));
            if cursor == self.tail {
                break;
            }
            cursor = self.node(cursor).next;
        }
        out
    }

    /// Walk the chain and verify link symmetry, occupancy and count.
    pub fn check_consistency(&self) -> Result<(), String> {
        if self.active == 0 {
            return Ok(());
        }
        if self.node(self.head).prev != self.head {
            return Err(format!("head {} has a predecessor", self.head));
        }
        if self.node(self.tail).next != self.tail {
            return Err(format!("tail {} has a successor", self.tail));
        }
        let mut seen = 0u16;
        let mut cursor = self.head;
        loop {
            let node = self.node(cursor);
            if node.action.is_none() {
                return Err(format!("chained slot {cursor} is free"));
            }
            seen += 1;
            if seen > self.active {
                return Err(format!("chain longer than active count {}", self.active));
            }
            if cursor == self.tail {
                break;
            }
            if self.node(node.next).prev != cursor {
                return Err(format!("broken back link at slot {}", node.next));
            }
            cursor = node.next;
        }
        if seen != self.active {
            return Err(format!("chain has {seen} nodes, active count {}", self.active));
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    /// Actions are plain tags here; the timeline never calls them.
    type Tl<const N: usize> = Timeline<char, u32, N>;

    fn arm<const N: usize>(tl: &mut Tl<N>, tag: char, delay: Millis) -> ActionId {
        let id = tl.allocate(tag, 0, delay, delay).unwrap();
        tl.check_consistency().unwrap();
        id
    }

    fn order<const N: usize>(tl: &Tl<N>) -> Vec<(char, u64)> {
        tl.deadlines()
            .into_iter()
            .map(|(i, at)| (tl.node(i).action.unwrap(), at))
            .collect()
    }

    // ── insert ────────────────────────────────────────────────────────────────

    #[test]
    fn first_node_becomes_head_and_tail() {
        let mut tl = Tl::<4>::new();
        arm(&mut tl, 'a', 100);
        assert_eq!(order(&tl), vec![('a', 100)]);
        assert_eq!(tl.next_delay(), Some(100));
    }

    #[test]
    fn insert_keeps_deadlines_sorted() {
        let mut tl = Tl::<8>::new();
        arm(&mut tl, 'a', 100);
        arm(&mut tl, 'b', 50);
        arm(&mut tl, 'c', 150);
        arm(&mut tl, 'd', 120);
        assert_eq!(
            order(&tl),
            vec![('b', 50), ('a', 100), ('d', 120), ('c', 150)]
        );
        assert_eq!(tl.next_delay(), Some(50));
    }

    #[test]
    fn equal_deadlines_keep_insertion_order() {
        let mut tl = Tl::<8>::new();
        arm(&mut tl, 'a', 30);
        arm(&mut tl, 'b', 30);
        arm(&mut tl, 'c', 10);
        arm(&mut tl, 'd', 30);
        assert_eq!(
            order(&tl),
            vec![('c', 10), ('a', 30), ('b', 30), ('d', 30)]
        );
    }

    #[test]
    fn zero_delay_goes_behind_due_nodes() {
        let mut tl = Tl::<4>::new();
        arm(&mut tl, 'a', 0);
        arm(&mut tl, 'b', 0);
        assert_eq!(order(&tl), vec![('a', 0), ('b', 0)]);
    }

    // ── remove ────────────────────────────────────────────────────────────────

    #[test]
    fn removing_head_moves_remaining_delta_to_successor() {
        let mut tl = Tl::<4>::new();
        let a = arm(&mut tl, 'a', 40);
        arm(&mut tl, 'b', 100);
        tl.remove(a.index());
        tl.check_consistency().unwrap();
        assert_eq!(order(&tl), vec![('b', 100)]);
        assert_eq!(tl.next_delay(), Some(100));
    }

    #[test]
    fn removing_middle_preserves_later_deadlines() {
        let mut tl = Tl::<4>::new();
        arm(&mut tl, 'a', 10);
        let b = arm(&mut tl, 'b', 20);
        arm(&mut tl, 'c', 35);
        tl.remove(b.index());
        tl.check_consistency().unwrap();
        assert_eq!(order(&tl), vec![('a', 10), ('c', 35)]);
    }

    #[test]
    fn removing_tail_leaves_rest_untouched() {
        let mut tl = Tl::<4>::new();
        arm(&mut tl, 'a', 10);
        let b = arm(&mut tl, 'b', 20);
        tl.remove(b.index());
        tl.check_consistency().unwrap();
        assert_eq!(order(&tl), vec![('a', 10)]);
        assert_eq!(tl.active(), 1);
    }

    #[test]
    fn removing_last_node_empties_chain() {
        let mut tl = Tl::<4>::new();
        let a = arm(&mut tl, 'a', 10);
        tl.remove(a.index());
        assert_eq!(tl.active(), 0);
        assert_eq!(tl.next_delay(), None);
        assert!(tl.validate(a).is_none());
    }

    #[test]
    fn removing_detached_node_only_frees_it() {
        let mut tl = Tl::<4>::new();
        arm(&mut tl, 'a', 10);
        arm(&mut tl, 'b', 20);
        arm(&mut tl, 'c', 30);
        let mut elapsed = 10;
        let fired = tl.pop_due(&mut elapsed).unwrap();

        tl.remove(fired.index);
        tl.check_consistency().unwrap();
        assert_eq!(tl.active(), 2);
        assert_eq!(order(&tl), vec![('b', 10), ('c', 20)]);
        assert_eq!(tl.settle(&fired, ActionReturn::Reload), Settled::Cancelled);
    }

    #[test]
    fn remove_matching_walks_whole_chain() {
        let mut tl = Tl::<8>::new();
        arm(&mut tl, 'x', 10);
        arm(&mut tl, 'y', 20);
        arm(&mut tl, 'x', 30);
        arm(&mut tl, 'x', 40);
        assert!(tl.remove_matching(|a| a == 'x'));
        tl.check_consistency().unwrap();
        assert_eq!(order(&tl), vec![('y', 20)]);
        assert!(!tl.remove_matching(|a| a == 'x'));
    }

    // ── pool ──────────────────────────────────────────────────────────────────

    #[test]
    fn pool_exhaustion_returns_none_without_side_effects() {
        let mut tl = Tl::<2>::new();
        arm(&mut tl, 'a', 10);
        arm(&mut tl, 'b', 20);
        assert!(tl.allocate('c', 0, 5, 5).is_none());
        assert_eq!(order(&tl), vec![('a', 10), ('b', 20)]);
    }

    #[test]
    fn single_slot_pool_is_usable() {
        let mut tl = Tl::<1>::new();
        let a = arm(&mut tl, 'a', 10);
        assert!(tl.allocate('b', 0, 5, 5).is_none());
        tl.remove(a.index());
        let b = arm(&mut tl, 'b', 5);
        assert_eq!(b.index(), a.index());
        assert_ne!(b.generation(), a.generation());
    }

    #[test]
    fn free_slot_search_starts_after_tail() {
        let mut tl = Tl::<4>::new();
        let a = arm(&mut tl, 'a', 10);
        let b = arm(&mut tl, 'b', 20);
        assert_eq!(a.index(), 1);
        assert_eq!(b.index(), 2);
    }

    #[test]
    fn validate_rejects_stale_and_out_of_range_handles() {
        let mut tl = Tl::<4>::new();
        let a = arm(&mut tl, 'a', 10);
        assert_eq!(tl.validate(a), Some(a.index()));
        assert!(tl.validate(ActionId::new(9, a.generation())).is_none());
        assert!(tl.validate(ActionId::new(a.index(), a.generation() + 1)).is_none());
        tl.remove(a.index());
        assert!(tl.validate(a).is_none());
    }

    #[test]
    fn high_water_tracks_peak_and_survives_clear() {
        let mut tl = Tl::<4>::new();
        let a = arm(&mut tl, 'a', 10);
        arm(&mut tl, 'b', 20);
        arm(&mut tl, 'c', 30);
        tl.remove(a.index());
        assert_eq!(tl.high_water(), 3);
        tl.clear();
        assert_eq!(tl.active(), 0);
        assert_eq!(tl.high_water(), 3);
    }

    #[test]
    fn clear_keeps_generations() {
        let mut tl = Tl::<1>::new();
        let a = arm(&mut tl, 'a', 10);
        tl.clear();
        assert!(tl.validate(a).is_none());
        let b = arm(&mut tl, 'b', 10);
        assert_eq!(b.index(), a.index());
        assert_ne!(b, a);
        assert!(tl.validate(a).is_none());
    }

    // ── tick primitives ───────────────────────────────────────────────────────

    #[test]
    fn pop_due_consumes_head_delta() {
        let mut tl = Tl::<4>::new();
        arm(&mut tl, 'a', 10);
        arm(&mut tl, 'b', 25);
        let mut elapsed = 30;

        let first = tl.pop_due(&mut elapsed).unwrap();
        assert_eq!(first.action, 'a');
        assert_eq!(elapsed, 20);
        tl.settle(&first, ActionReturn::OneShot);

        let second = tl.pop_due(&mut elapsed).unwrap();
        assert_eq!(second.action, 'b');
        assert_eq!(elapsed, 5);
        assert!(tl.pop_due(&mut elapsed).is_none());
        assert_eq!(tl.proceeding(), 25);
    }

    #[test]
    fn bank_shortens_head_and_counts_time() {
        let mut tl = Tl::<4>::new();
        arm(&mut tl, 'a', 10);
        arm(&mut tl, 'b', 25);
        let mut elapsed = 4;
        assert!(tl.pop_due(&mut elapsed).is_none());
        tl.bank(elapsed);
        assert_eq!(order(&tl), vec![('a', 6), ('b', 21)]);
        assert_eq!(tl.proceeding(), 4);
    }

    #[test]
    fn settle_reload_reinserts_with_interval() {
        let mut tl = Tl::<4>::new();
        let a = tl.allocate('a', 0, 10, 40).unwrap();
        arm(&mut tl, 'b', 30);
        let mut elapsed = 10;
        let fired = tl.pop_due(&mut elapsed).unwrap();
        assert_eq!(tl.settle(&fired, ActionReturn::Reload), Settled::Rearmed);
        tl.check_consistency().unwrap();
        assert_eq!(order(&tl), vec![('b', 20), ('a', 40)]);
        assert_eq!(tl.validate(a), Some(a.index()));
    }

    #[test]
    fn settle_reload_into_empty_chain_sets_head() {
        let mut tl = Tl::<4>::new();
        tl.allocate('a', 0, 10, 15).unwrap();
        let mut elapsed = 10;
        let fired = tl.pop_due(&mut elapsed).unwrap();
        assert_eq!(tl.next_delay(), None);
        tl.settle(&fired, ActionReturn::Reload);
        tl.check_consistency().unwrap();
        assert_eq!(order(&tl), vec![('a', 15)]);
    }

    #[test]
    fn settle_zero_interval_reload_retires() {
        let mut tl = Tl::<4>::new();
        let a = tl.allocate('a', 0, 0, 0).unwrap();
        let mut elapsed = 0;
        let fired = tl.pop_due(&mut elapsed).unwrap();
        assert_eq!(
            tl.settle(&fired, ActionReturn::Reload),
            Settled::RetiredZeroReload
        );
        assert!(tl.validate(a).is_none());
    }

    #[test]
    fn settle_ignores_slot_reused_during_callback() {
        let mut tl = Tl::<1>::new();
        tl.allocate('a', 0, 0, 10).unwrap();
        let mut elapsed = 0;
        let fired = tl.pop_due(&mut elapsed).unwrap();
        // Action unschedules itself, then schedules into the freed slot.
        tl.remove(fired.index);
        let b = arm(&mut tl, 'b', 50);
        assert_eq!(tl.settle(&fired, ActionReturn::OneShot), Settled::Cancelled);
        assert_eq!(tl.validate(b), Some(b.index()));
        assert_eq!(order(&tl), vec![('b', 50)]);
    }
}
