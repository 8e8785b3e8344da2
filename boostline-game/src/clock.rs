//! Cooperative timer primitive.
//!
//! Every timed behaviour in the engine (effect expiry, cooldown windows, the
//! collapse/respawn cycle) is a tagged continuation parked in a [`Scheduler`].
//! Nothing runs on its own: the owner advances the shared clock once per
//! simulation step and dispatches whatever came due, in due-time order.
//!
//! While a continuation is being dispatched the clock reads exactly its due
//! time, so follow-up timers scheduled from inside the dispatch are anchored
//! to the instant the previous one fired rather than to the frame boundary.
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::trigger::TriggerId;
use crate::vehicle::VehicleId;

/// Cancellation token for a scheduled continuation.
///
/// Handles are never reused, so a stale handle can only ever miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

impl fmt::Display for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer-{}", self.0)
    }
}

/// What to resume when a timer fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuation {
    /// A modifier on the vehicle reached the end of its duration.
    EffectExpired { vehicle: VehicleId },
    /// A trigger's cooldown window closed.
    CooldownElapsed { trigger: TriggerId },
    /// The next step of a trigger's collapse/respawn cycle is due.
    CycleStep { trigger: TriggerId },
}

/// Clock capability consumed by slots and triggers.
pub trait Clock {
    type Tag;

    /// Current simulated time in seconds.
    fn now(&self) -> f64;

    /// Park `tag` until `seconds` from now. Negative or NaN delays fire on the
    /// next advance.
    fn schedule_after(&mut self, seconds: f64, tag: Self::Tag) -> TimerHandle;

    /// Cancel a pending timer. Cancelling a fired or already cancelled timer
    /// is a no-op and returns `false`.
    fn cancel(&mut self, handle: TimerHandle) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Due(f64);

impl Eq for Due {}

impl PartialOrd for Due {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Due {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// A continuation that came due.
#[derive(Debug, Clone, PartialEq)]
pub struct Fired<T> {
    pub handle: TimerHandle,
    pub due: f64,
    pub tag: T,
}

/// Single-threaded timer queue ordered by due time, ties broken by
/// scheduling order.
#[derive(Debug, Clone)]
pub struct Scheduler<T> {
    now: f64,
    next_id: u64,
    queue: BTreeMap<(Due, u64), T>,
    index: HashMap<u64, Due>,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Scheduler<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            now: 0.0,
            next_id: 0,
            queue: BTreeMap::new(),
            index: HashMap::new(),
        }
    }

    /// Number of timers still waiting to fire.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.index.contains_key(&handle.0)
    }

    /// Seconds left before `handle` fires, if it is still pending.
    #[must_use]
    pub fn remaining(&self, handle: TimerHandle) -> Option<f64> {
        self.index
            .get(&handle.0)
            .map(|due| (due.0 - self.now).max(0.0))
    }

    /// Pop the earliest continuation due at or before `until`, moving the
    /// clock to its due time. A non-finite `until` pops nothing.
    pub fn pop_due(&mut self, until: f64) -> Option<Fired<T>> {
        if !until.is_finite() {
            return None;
        }
        let (&(due, id), _) = self.queue.first_key_value()?;
        if due.0 > until {
            return None;
        }
        let tag = self.queue.remove(&(due, id))?;
        self.index.remove(&id);
        if due.0 > self.now {
            self.now = due.0;
        }
        Some(Fired {
            handle: TimerHandle(id),
            due: due.0,
            tag,
        })
    }

    /// Move the clock forward to `until` once everything due has been popped.
    /// Time never runs backwards and never leaves the finite range.
    pub fn settle_at(&mut self, until: f64) {
        if until.is_finite() && until > self.now {
            self.now = until;
        }
    }

    /// Advance by `dt` seconds and return every continuation that came due.
    ///
    /// Convenience for callers that do not schedule from inside a dispatch;
    /// the engine drives [`Scheduler::pop_due`] directly instead.
    pub fn advance(&mut self, dt: f64) -> Vec<Fired<T>> {
        let until = self.now + if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        let mut fired = Vec::new();
        while let Some(next) = self.pop_due(until) {
            fired.push(next);
        }
        self.settle_at(until);
        fired
    }
}

impl<T> Clock for Scheduler<T> {
    type Tag = T;

    fn now(&self) -> f64 {
        self.now
    }

    fn schedule_after(&mut self, seconds: f64, tag: T) -> TimerHandle {
        let delay = if seconds.is_nan() { 0.0 } else { seconds.max(0.0) };
        let id = self.next_id;
        self.next_id += 1;
        let due = Due(self.now + delay);
        self.queue.insert((due, id), tag);
        self.index.insert(id, due);
        TimerHandle(id)
    }

    fn cancel(&mut self, handle: TimerHandle) -> bool {
        let Some(due) = self.index.remove(&handle.0) else {
            return false;
        };
        self.queue.remove(&(due, handle.0)).is_some()
    }
}
