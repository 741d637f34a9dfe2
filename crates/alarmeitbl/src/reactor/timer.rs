// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Timer facility.
//!
//! A timer maps an opaque [`TimerId`] to an interval, an optional absolute
//! due time, an optional owner and a callback target. Owned timers call back
//! into their owner [`Handler`](super::Handler) through `on_timer`; global
//! timers carry a boxed closure.
//!
//! A timer is *pending* while it has a due time. Cancelling or firing clears
//! the due time but keeps the entry, so the same id can be re-armed with
//! [`restart`](Timers::restart) or [`reset`](Timers::reset). An entry only
//! goes away when it is discarded or when its owner is destroyed; after that
//! every operation on the id is rejected.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use super::{HandlerId, Reactor};

/// Opaque timer identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl std::fmt::Display for TimerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// Callback of a global (ownerless) timer.
pub type TimerCallback = Box<dyn FnMut(&mut Reactor, TimerId)>;

struct TimerEntry {
    owner: Option<HandlerId>,
    label: String,
    interval: Duration,
    due: Option<Instant>,
    // None while the callback is running
    callback: Option<TimerCallback>,
}

/// A timer that just expired and was removed from the pending set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Expired {
    pub id: TimerId,
    pub owner: Option<HandlerId>,
    pub label: String,
}

/// Collection of all timers of one reactor.
#[derive(Default)]
pub struct Timers {
    entries: HashMap<TimerId, TimerEntry>,
    next_id: u64,
}

impl Timers {
    /// Empty timer set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an unarmed timer.
    pub fn create(
        &mut self,
        owner: Option<HandlerId>,
        label: &str,
        interval: Duration,
        callback: Option<TimerCallback>,
    ) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        self.entries.insert(
            id,
            TimerEntry {
                owner,
                label: label.to_string(),
                interval,
                due: None,
                callback,
            },
        );
        id
    }

    /// Re-arm with the current interval, whether pending or not.
    pub fn restart(&mut self, id: TimerId, now: Instant) -> bool {
        match self.entries.get_mut(&id) {
            Some(entry) => {
                entry.due = Some(now + entry.interval);
                log::trace!("> timer {} {:?}", entry.label, entry.interval);
                true
            }
            None => {
                log::error!("restart of invalidated timer {}", id);
                false
            }
        }
    }

    /// Change the interval and re-arm.
    pub fn reset(&mut self, id: TimerId, interval: Duration, now: Instant) -> bool {
        match self.entries.get_mut(&id) {
            Some(entry) => {
                entry.interval = interval;
                entry.due = Some(now + interval);
                log::trace!("> timer {} {:?}", entry.label, interval);
                true
            }
            None => {
                log::error!("reset of invalidated timer {}", id);
                false
            }
        }
    }

    /// Disarm. Returns false if the timer was not pending.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        match self.entries.get_mut(&id) {
            Some(entry) => match entry.due.take() {
                Some(_) => {
                    log::trace!("- timer {}", entry.label);
                    true
                }
                None => false,
            },
            None => false,
        }
    }

    /// Remove the timer for good.
    pub fn discard(&mut self, id: TimerId) -> bool {
        self.entries.remove(&id).is_some()
    }

    /// Whether the timer is armed.
    pub fn is_pending(&self, id: TimerId) -> bool {
        self.entries.get(&id).is_some_and(|e| e.due.is_some())
    }

    /// Time left until the timer fires, if pending.
    pub fn remaining(&self, id: TimerId, now: Instant) -> Option<Duration> {
        self.entries
            .get(&id)
            .and_then(|e| e.due)
            .map(|due| due.saturating_duration_since(now))
    }

    /// Current interval of a timer.
    pub fn interval(&self, id: TimerId) -> Option<Duration> {
        self.entries.get(&id).map(|e| e.interval)
    }

    /// Cancel and invalidate every timer owned by `owner`.
    pub fn cancel_owned_by(&mut self, owner: HandlerId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| e.owner != Some(owner));
        before - self.entries.len()
    }

    /// Whether any timer is armed.
    pub fn has_pending(&self) -> bool {
        self.entries.values().any(|e| e.due.is_some())
    }

    /// Number of armed timers.
    pub fn pending_count(&self) -> usize {
        self.entries.values().filter(|e| e.due.is_some()).count()
    }

    /// Earliest armed timer, with its label. Ties go to the older timer.
    pub fn next_due(&self) -> Option<(TimerId, Instant, &str)> {
        self.entries
            .iter()
            .filter_map(|(id, e)| e.due.map(|due| (*id, due, e.label.as_str())))
            .min_by_key(|(id, due, _)| (*due, *id))
    }

    /// Disarm and return the earliest timer if it is due at `now`.
    pub(crate) fn take_due(&mut self, now: Instant) -> Option<Expired> {
        let (id, due, _) = self.next_due()?;
        if due > now {
            return None;
        }
        let entry = self.entries.get_mut(&id)?;
        entry.due = None;
        Some(Expired {
            id,
            owner: entry.owner,
            label: entry.label.clone(),
        })
    }

    pub(crate) fn take_callback(&mut self, id: TimerId) -> Option<TimerCallback> {
        self.entries.get_mut(&id).and_then(|e| e.callback.take())
    }

    pub(crate) fn put_callback(&mut self, id: TimerId, callback: TimerCallback) {
        // the timer may have been discarded by its own callback
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.callback = Some(callback);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_create_is_unarmed() {
        let mut timers = Timers::new();
        let t = timers.create(None, "idle", ms(10), None);
        assert!(timers.interval(t).is_some());
        assert!(!timers.is_pending(t));
        assert!(!timers.has_pending());
    }

    #[test]
    fn test_cancel_and_restart() {
        let now = Instant::now();
        let mut timers = Timers::new();
        let t = timers.create(None, "a", ms(50), None);
        assert!(!timers.cancel(t));
        assert!(timers.restart(t, now));
        assert!(timers.is_pending(t));
        assert!(timers.cancel(t));
        assert!(!timers.cancel(t));
        assert!(timers.restart(t, now));
        assert_eq!(timers.remaining(t, now), Some(ms(50)));
    }

    #[test]
    fn test_reset_changes_interval() {
        let now = Instant::now();
        let mut timers = Timers::new();
        let t = timers.create(None, "a", ms(50), None);
        timers.reset(t, ms(5), now);
        assert_eq!(timers.interval(t), Some(ms(5)));
        timers.cancel(t);
        timers.restart(t, now);
        assert_eq!(timers.remaining(t, now), Some(ms(5)));
    }

    #[test]
    fn test_next_due_picks_minimum() {
        let now = Instant::now();
        let mut timers = Timers::new();
        let a = timers.create(None, "a", ms(30), None);
        let b = timers.create(None, "b", ms(10), None);
        let c = timers.create(None, "c", ms(20), None);
        for t in [a, b, c] {
            timers.restart(t, now);
        }
        let (id, _, label) = timers.next_due().unwrap();
        assert_eq!(id, b);
        assert_eq!(label, "b");
    }

    #[test]
    fn test_take_due_only_when_expired() {
        let now = Instant::now();
        let mut timers = Timers::new();
        let t = timers.create(None, "a", ms(10), None);
        timers.restart(t, now);
        assert!(timers.take_due(now).is_none());
        let expired = timers.take_due(now + ms(10)).unwrap();
        assert_eq!(expired.id, t);
        assert!(!timers.is_pending(t));
        // fired timers stay valid and can be re-armed
        assert!(timers.restart(t, now));
    }

    #[test]
    fn test_cancel_owned_by_invalidates() {
        let now = Instant::now();
        let mut timers = Timers::new();
        let owner = HandlerId(7);
        let a = timers.create(Some(owner), "a", ms(10), None);
        let b = timers.create(Some(owner), "b", ms(10), None);
        let g = timers.create(None, "global", ms(10), None);
        timers.restart(a, now);
        assert_eq!(timers.cancel_owned_by(owner), 2);
        assert!(timers.interval(a).is_none());
        assert!(timers.interval(b).is_none());
        assert!(timers.interval(g).is_some());
        assert!(!timers.restart(a, now));
    }
}
