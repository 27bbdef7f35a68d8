//! Pending virtual timers.

use std::collections::BTreeMap;
use std::task::Waker;
use std::time::Duration;

/// Identifies a registered timer. Ordered by deadline, then registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerKey {
    /// When the timer fires.
    pub deadline: Duration,
    seq: u64,
}

/// Timers ordered earliest deadline first.
#[derive(Debug, Default)]
pub(crate) struct TimerQueue {
    pending: BTreeMap<TimerKey, Waker>,
    next_seq: u64,
}

impl TimerQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Registers a timer and returns its key.
    pub(crate) fn register(&mut self, deadline: Duration, waker: &Waker) -> TimerKey {
        let key = TimerKey {
            deadline,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.pending.insert(key, waker.clone());
        key
    }

    /// Replaces the waker of a pending timer.
    pub(crate) fn update_waker(&mut self, key: TimerKey, waker: &Waker) {
        if let Some(slot) = self.pending.get_mut(&key) {
            if !slot.will_wake(waker) {
                *slot = waker.clone();
            }
        }
    }

    /// Returns true if the timer is still waiting to fire.
    pub(crate) fn contains(&self, key: TimerKey) -> bool {
        self.pending.contains_key(&key)
    }

    pub(crate) fn remove(&mut self, key: TimerKey) {
        self.pending.remove(&key);
    }

    /// Earliest pending deadline.
    pub(crate) fn next_deadline(&self) -> Option<Duration> {
        self.pending.keys().next().map(|key| key.deadline)
    }

    /// Removes every timer due at or before `now` and returns their wakers.
    pub(crate) fn take_due(&mut self, now: Duration) -> Vec<Waker> {
        let mut due = Vec::new();
        while let Some(entry) = self.pending.first_entry() {
            if entry.key().deadline > now {
                break;
            }
            due.push(entry.remove());
        }
        due
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }

    /// Drops every pending timer.
    pub(crate) fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_earliest_deadline_first() {
        let mut timers = TimerQueue::new();
        let waker = futures::task::noop_waker();

        timers.register(Duration::from_secs(30), &waker);
        timers.register(Duration::from_secs(10), &waker);
        timers.register(Duration::from_secs(20), &waker);

        assert_eq!(timers.next_deadline(), Some(Duration::from_secs(10)));
        assert_eq!(timers.len(), 3);
    }

    #[test]
    fn test_take_due() {
        let mut timers = TimerQueue::new();
        let waker = futures::task::noop_waker();

        let a = timers.register(Duration::from_secs(5), &waker);
        let b = timers.register(Duration::from_secs(5), &waker);
        let c = timers.register(Duration::from_secs(9), &waker);

        assert_eq!(timers.take_due(Duration::from_secs(5)).len(), 2);
        assert!(!timers.contains(a));
        assert!(!timers.contains(b));
        assert!(timers.contains(c));
    }

    #[test]
    fn test_remove() {
        let mut timers = TimerQueue::new();
        let waker = futures::task::noop_waker();

        let key = timers.register(Duration::from_secs(1), &waker);
        timers.update_waker(key, &waker);
        timers.remove(key);

        assert_eq!(timers.len(), 0);
        assert_eq!(timers.next_deadline(), None);
    }

    #[test]
    fn test_same_deadline_keys_are_distinct() {
        let mut timers = TimerQueue::new();
        let waker = futures::task::noop_waker();

        let a = timers.register(Duration::from_secs(1), &waker);
        let b = timers.register(Duration::from_secs(1), &waker);
        assert_ne!(a, b);
        assert!(a < b);
    }
}
