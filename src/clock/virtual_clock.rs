//! `VirtualClock` implementation.

use std::task::Waker;
use std::time::Duration;

use tracing::debug;

use super::timers::{TimerKey, TimerQueue};

/// Virtual time owned by one controlled execution.
///
/// Time is monotonic: it only moves forward, and only when
/// [`fire_next`](VirtualClock::fire_next) is called.
#[derive(Debug)]
pub struct VirtualClock {
    /// Current time as duration since the start of the execution
    now: Duration,
    timers: TimerQueue,
}

impl VirtualClock {
    /// Creates a clock reading `start`.
    #[must_use]
    pub fn new(start: Duration) -> Self {
        Self {
            now: start,
            timers: TimerQueue::new(),
        }
    }

    /// Returns the current virtual time.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Registers a timer firing `after` from now.
    pub fn register(&mut self, after: Duration, waker: &Waker) -> TimerKey {
        let deadline = self.now.saturating_add(after);
        self.timers.register(deadline, waker)
    }

    /// Refreshes the waker of a pending timer.
    pub fn update_waker(&mut self, key: TimerKey, waker: &Waker) {
        self.timers.update_waker(key, waker);
    }

    /// Returns true once the timer has fired.
    #[must_use]
    pub fn has_fired(&self, key: TimerKey) -> bool {
        !self.timers.contains(key) && self.now >= key.deadline
    }

    /// Cancels a pending timer.
    pub fn cancel(&mut self, key: TimerKey) {
        self.timers.remove(key);
    }

    /// Returns the number of pending timers.
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Advances to the earliest pending deadline and returns the wakers of
    /// every timer due at that instant.
    ///
    /// Returns an empty list if no timer is pending.
    pub fn fire_next(&mut self) -> Vec<Waker> {
        let Some(deadline) = self.timers.next_deadline() else {
            return Vec::new();
        };
        if deadline > self.now {
            debug!(from = ?self.now, to = ?deadline, "virtual time advanced");
            self.now = deadline;
        }
        self.timers.take_due(self.now)
    }

    /// Drops every pending timer without firing it.
    pub(crate) fn clear(&mut self) {
        self.timers.clear();
    }
}

impl Default for VirtualClock {
    fn default() -> Self {
        Self::new(Duration::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_clock() {
        let clock = VirtualClock::new(Duration::from_secs(100));
        assert_eq!(clock.now(), Duration::from_secs(100));
        assert_eq!(clock.pending_timers(), 0);
    }

    #[test]
    fn test_fire_next_jumps_to_deadline() {
        let mut clock = VirtualClock::default();
        let waker = futures::task::noop_waker();

        let late = clock.register(Duration::from_secs(60), &waker);
        let early = clock.register(Duration::from_secs(10), &waker);

        assert_eq!(clock.fire_next().len(), 1);
        assert_eq!(clock.now(), Duration::from_secs(10));
        assert!(clock.has_fired(early));
        assert!(!clock.has_fired(late));

        assert_eq!(clock.fire_next().len(), 1);
        assert_eq!(clock.now(), Duration::from_secs(60));
        assert!(clock.has_fired(late));
    }

    #[test]
    fn test_fire_next_groups_equal_deadlines() {
        let mut clock = VirtualClock::default();
        let waker = futures::task::noop_waker();

        clock.register(Duration::from_secs(1), &waker);
        clock.register(Duration::from_secs(1), &waker);
        clock.register(Duration::from_secs(2), &waker);

        assert_eq!(clock.fire_next().len(), 2);
        assert_eq!(clock.pending_timers(), 1);
    }

    #[test]
    fn test_fire_next_without_timers() {
        let mut clock = VirtualClock::default();
        assert!(clock.fire_next().is_empty());
        assert_eq!(clock.now(), Duration::ZERO);
    }

    #[test]
    fn test_zero_delay_is_due_immediately() {
        let mut clock = VirtualClock::new(Duration::from_secs(3));
        let waker = futures::task::noop_waker();

        let key = clock.register(Duration::ZERO, &waker);
        assert!(!clock.has_fired(key));
        assert_eq!(clock.fire_next().len(), 1);
        assert_eq!(clock.now(), Duration::from_secs(3));
        assert!(clock.has_fired(key));
    }

    #[test]
    fn test_cancel() {
        let mut clock = VirtualClock::default();
        let waker = futures::task::noop_waker();

        let key = clock.register(Duration::from_secs(1), &waker);
        clock.cancel(key);
        assert_eq!(clock.pending_timers(), 0);
        assert!(clock.fire_next().is_empty());
    }
}
