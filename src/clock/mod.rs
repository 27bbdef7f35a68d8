//! Virtual time for controlled executions
//!
//! Each scheduler owns a [`VirtualClock`]. It never reads real time: time
//! only moves when the scheduler has nothing runnable and a timer is
//! pending, at which point it jumps straight to the earliest deadline.
//!
//! # Example
//!
//! ```rust
//! use testkit_controlled::clock::VirtualClock;
//! use std::time::Duration;
//!
//! let mut clock = VirtualClock::new(Duration::ZERO);
//! let waker = futures::task::noop_waker();
//! clock.register(Duration::from_secs(5), &waker);
//!
//! assert_eq!(clock.fire_next().len(), 1);
//! assert_eq!(clock.now(), Duration::from_secs(5));
//! ```

mod timers;
mod virtual_clock;

pub use timers::TimerKey;
pub use virtual_clock::VirtualClock;
