//! Logical delays.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use tracing::trace;

use crate::clock::TimerKey;
use crate::config::DelayPolicy;
use crate::scheduler::Scheduler;

enum State {
    Init,
    Yielded,
    Waiting(TimerKey),
    Done,
}

/// Future returned by [`Context::delay`](crate::Context::delay).
///
/// Under [`DelayPolicy::Yield`] the delay is a single scheduling point and
/// the duration only matters for logging. Under
/// [`DelayPolicy::VirtualTime`] the operation blocks on a virtual timer
/// that fires once nothing else can run. A zero delay is a plain yield in
/// both modes.
#[must_use = "futures do nothing unless polled"]
pub struct Delay {
    scheduler: Arc<Scheduler>,
    duration: Duration,
    state: State,
}

impl Delay {
    pub(crate) fn new(scheduler: Arc<Scheduler>, duration: Duration) -> Self {
        Self {
            scheduler,
            duration,
            state: State::Init,
        }
    }

    /// Returns the requested duration.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }
}

impl Future for Delay {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        match self.state {
            State::Init => {
                let timed = self.scheduler.config().delay_policy == DelayPolicy::VirtualTime
                    && !self.duration.is_zero();
                if timed {
                    let key = self.scheduler.register_timer(self.duration, cx.waker());
                    trace!(deadline = ?key.deadline, "delay waiting on timer");
                    self.state = State::Waiting(key);
                } else {
                    trace!(duration = ?self.duration, "delay yielding");
                    self.state = State::Yielded;
                    cx.waker().wake_by_ref();
                }
                Poll::Pending
            }
            State::Yielded => {
                self.state = State::Done;
                Poll::Ready(())
            }
            State::Waiting(key) => {
                if self.scheduler.timer_fired(key) {
                    self.state = State::Done;
                    Poll::Ready(())
                } else {
                    self.scheduler.update_timer(key, cx.waker());
                    Poll::Pending
                }
            }
            State::Done => Poll::Ready(()),
        }
    }
}

impl Drop for Delay {
    fn drop(&mut self) {
        if let State::Waiting(key) = self.state {
            self.scheduler.cancel_timer(key);
        }
    }
}

impl fmt::Debug for Delay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delay")
            .field("duration", &self.duration)
            .finish_non_exhaustive()
    }
}
