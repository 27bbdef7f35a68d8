//! The handle operation bodies use to reach their scheduler.

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;

use crate::combinator::{self, Delay, YieldNow};
use crate::error::{Fault, Result};
use crate::scheduler::{Outcome, Scheduler};
use crate::task::{ControlledTask, OperationId, OperationInfo};

/// Entry point to the primitives of one controlled execution.
///
/// A `Context` is handed to the entry closure of
/// [`Runtime::block_on`](crate::Runtime::block_on). Clone it into every body
/// that needs to spawn, wait or delay. It is cheap to clone and is only
/// valid inside the execution it came from.
#[derive(Clone)]
pub struct Context {
    scheduler: Arc<Scheduler>,
}

impl Context {
    pub(crate) fn new(scheduler: Arc<Scheduler>) -> Self {
        Self { scheduler }
    }

    /// Wraps a body so that a panic becomes a fault and registers it.
    fn register<F>(&self, name: Option<String>, body: F) -> OperationId
    where
        F: Future<Output = Outcome> + Send + 'static,
    {
        let body = AssertUnwindSafe(body)
            .catch_unwind()
            .map(|result| match result {
                Ok(outcome) => outcome,
                Err(payload) => Outcome::Faulted(Fault::from_panic(&*payload)),
            });
        self.scheduler.register(name, Box::pin(body))
    }

    fn handle<T>(&self, id: OperationId) -> ControlledTask<T> {
        ControlledTask::new(id, Arc::clone(&self.scheduler))
    }

    // ========================================================================
    // Spawning
    // ========================================================================

    /// Starts a fallible body as a new operation.
    ///
    /// Returns immediately; the body first runs when the decision source
    /// picks it. `Err(e)` or a panic puts the operation into the faulted
    /// state instead of reaching the caller.
    pub fn run<F, T, E>(&self, body: F) -> ControlledTask<T>
    where
        F: Future<Output = std::result::Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Into<Fault>,
    {
        self.run_inner(None, body)
    }

    /// Like [`run`](Self::run), attaching a debug name.
    pub fn run_named<F, T, E>(&self, name: impl Into<String>, body: F) -> ControlledTask<T>
    where
        F: Future<Output = std::result::Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Into<Fault>,
    {
        self.run_inner(Some(name.into()), body)
    }

    fn run_inner<F, T, E>(&self, name: Option<String>, body: F) -> ControlledTask<T>
    where
        F: Future<Output = std::result::Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Into<Fault>,
    {
        let id = self.register(name, async move {
            match body.await {
                Ok(value) => Outcome::Completed(Box::new(value)),
                Err(e) => Outcome::Faulted(e.into()),
            }
        });
        self.handle(id)
    }

    /// Starts an infallible body as a new operation.
    pub fn spawn<F, T>(&self, body: F) -> ControlledTask<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        self.spawn_inner(None, body)
    }

    /// Like [`spawn`](Self::spawn), attaching a debug name.
    pub fn spawn_named<F, T>(&self, name: impl Into<String>, body: F) -> ControlledTask<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        self.spawn_inner(Some(name.into()), body)
    }

    fn spawn_inner<F, T>(&self, name: Option<String>, body: F) -> ControlledTask<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let id = self.register(name, async move { Outcome::Completed(Box::new(body.await)) });
        self.handle(id)
    }

    /// Returns an operation that is already completed with no value.
    #[must_use]
    pub fn completed(&self) -> ControlledTask<()> {
        self.from_result(())
    }

    /// Returns an operation that is already completed with `value`.
    pub fn from_result<T: Send + 'static>(&self, value: T) -> ControlledTask<T> {
        let id = self
            .scheduler
            .register_finished(None, Outcome::Completed(Box::new(value)));
        self.handle(id)
    }

    /// Returns an operation that is already faulted with `fault`.
    pub fn from_fault<T>(&self, fault: impl Into<Fault>) -> ControlledTask<T> {
        let id = self
            .scheduler
            .register_finished(None, Outcome::Faulted(fault.into()));
        self.handle(id)
    }

    // ========================================================================
    // Scheduling points
    // ========================================================================

    /// Lets the decision source switch to another runnable operation.
    pub fn yield_now(&self) -> YieldNow {
        YieldNow::new()
    }

    /// Pauses the current operation for a logical duration.
    ///
    /// See [`DelayPolicy`](crate::DelayPolicy) for how the duration is
    /// interpreted.
    pub fn delay(&self, duration: Duration) -> Delay {
        Delay::new(Arc::clone(&self.scheduler), duration)
    }

    /// Creates an operation that completes with whichever input reached a
    /// terminal state first.
    ///
    /// The node completes with the winning handle itself, so
    /// `winner.id() == input.id()` identifies which one won. If the winner
    /// faulted, the node faults with the winner's own fault. Inputs are
    /// never cancelled. An empty input faults with
    /// [`Error::EmptyCombinator`](crate::Error::EmptyCombinator).
    pub fn when_any<T, I>(&self, inputs: I) -> ControlledTask<ControlledTask<T>>
    where
        T: 'static,
        I: IntoIterator<Item = ControlledTask<T>>,
    {
        let inputs: Vec<_> = inputs.into_iter().collect();
        let scheduler = Arc::clone(&self.scheduler);
        self.run_inner(
            Some("when_any".to_owned()),
            combinator::when_any(scheduler, inputs),
        )
    }

    /// Creates an operation that completes once every input is terminal.
    ///
    /// Values come back in input order. If any input faulted the node
    /// faults with a [`Fault::Aggregate`] of every distinct input fault.
    pub fn when_all<T, I>(&self, inputs: I) -> ControlledTask<Vec<T>>
    where
        T: Clone + Send + 'static,
        I: IntoIterator<Item = ControlledTask<T>>,
    {
        let inputs: Vec<_> = inputs.into_iter().collect();
        let scheduler = Arc::clone(&self.scheduler);
        self.run_inner(
            Some("when_all".to_owned()),
            combinator::when_all(scheduler, inputs),
        )
    }

    // ========================================================================
    // Nondeterministic values
    // ========================================================================

    /// Asks the decision source for a boolean.
    #[must_use]
    pub fn choose_bool(&self) -> bool {
        self.scheduler.choose_bool()
    }

    /// Asks the decision source for an integer in `0..max`.
    ///
    /// `max` of 0 or 1 returns 0 without consulting the decision source.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDecision`](crate::Error::InvalidDecision) if
    /// the decision source answers out of range.
    pub fn choose_int(&self, max: usize) -> Result<usize> {
        self.scheduler.choose_int(max)
    }

    // ========================================================================
    // Observation
    // ========================================================================

    /// Returns the current virtual time.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.scheduler.now()
    }

    /// Returns the id of the operation that is currently running.
    #[must_use]
    pub fn current(&self) -> Option<OperationId> {
        self.scheduler.active()
    }

    /// Returns a snapshot of one operation.
    #[must_use]
    pub fn operation(&self, id: OperationId) -> Option<OperationInfo> {
        self.scheduler.info(id)
    }

    /// Returns a snapshot of every operation created so far.
    #[must_use]
    pub fn operations(&self) -> Vec<OperationInfo> {
        self.scheduler.infos()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("active", &self.scheduler.active())
            .field("steps", &self.scheduler.steps())
            .finish()
    }
}
