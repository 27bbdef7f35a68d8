//! Handles to controlled operations.

use std::fmt;
use std::future::{Future, IntoFuture};
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tracing::warn;

use super::{OperationId, OperationStatus};
use crate::error::{Error, Fault, Result};
use crate::scheduler::{Scheduler, WaitCondition};

/// Handle to an operation of a controlled execution.
///
/// The handle does not own the operation; it reads state through the
/// scheduler. Awaiting it (or [`join`](Self::join)) suspends the current
/// operation until the target is terminal and yields the target's value or
/// its captured [`Fault`].
///
/// # Example
///
/// ```rust
/// use testkit_controlled::Runtime;
///
/// let runtime = Runtime::default();
/// let value = runtime
///     .block_on(|ctx| async move {
///         let task = ctx.spawn(async { 21 * 2 });
///         let value = task.clone().await?;
///         assert!(task.is_completed());
///         Ok::<_, testkit_controlled::Fault>(value)
///     })
///     .unwrap();
///
/// assert_eq!(value, 42);
/// ```
pub struct ControlledTask<T> {
    id: OperationId,
    scheduler: Arc<Scheduler>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ControlledTask<T> {
    pub(crate) fn new(id: OperationId, scheduler: Arc<Scheduler>) -> Self {
        Self {
            id,
            scheduler,
            _marker: PhantomData,
        }
    }

    pub(crate) fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    /// Returns the operation's id.
    #[must_use]
    pub fn id(&self) -> OperationId {
        self.id
    }

    /// Returns the operation's current status.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownOperation`](crate::Error::UnknownOperation) if
    /// the scheduler has no record of the operation.
    pub fn try_status(&self) -> Result<OperationStatus> {
        self.scheduler.status(self.id)
    }

    /// Returns the operation's current status.
    ///
    /// Reports `Created` if the operation cannot be found; see
    /// [`try_status`](Self::try_status) to observe that case.
    #[must_use]
    pub fn status(&self) -> OperationStatus {
        self.try_status().unwrap_or_else(|e| {
            warn!(id = %self.id, error = %e, "status lookup failed");
            OperationStatus::Created
        })
    }

    /// Returns true if the operation completed successfully.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status() == OperationStatus::Completed
    }

    /// Returns true if the operation faulted.
    #[must_use]
    pub fn is_faulted(&self) -> bool {
        self.status() == OperationStatus::Faulted
    }

    /// Returns true if the operation completed or faulted.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    /// Returns the debug name given at spawn time.
    #[must_use]
    pub fn name(&self) -> Option<String> {
        self.scheduler.info(self.id).and_then(|info| info.name)
    }

    /// Returns the captured cause of a faulted operation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`](crate::Error::InvalidState) unless the
    /// operation is [`Faulted`](OperationStatus::Faulted).
    pub fn fault(&self) -> Result<Fault> {
        self.scheduler.fault(self.id)
    }

    /// Awaits the operation without consuming the handle.
    #[must_use]
    pub fn join(&self) -> Join<T> {
        Join {
            task: self.clone(),
        }
    }
}

impl<T: Clone + 'static> ControlledTask<T> {
    /// Returns a clone of the operation's result.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`](crate::Error::InvalidState) unless the
    /// operation is [`Completed`](OperationStatus::Completed).
    pub fn result(&self) -> Result<T> {
        self.scheduler.result(self.id)
    }
}

impl<T> Clone for ControlledTask<T> {
    fn clone(&self) -> Self {
        Self::new(self.id, Arc::clone(&self.scheduler))
    }
}

impl<T> PartialEq for ControlledTask<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && Arc::ptr_eq(&self.scheduler, &other.scheduler)
    }
}

impl<T> Eq for ControlledTask<T> {}

impl<T> fmt::Debug for ControlledTask<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlledTask")
            .field("id", &self.id)
            .field("status", &self.status())
            .finish()
    }
}

impl<T: Clone + 'static> IntoFuture for ControlledTask<T> {
    type Output = std::result::Result<T, Fault>;
    type IntoFuture = Join<T>;

    fn into_future(self) -> Self::IntoFuture {
        Join { task: self }
    }
}

/// Future returned by [`ControlledTask::join`].
///
/// Resolves once the operation is terminal. If the target is still running
/// the awaiting operation is registered as its continuation and blocks.
///
/// A `Join` only works inside the execution its task belongs to; polled
/// anywhere else it resolves to an
/// [`Error::UnknownOperation`](crate::Error::UnknownOperation) fault.
#[must_use = "futures do nothing unless polled"]
pub struct Join<T> {
    task: ControlledTask<T>,
}

impl<T: Clone + 'static> Future for Join<T> {
    type Output = std::result::Result<T, Fault>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let task = &self.task;
        // Only the owning scheduler has an active operation while polling.
        if task.scheduler.active().is_none() {
            return Poll::Ready(Err(Fault::new(Error::UnknownOperation(task.id))));
        }
        match task
            .scheduler
            .watch(&[task.id], WaitCondition::Any, cx.waker())
        {
            Ok(true) => Poll::Ready(
                task.scheduler
                    .outcome(task.id)
                    .unwrap_or_else(|e| Err(Fault::new(e))),
            ),
            Ok(false) => Poll::Pending,
            Err(e) => Poll::Ready(Err(Fault::new(e))),
        }
    }
}

impl<T> fmt::Debug for Join<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Join").field("id", &self.task.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::decision::{Fifo, Recorder};
    use crate::scheduler::Outcome;
    use parking_lot::Mutex;

    fn scheduler() -> Arc<Scheduler> {
        Scheduler::new(
            Config::default(),
            Arc::new(Mutex::new(Recorder::new(Box::new(Fifo)))),
        )
    }

    #[test]
    fn test_handle_observers_on_completed() {
        let sched = scheduler();
        let id = sched.register_finished(
            Some("five".into()),
            Outcome::Completed(Box::new(5_u8)),
        );
        let task: ControlledTask<u8> = ControlledTask::new(id, Arc::clone(&sched));

        assert!(task.is_completed());
        assert!(!task.is_faulted());
        assert!(task.is_terminal());
        assert_eq!(task.result().unwrap(), 5);
        assert_eq!(task.name().as_deref(), Some("five"));
        assert!(matches!(task.fault(), Err(Error::InvalidState { .. })));
    }

    #[test]
    fn test_handle_observers_on_faulted() {
        let sched = scheduler();
        let fault = Fault::panic("boom");
        let id = sched.register_finished(None, Outcome::Faulted(fault.clone()));
        let task: ControlledTask<u8> = ControlledTask::new(id, sched);

        assert!(task.is_faulted());
        assert!(task.fault().unwrap().same_cause(&fault));
        assert!(matches!(
            task.result(),
            Err(Error::InvalidState {
                actual: OperationStatus::Faulted,
                ..
            })
        ));
    }

    #[test]
    fn test_handle_equality_is_per_scheduler() {
        let a = scheduler();
        let b = scheduler();
        let id_a = a.register_finished(None, Outcome::Completed(Box::new(())));
        let id_b = b.register_finished(None, Outcome::Completed(Box::new(())));
        let task_a: ControlledTask<()> = ControlledTask::new(id_a, a);
        let task_b: ControlledTask<()> = ControlledTask::new(id_b, b);

        assert_eq!(task_a.id(), task_b.id());
        assert_ne!(task_a, task_b);
        assert_eq!(task_a, task_a.clone());
    }

    #[test]
    fn test_try_status_reports_unknown_operation() {
        let sched = scheduler();
        let id = sched.register_finished(None, Outcome::Completed(Box::new(())));
        let known: ControlledTask<()> = ControlledTask::new(id, Arc::clone(&sched));
        let unknown: ControlledTask<()> = ControlledTask::new(OperationId::new(42), sched);

        assert_eq!(known.try_status().unwrap(), OperationStatus::Completed);
        assert!(matches!(
            unknown.try_status(),
            Err(Error::UnknownOperation(id)) if id == OperationId::new(42)
        ));
        assert_eq!(unknown.status(), OperationStatus::Created);
    }

    #[test]
    fn test_join_outside_execution_is_rejected() {
        let sched = scheduler();
        let id = sched.register_finished(None, Outcome::Completed(Box::new(9_i64)));
        let task: ControlledTask<i64> = ControlledTask::new(id, sched);

        let waker = futures::task::noop_waker();
        let mut cx = Context::from_waker(&waker);
        let mut join = task.join();
        match Pin::new(&mut join).poll(&mut cx) {
            Poll::Ready(Err(fault)) => assert!(matches!(
                fault.downcast_ref::<Error>(),
                Some(Error::UnknownOperation(_))
            )),
            other => panic!("unexpected poll result: {other:?}"),
        }
    }
}
