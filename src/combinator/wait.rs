//! The `wait_until` primitive.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use crate::error::Error;
use crate::scheduler::{Scheduler, WaitCondition};
use crate::task::{ControlledTask, OperationId};

/// Collects the ids of `inputs`, rejecting handles from another execution.
pub(crate) fn local_targets<T>(
    scheduler: &Arc<Scheduler>,
    inputs: &[ControlledTask<T>],
) -> Result<Vec<OperationId>, Error> {
    inputs
        .iter()
        .map(|task| {
            if Arc::ptr_eq(task.scheduler(), scheduler) {
                Ok(task.id())
            } else {
                Err(Error::UnknownOperation(task.id()))
            }
        })
        .collect()
}

/// Waits until a predicate over the terminal states of several operations
/// holds.
///
/// While the predicate is false the awaiting operation is registered as a
/// continuation of each target that is still running and stays blocked. It
/// is only re-evaluated after one of them finishes.
#[must_use = "futures do nothing unless polled"]
pub(crate) struct WaitFor {
    scheduler: Arc<Scheduler>,
    targets: Vec<OperationId>,
    condition: WaitCondition,
}

impl WaitFor {
    pub(crate) fn any(scheduler: Arc<Scheduler>, targets: Vec<OperationId>) -> Self {
        Self {
            scheduler,
            targets,
            condition: WaitCondition::Any,
        }
    }

    pub(crate) fn all(scheduler: Arc<Scheduler>, targets: Vec<OperationId>) -> Self {
        Self {
            scheduler,
            targets,
            condition: WaitCondition::All,
        }
    }
}

impl Future for WaitFor {
    type Output = Result<(), Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self
            .scheduler
            .watch(&self.targets, self.condition, cx.waker())
        {
            Ok(true) => Poll::Ready(Ok(())),
            Ok(false) => Poll::Pending,
            Err(e) => Poll::Ready(Err(e)),
        }
    }
}

impl fmt::Debug for WaitFor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaitFor")
            .field("targets", &self.targets)
            .field("condition", &self.condition)
            .finish_non_exhaustive()
    }
}
