//! Waker that marks an operation runnable.

use std::sync::{Arc, Weak};
use std::task::{Wake, Waker};

use super::Scheduler;
use crate::task::OperationId;

/// Waker handed to an operation body while it is polled.
///
/// Holds the scheduler weakly so wakers stored inside the operation table
/// do not keep it alive.
pub(crate) struct OperationWaker {
    scheduler: Weak<Scheduler>,
    id: OperationId,
}

impl OperationWaker {
    pub(crate) fn waker(scheduler: &Arc<Scheduler>, id: OperationId) -> Waker {
        Waker::from(Arc::new(Self {
            scheduler: Arc::downgrade(scheduler),
            id,
        }))
    }
}

impl Wake for OperationWaker {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        if let Some(scheduler) = self.scheduler.upgrade() {
            scheduler.wake(self.id);
        }
    }
}
