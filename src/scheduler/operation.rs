//! Scheduler-owned operation entries.

use std::any::Any;
use std::future::Future;
use std::pin::Pin;
use std::task::Waker;

use crate::error::{Error, Fault, Result};
use crate::task::{OperationId, OperationInfo, OperationStatus};

/// Type-erased operation body. Resolves to the operation's outcome.
pub(crate) type BoxBody = Pin<Box<dyn Future<Output = Outcome> + Send>>;

/// Terminal outcome of an operation.
pub(crate) enum Outcome {
    Completed(Box<dyn Any + Send>),
    Faulted(Fault),
}

impl Outcome {
    pub(crate) fn status(&self) -> OperationStatus {
        match self {
            Outcome::Completed(_) => OperationStatus::Completed,
            Outcome::Faulted(_) => OperationStatus::Faulted,
        }
    }
}

/// A waiter to notify once the operation is terminal.
pub(crate) struct Continuation {
    /// The waiting operation, `None` when awaited from outside the execution.
    pub waiter: Option<OperationId>,
    pub waker: Waker,
}

/// One row of the operation table.
pub(crate) struct Operation {
    pub info: OperationInfo,
    pub body: Option<BoxBody>,
    pub outcome: Option<Outcome>,
    pub continuations: Vec<Continuation>,
    /// Set when the operation is woken while it is being polled.
    pub woken: bool,
    /// Waker handed to the body on every poll, created on first poll.
    pub waker: Option<Waker>,
    /// Position in the global order of terminal transitions.
    pub completion_seq: Option<u64>,
}

impl Operation {
    pub(crate) fn new(info: OperationInfo, body: Option<BoxBody>) -> Self {
        Self {
            info,
            body,
            outcome: None,
            continuations: Vec::new(),
            woken: false,
            waker: None,
            completion_seq: None,
        }
    }

    pub(crate) fn id(&self) -> OperationId {
        self.info.id
    }

    pub(crate) fn status(&self) -> OperationStatus {
        self.info.status
    }

    /// Registers a waiter.
    ///
    /// One waiter may register several distinct wakers (a body polling
    /// sub-futures with their own wakers); each of them is woken on finish.
    pub(crate) fn add_continuation(&mut self, waiter: Option<OperationId>, waker: &Waker) {
        if self
            .continuations
            .iter()
            .any(|c| c.waiter == waiter && c.waker.will_wake(waker))
        {
            return;
        }
        self.continuations.push(Continuation {
            waiter,
            waker: waker.clone(),
        });
    }

    /// Stores the terminal outcome. Fails if the operation already finished.
    pub(crate) fn finish(&mut self, outcome: Outcome, seq: u64) -> Result<Vec<Continuation>> {
        if self.outcome.is_some() || self.status().is_terminal() {
            return Err(Error::invalid_state(
                self.id(),
                "not yet terminal",
                self.status(),
            ));
        }
        self.info.transition(outcome.status())?;
        self.outcome = Some(outcome);
        self.completion_seq = Some(seq);
        self.body = None;
        self.waker = None;
        Ok(std::mem::take(&mut self.continuations))
    }

    /// Returns a clone of the fault, if the operation faulted.
    pub(crate) fn fault(&self) -> Option<Fault> {
        match &self.outcome {
            Some(Outcome::Faulted(fault)) => Some(fault.clone()),
            _ => None,
        }
    }
}
