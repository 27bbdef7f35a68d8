//! Operation identity and lifecycle state.

use std::fmt;

use crate::error::{Error, Result};

/// Unique identifier for a controlled operation.
///
/// Ids are assigned in creation order within one controlled execution,
/// starting from zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OperationId(u64);

impl OperationId {
    /// Creates an id from its raw value.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Op({})", self.0)
    }
}

/// The lifecycle state of an operation.
///
/// ```text
/// Created -> Scheduled -> Running -> Blocked <-> Runnable
///                            |                      |
///                            +--> Completed | Faulted <-- (via Running)
/// ```
///
/// `Completed` and `Faulted` are terminal. An operation created already
/// finished (see [`Context::from_result`](crate::runtime::Context::from_result))
/// goes straight from `Created` to a terminal state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationStatus {
    /// Registered but not yet handed to the scheduler.
    Created,
    /// Waiting for its first turn.
    Scheduled,
    /// Currently being polled. At most one operation is running.
    Running,
    /// Suspended until something it waits on changes.
    Blocked,
    /// Eligible to be chosen again.
    Runnable,
    /// Finished with a result.
    Completed,
    /// Finished with a fault.
    Faulted,
}

impl OperationStatus {
    /// Returns true for `Completed` and `Faulted`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Faulted)
    }

    /// Returns true if the scheduler may choose this operation next.
    #[must_use]
    pub fn is_runnable(self) -> bool {
        matches!(self, Self::Scheduled | Self::Runnable)
    }

    /// Returns true if `self -> next` is a legal edge.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        use OperationStatus::{Blocked, Completed, Created, Faulted, Runnable, Running, Scheduled};
        matches!(
            (self, next),
            (Created, Scheduled | Completed | Faulted)
                | (Scheduled | Runnable, Running)
                | (Running, Blocked | Runnable | Completed | Faulted)
                | (Blocked, Runnable)
        )
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationStatus::Created => write!(f, "Created"),
            OperationStatus::Scheduled => write!(f, "Scheduled"),
            OperationStatus::Running => write!(f, "Running"),
            OperationStatus::Blocked => write!(f, "Blocked"),
            OperationStatus::Runnable => write!(f, "Runnable"),
            OperationStatus::Completed => write!(f, "Completed"),
            OperationStatus::Faulted => write!(f, "Faulted"),
        }
    }
}

/// Information about an operation.
#[derive(Clone, Debug)]
pub struct OperationInfo {
    /// The operation's unique identifier.
    pub id: OperationId,
    /// Current state of the operation.
    pub status: OperationStatus,
    /// Optional name for debugging.
    pub name: Option<String>,
    /// Number of times the body has been polled.
    pub poll_count: usize,
}

impl OperationInfo {
    /// Creates new operation info in the `Created` state.
    pub(crate) fn new(id: OperationId) -> Self {
        Self {
            id,
            status: OperationStatus::Created,
            name: None,
            poll_count: 0,
        }
    }

    /// Sets a name for the operation.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Moves the operation to `next`, rejecting illegal edges.
    pub(crate) fn transition(&mut self, next: OperationStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                id: self.id,
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}
