//! Error definitions
//!
//! Two kinds of failure exist in a controlled execution:
//!
//! - [`Error`] describes problems with the execution itself (deadlocks,
//!   misuse of an operation handle, bad decisions).
//! - [`Fault`] is the captured cause stored on a single operation that
//!   failed. It is what bodies return through `Err(..)` and what observers
//!   read back through [`ControlledTask::fault`](crate::task::ControlledTask::fault).

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::task::{OperationId, OperationStatus};

/// Main error type for testkit-controlled
#[derive(Error, Debug)]
pub enum Error {
    /// An observer was called before the operation reached the matching state,
    /// or an operation was finished twice.
    #[error("{id} is {actual}, expected {expected}")]
    InvalidState {
        /// The operation that was observed.
        id: OperationId,
        /// The state the caller required.
        expected: &'static str,
        /// The state the operation was actually in.
        actual: OperationStatus,
    },

    /// The scheduler was asked to move an operation along an illegal edge.
    #[error("{id} cannot move from {from} to {to}")]
    InvalidTransition {
        /// The operation being moved.
        id: OperationId,
        /// Current state.
        from: OperationStatus,
        /// Requested state.
        to: OperationStatus,
    },

    /// The id does not belong to this controlled execution.
    #[error("{0} is not part of this execution")]
    UnknownOperation(OperationId),

    /// Nothing is runnable while at least one operation is still blocked.
    #[error("Deadlock detected: {} operation(s) blocked, none runnable", .blocked.len())]
    Deadlock {
        /// Operations that can no longer make progress.
        blocked: Vec<OperationId>,
    },

    /// The execution ran for too many scheduling steps.
    #[error("Execution ran for {0} steps without completing")]
    StepLimitExceeded(usize),

    /// The decision source returned a value outside of the offered choices.
    #[error("Invalid decision: {0}")]
    InvalidDecision(String),

    /// `when_any` was called without any operation to wait for.
    #[error("when_any requires at least one operation")]
    EmptyCombinator,

    /// The entry operation of the execution faulted.
    #[error("Entry operation faulted: {0}")]
    Faulted(Fault),
}

impl Error {
    /// Create an invalid state error.
    #[must_use]
    pub fn invalid_state(id: OperationId, expected: &'static str, actual: OperationStatus) -> Self {
        Self::InvalidState {
            id,
            expected,
            actual,
        }
    }

    /// Create an invalid decision error.
    #[must_use]
    pub fn invalid_decision(message: impl Into<String>) -> Self {
        Self::InvalidDecision(message.into())
    }

    /// Returns the fault of the entry operation, if that is what failed.
    #[must_use]
    pub fn fault(&self) -> Option<&Fault> {
        match self {
            Self::Faulted(fault) => Some(fault),
            _ => None,
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// The captured cause of a faulted operation.
///
/// A `Fault` is cheap to clone: body errors are kept behind an [`Arc`], so
/// every observer of a faulted operation sees the very same cause. Use
/// [`Fault::downcast_ref`] to recover the original error type and
/// [`Fault::same_cause`] to compare identity.
///
/// Any `std::error::Error` converts into a `Fault`, so `?` works inside
/// controlled bodies.
///
/// # Example
///
/// ```rust
/// use testkit_controlled::Fault;
///
/// #[derive(Debug, thiserror::Error)]
/// #[error("boom")]
/// struct Boom;
///
/// let fault = Fault::new(Boom);
/// assert!(fault.is::<Boom>());
/// assert_eq!(fault.to_string(), "boom");
/// ```
#[derive(Clone)]
pub enum Fault {
    /// An error returned by an operation body, stored verbatim.
    Body(Arc<dyn std::error::Error + Send + Sync>),
    /// A panic raised by an operation body.
    Panic(Arc<str>),
    /// Every fault observed by `when_all`, in input order.
    Aggregate(Vec<Fault>),
}

impl Fault {
    /// Wraps a body error.
    #[must_use]
    pub fn new<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Body(Arc::new(error))
    }

    /// Creates a fault describing a panic.
    #[must_use]
    pub fn panic(message: impl Into<String>) -> Self {
        Self::Panic(Arc::from(message.into()))
    }

    /// Aggregates several faults into one.
    #[must_use]
    pub fn aggregate(faults: Vec<Fault>) -> Self {
        Self::Aggregate(faults)
    }

    /// Converts a panic payload caught by `catch_unwind`.
    pub(crate) fn from_panic(payload: &(dyn Any + Send)) -> Self {
        if let Some(message) = payload.downcast_ref::<&'static str>() {
            Self::panic(*message)
        } else if let Some(message) = payload.downcast_ref::<String>() {
            Self::panic(message.clone())
        } else {
            Self::panic("operation panicked")
        }
    }

    /// Returns the original body error if it is of type `E`.
    #[must_use]
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        match self {
            Self::Body(error) => error.downcast_ref::<E>(),
            _ => None,
        }
    }

    /// Returns true if the original body error is of type `E`.
    #[must_use]
    pub fn is<E>(&self) -> bool
    where
        E: std::error::Error + 'static,
    {
        self.downcast_ref::<E>().is_some()
    }

    /// Returns true if this fault came from a panic.
    #[must_use]
    pub fn is_panic(&self) -> bool {
        matches!(self, Self::Panic(_))
    }

    /// Returns the faults carried by an aggregate, or this fault alone.
    #[must_use]
    pub fn inner_faults(&self) -> &[Fault] {
        match self {
            Self::Aggregate(faults) => faults,
            _ => std::slice::from_ref(self),
        }
    }

    /// Returns true if both faults share the same captured cause.
    #[must_use]
    pub fn same_cause(&self, other: &Fault) -> bool {
        match (self, other) {
            (Self::Body(a), Self::Body(b)) => Arc::ptr_eq(a, b),
            (Self::Panic(a), Self::Panic(b)) => Arc::ptr_eq(a, b),
            (Self::Aggregate(a), Self::Aggregate(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_cause(y))
            }
            _ => false,
        }
    }
}

impl<E> From<E> for Fault
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(error: E) -> Self {
        Self::new(error)
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Body(error) => write!(f, "{error}"),
            Self::Panic(message) => write!(f, "panicked: {message}"),
            Self::Aggregate(faults) => {
                write!(f, "{} fault(s) occurred", faults.len())?;
                for fault in faults {
                    write!(f, "; {fault}")?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Debug for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Body(error) => f.debug_tuple("Body").field(error).finish(),
            Self::Panic(message) => f.debug_tuple("Panic").field(message).finish(),
            Self::Aggregate(faults) => f.debug_tuple("Aggregate").field(faults).finish(),
        }
    }
}
