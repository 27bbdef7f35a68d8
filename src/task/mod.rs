//! Controlled operations and the handles test code holds on to
//!
//! Every unit of work in a controlled execution is an operation owned by the
//! scheduler. Test code only ever sees a [`ControlledTask`], a cheap
//! non-owning handle that reads the operation's state and result and can be
//! awaited from inside other operations.

mod handle;
mod state;

pub use handle::{ControlledTask, Join};
pub use state::{OperationId, OperationInfo, OperationStatus};
