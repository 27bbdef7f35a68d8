//! First-terminal race.

use std::sync::Arc;

use tracing::debug;

use super::wait::{local_targets, WaitFor};
use crate::error::{Error, Fault};
use crate::scheduler::Scheduler;
use crate::task::ControlledTask;

/// Body of the result node created by [`Context::when_any`](crate::Context::when_any).
///
/// The winner is the input that reached a terminal state first in schedule
/// order. A faulted winner propagates its own fault untouched; losers keep
/// running.
pub(crate) async fn when_any<T>(
    scheduler: Arc<Scheduler>,
    inputs: Vec<ControlledTask<T>>,
) -> Result<ControlledTask<T>, Fault> {
    if inputs.is_empty() {
        return Err(Fault::new(Error::EmptyCombinator));
    }
    let targets = local_targets(&scheduler, &inputs)?;
    WaitFor::any(Arc::clone(&scheduler), targets.clone()).await?;

    let Some(winner) = scheduler.first_terminal(&targets) else {
        let first = targets[0];
        return Err(Error::invalid_state(first, "terminal", scheduler.status(first)?).into());
    };
    debug!(winner = %winner, inputs = targets.len(), "when_any resolved");

    if let Ok(fault) = scheduler.fault(winner) {
        return Err(fault);
    }
    inputs
        .into_iter()
        .find(|task| task.id() == winner)
        .ok_or_else(|| Fault::new(Error::UnknownOperation(winner)))
}
