//! Wait for every input.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use super::wait::{local_targets, WaitFor};
use crate::error::Fault;
use crate::scheduler::Scheduler;
use crate::task::ControlledTask;

/// Body of the node created by [`Context::when_all`](crate::Context::when_all).
///
/// Collects values in input order. If any input faulted, every distinct
/// fault is aggregated in input order.
pub(crate) async fn when_all<T: Clone + 'static>(
    scheduler: Arc<Scheduler>,
    inputs: Vec<ControlledTask<T>>,
) -> Result<Vec<T>, Fault> {
    if inputs.is_empty() {
        return Ok(Vec::new());
    }
    let targets = local_targets(&scheduler, &inputs)?;
    WaitFor::all(Arc::clone(&scheduler), targets.clone()).await?;

    let mut values = Vec::with_capacity(targets.len());
    let mut faults = Vec::new();
    let mut seen = BTreeSet::new();
    for id in &targets {
        match scheduler.outcome::<T>(*id)? {
            Ok(value) => values.push(value),
            Err(fault) => {
                // Duplicate inputs contribute their fault once.
                if seen.insert(*id) {
                    faults.push(fault);
                }
            }
        }
    }

    if faults.is_empty() {
        Ok(values)
    } else {
        debug!(faulted = faults.len(), inputs = targets.len(), "when_all faulted");
        Err(Fault::aggregate(faults))
    }
}
