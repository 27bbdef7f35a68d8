//! Pluggable resolution of every nondeterministic choice
//!
//! A controlled execution never decides on its own which operation runs
//! next. It hands the set of runnable operations to a [`DecisionSource`]
//! and follows the answer. Swapping the source swaps the exploration
//! strategy: a seeded random walk, a scripted replay of an earlier run, or
//! an external search driver.
//!
//! Every answer is recorded into a [`DecisionTrace`], which can be fed back
//! through [`SchedulingPolicy::Replay`] to reproduce an execution exactly.
//!
//! # Example
//!
//! ```rust
//! use testkit_controlled::decision::{DecisionSource, RandomDecisions};
//! use testkit_controlled::task::OperationId;
//!
//! let ids = [OperationId::new(0), OperationId::new(1)];
//! let mut a = RandomDecisions::new(7);
//! let mut b = RandomDecisions::new(7);
//! assert_eq!(a.choose(&ids), b.choose(&ids));
//! ```

mod policy;

pub use policy::{Fifo, Lifo, RandomDecisions, ReplayDecisions, RoundRobin, SchedulingPolicy};

use tracing::trace;

use crate::error::{Error, Result};
use crate::task::OperationId;

/// Resolves scheduling and value choices for a controlled execution.
///
/// Implementations must be deterministic given the same history of calls;
/// that is what makes an execution replayable.
pub trait DecisionSource: Send {
    /// Picks the next operation to run. `runnable` is non-empty and sorted
    /// by id; the returned id must be one of its elements.
    fn choose(&mut self, runnable: &[OperationId]) -> OperationId;

    /// Picks a nondeterministic boolean.
    fn choose_bool(&mut self) -> bool;

    /// Picks a nondeterministic integer in `0..max`. `max` is at least 2.
    fn choose_int(&mut self, max: usize) -> usize;
}

/// One resolved choice.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Decision {
    /// The scheduler ran this operation next.
    Schedule(OperationId),
    /// A boolean choice.
    Bool(bool),
    /// An integer choice.
    Int(usize),
}

/// The ordered list of decisions made during one execution.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DecisionTrace {
    decisions: Vec<Decision>,
}

impl DecisionTrace {
    /// Creates an empty trace.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a decision.
    pub fn push(&mut self, decision: Decision) {
        self.decisions.push(decision);
    }

    /// Returns the number of recorded decisions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.decisions.len()
    }

    /// Returns true if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }

    /// Iterates over the recorded decisions in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Decision> {
        self.decisions.iter()
    }

    /// Returns only the scheduling decisions, in order.
    #[must_use]
    pub fn schedule(&self) -> Vec<OperationId> {
        self.decisions
            .iter()
            .filter_map(|d| match d {
                Decision::Schedule(id) => Some(*id),
                _ => None,
            })
            .collect()
    }
}

impl FromIterator<Decision> for DecisionTrace {
    fn from_iter<I: IntoIterator<Item = Decision>>(iter: I) -> Self {
        Self {
            decisions: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for DecisionTrace {
    type Item = Decision;
    type IntoIter = std::vec::IntoIter<Decision>;

    fn into_iter(self) -> Self::IntoIter {
        self.decisions.into_iter()
    }
}

/// Wraps a decision source, validating and recording each answer.
pub(crate) struct Recorder {
    source: Box<dyn DecisionSource>,
    trace: DecisionTrace,
}

impl Recorder {
    pub(crate) fn new(source: Box<dyn DecisionSource>) -> Self {
        Self {
            source,
            trace: DecisionTrace::new(),
        }
    }

    /// Starts a fresh trace for a new execution.
    pub(crate) fn begin(&mut self) {
        self.trace = DecisionTrace::new();
    }

    pub(crate) fn trace(&self) -> &DecisionTrace {
        &self.trace
    }

    pub(crate) fn choose(&mut self, runnable: &[OperationId]) -> Result<OperationId> {
        let chosen = self.source.choose(runnable);
        if !runnable.contains(&chosen) {
            return Err(Error::invalid_decision(format!(
                "{chosen} is not among the {} runnable operation(s)",
                runnable.len()
            )));
        }
        trace!(chosen = %chosen, runnable = runnable.len(), "scheduling decision");
        self.trace.push(Decision::Schedule(chosen));
        Ok(chosen)
    }

    pub(crate) fn choose_bool(&mut self) -> bool {
        let value = self.source.choose_bool();
        trace!(value, "boolean decision");
        self.trace.push(Decision::Bool(value));
        value
    }

    pub(crate) fn choose_int(&mut self, max: usize) -> Result<usize> {
        if max <= 1 {
            return Ok(0);
        }
        let value = self.source.choose_int(max);
        if value >= max {
            return Err(Error::invalid_decision(format!(
                "integer {value} is out of range 0..{max}"
            )));
        }
        trace!(value, max, "integer decision");
        self.trace.push(Decision::Int(value));
        Ok(value)
    }
}
