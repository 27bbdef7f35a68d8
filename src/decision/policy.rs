//! Built-in decision sources.

use std::collections::VecDeque;
use std::fmt;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::warn;

use super::{Decision, DecisionSource, DecisionTrace};
use crate::task::OperationId;

/// Scheduling policy for choosing among runnable operations.
///
/// # Example
///
/// ```rust
/// use testkit_controlled::{Config, Runtime, SchedulingPolicy};
///
/// // Reproducible random ordering
/// let runtime = Runtime::new(Config::default().with_policy(SchedulingPolicy::SeededRandom(42)));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SchedulingPolicy {
    /// Cycle through runnable operations in id order.
    #[default]
    RoundRobin,
    /// Always run the oldest runnable operation.
    Fifo,
    /// Always run the newest runnable operation.
    Lifo,
    /// Pseudo-random choices from the given seed.
    SeededRandom(u64),
    /// Repeat the decisions of an earlier execution.
    Replay(DecisionTrace),
}

impl SchedulingPolicy {
    /// Builds the decision source implementing this policy.
    #[must_use]
    pub fn into_source(self) -> Box<dyn DecisionSource> {
        match self {
            SchedulingPolicy::RoundRobin => Box::new(RoundRobin::default()),
            SchedulingPolicy::Fifo => Box::new(Fifo),
            SchedulingPolicy::Lifo => Box::new(Lifo),
            SchedulingPolicy::SeededRandom(seed) => Box::new(RandomDecisions::new(seed)),
            SchedulingPolicy::Replay(trace) => Box::new(ReplayDecisions::new(trace)),
        }
    }
}

/// Runs the runnable operation following the one chosen last, wrapping
/// around. Every runnable operation gets a turn; value choices are always
/// `false`/`0`.
#[derive(Clone, Copy, Debug, Default)]
pub struct RoundRobin {
    last: Option<OperationId>,
}

impl DecisionSource for RoundRobin {
    fn choose(&mut self, runnable: &[OperationId]) -> OperationId {
        let next = self
            .last
            .and_then(|last| runnable.iter().copied().find(|id| *id > last))
            .unwrap_or(runnable[0]);
        self.last = Some(next);
        next
    }

    fn choose_bool(&mut self) -> bool {
        false
    }

    fn choose_int(&mut self, _max: usize) -> usize {
        0
    }
}

/// Always runs the oldest runnable operation; value choices are always
/// `false`/`0`.
///
/// An operation that keeps yielding starves younger ones under this policy.
#[derive(Clone, Copy, Debug, Default)]
pub struct Fifo;

impl DecisionSource for Fifo {
    fn choose(&mut self, runnable: &[OperationId]) -> OperationId {
        runnable[0]
    }

    fn choose_bool(&mut self) -> bool {
        false
    }

    fn choose_int(&mut self, _max: usize) -> usize {
        0
    }
}

/// Runs the most recently created operation first; value choices are
/// always `true`/`max - 1`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Lifo;

impl DecisionSource for Lifo {
    fn choose(&mut self, runnable: &[OperationId]) -> OperationId {
        runnable[runnable.len() - 1]
    }

    fn choose_bool(&mut self) -> bool {
        true
    }

    fn choose_int(&mut self, max: usize) -> usize {
        max.saturating_sub(1)
    }
}

/// Seeded pseudo-random decisions.
///
/// The same seed always yields the same sequence of answers for the same
/// sequence of questions.
pub struct RandomDecisions {
    seed: u64,
    rng: ChaCha8Rng,
}

impl RandomDecisions {
    /// Creates a source from a seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Returns the seed this source was created with.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl fmt::Debug for RandomDecisions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RandomDecisions")
            .field("seed", &self.seed)
            .finish_non_exhaustive()
    }
}

impl DecisionSource for RandomDecisions {
    fn choose(&mut self, runnable: &[OperationId]) -> OperationId {
        runnable[self.rng.gen_range(0..runnable.len())]
    }

    fn choose_bool(&mut self) -> bool {
        self.rng.gen_bool(0.5)
    }

    fn choose_int(&mut self, max: usize) -> usize {
        self.rng.gen_range(0..max)
    }
}

/// Replays a recorded [`DecisionTrace`].
///
/// When the program asks a question the trace cannot answer (the trace ran
/// out, or the next recorded decision is of another kind), the source falls
/// back to the [`Fifo`] answer and remembers that it diverged.
#[derive(Debug)]
pub struct ReplayDecisions {
    remaining: VecDeque<Decision>,
    diverged: bool,
}

impl ReplayDecisions {
    /// Creates a replaying source.
    #[must_use]
    pub fn new(trace: DecisionTrace) -> Self {
        Self {
            remaining: trace.into_iter().collect(),
            diverged: false,
        }
    }

    /// Returns true if some question could not be answered from the trace.
    #[must_use]
    pub fn has_diverged(&self) -> bool {
        self.diverged
    }

    /// Returns the number of recorded decisions not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.remaining.len()
    }

    fn next_or_diverge(&mut self) -> Option<Decision> {
        let next = self.remaining.pop_front();
        if next.is_none() && !self.diverged {
            warn!("replay trace exhausted, falling back to fifo decisions");
            self.diverged = true;
        }
        next
    }

    fn diverge(&mut self, expected: &str, found: Decision) {
        warn!(expected, found = ?found, "replay trace diverged");
        self.diverged = true;
    }
}

impl DecisionSource for ReplayDecisions {
    fn choose(&mut self, runnable: &[OperationId]) -> OperationId {
        match self.next_or_diverge() {
            Some(Decision::Schedule(id)) if runnable.contains(&id) => id,
            Some(other) => {
                self.diverge("schedule", other);
                runnable[0]
            }
            None => runnable[0],
        }
    }

    fn choose_bool(&mut self) -> bool {
        match self.next_or_diverge() {
            Some(Decision::Bool(value)) => value,
            Some(other) => {
                self.diverge("bool", other);
                false
            }
            None => false,
        }
    }

    fn choose_int(&mut self, max: usize) -> usize {
        match self.next_or_diverge() {
            Some(Decision::Int(value)) if value < max => value,
            Some(other) => {
                self.diverge("int", other);
                0
            }
            None => 0,
        }
    }
}
