//! Runtime configuration
//!
//! [`Config`] is a small builder describing how one controlled execution is
//! driven.
//!
//! ```rust
//! use std::time::Duration;
//! use testkit_controlled::{Config, DelayPolicy, SchedulingPolicy, UnfinishedPolicy};
//!
//! let config = Config::default()
//!     .with_seed(7)
//!     .with_delay_policy(DelayPolicy::VirtualTime)
//!     .with_max_steps(10_000)
//!     .with_unfinished(UnfinishedPolicy::Ignore)
//!     .with_start_time(Duration::from_secs(100));
//!
//! assert_eq!(config.policy, SchedulingPolicy::SeededRandom(7));
//! ```

use std::time::Duration;

use crate::decision::SchedulingPolicy;

/// Default bound on scheduling steps per execution.
pub const DEFAULT_MAX_STEPS: usize = 100_000;

/// How `delay` interacts with scheduling.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DelayPolicy {
    /// A delay is only a scheduling point. The delayed operation stays
    /// eligible and the decision source alone decides when it resumes.
    #[default]
    Yield,
    /// A delay blocks on a virtual timer. When nothing else can run the
    /// clock jumps to the earliest deadline.
    VirtualTime,
}

/// What to do with operations that are still not terminal once the entry
/// operation finished and nothing else can run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UnfinishedPolicy {
    /// Report the execution as deadlocked.
    #[default]
    Fail,
    /// Log the stuck operations and succeed anyway.
    Ignore,
}

/// Configuration for a [`Runtime`](crate::Runtime).
#[derive(Clone, Debug)]
pub struct Config {
    /// How runnable operations and nondeterministic values are chosen.
    pub policy: SchedulingPolicy,
    /// How `delay` behaves.
    pub delay_policy: DelayPolicy,
    /// Maximum number of scheduling steps before the execution is aborted.
    pub max_steps: usize,
    /// Handling of operations left unfinished at the end of an execution.
    pub unfinished: UnfinishedPolicy,
    /// Initial reading of the virtual clock.
    pub start_time: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            policy: SchedulingPolicy::RoundRobin,
            delay_policy: DelayPolicy::Yield,
            max_steps: DEFAULT_MAX_STEPS,
            unfinished: UnfinishedPolicy::Fail,
            start_time: Duration::ZERO,
        }
    }
}

impl Config {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the scheduling policy.
    #[must_use]
    pub fn with_policy(mut self, policy: SchedulingPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Uses seeded random scheduling.
    #[must_use]
    pub fn with_seed(self, seed: u64) -> Self {
        self.with_policy(SchedulingPolicy::SeededRandom(seed))
    }

    /// Sets the delay policy.
    #[must_use]
    pub fn with_delay_policy(mut self, delay_policy: DelayPolicy) -> Self {
        self.delay_policy = delay_policy;
        self
    }

    /// Sets the step limit.
    #[must_use]
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Sets the unfinished-operation policy.
    #[must_use]
    pub fn with_unfinished(mut self, unfinished: UnfinishedPolicy) -> Self {
        self.unfinished = unfinished;
        self
    }

    /// Sets the initial virtual time.
    #[must_use]
    pub fn with_start_time(mut self, start_time: Duration) -> Self {
        self.start_time = start_time;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::new();
        assert_eq!(config.policy, SchedulingPolicy::RoundRobin);
        assert_eq!(config.delay_policy, DelayPolicy::Yield);
        assert_eq!(config.max_steps, DEFAULT_MAX_STEPS);
        assert_eq!(config.unfinished, UnfinishedPolicy::Fail);
        assert_eq!(config.start_time, Duration::ZERO);
    }

    #[test]
    fn test_builder_chain() {
        let config = Config::default()
            .with_policy(SchedulingPolicy::Lifo)
            .with_max_steps(5)
            .with_unfinished(UnfinishedPolicy::Ignore);

        assert_eq!(config.policy, SchedulingPolicy::Lifo);
        assert_eq!(config.max_steps, 5);
        assert_eq!(config.unfinished, UnfinishedPolicy::Ignore);
    }

    #[test]
    fn test_with_seed() {
        let config = Config::default().with_seed(99);
        assert_eq!(config.policy, SchedulingPolicy::SeededRandom(99));
    }
}
