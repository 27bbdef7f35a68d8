//! Running controlled executions
//!
//! A [`Runtime`] drives one controlled execution per call to
//! [`Runtime::block_on`]. Each execution gets a fresh scheduler, so ids
//! restart at `Op(0)` and nothing leaks between runs. The decision source
//! is rebuilt from [`Config::policy`] for every execution unless a custom
//! one was supplied.
//!
//! # Example
//!
//! ```rust
//! use testkit_controlled::{Config, Fault, Runtime};
//!
//! let runtime = Runtime::new(Config::default().with_seed(3));
//! let sum = runtime
//!     .block_on(|ctx| async move {
//!         let a = ctx.spawn(async { 1 });
//!         let b = ctx.spawn(async { 2 });
//!         Ok::<_, Fault>(a.await? + b.await?)
//!     })
//!     .unwrap();
//!
//! assert_eq!(sum, 3);
//! assert!(!runtime.trace().is_empty());
//! ```

mod context;

pub use context::Context;

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info_span};

use crate::config::Config;
use crate::decision::{DecisionSource, DecisionTrace, Recorder};
use crate::error::{Error, Fault, Result};
use crate::scheduler::Scheduler;
use crate::task::{OperationInfo, OperationStatus};

/// Drives controlled executions.
pub struct Runtime {
    config: Config,
    decisions: Arc<Mutex<Recorder>>,
    /// Set when the decision source was supplied by the caller and must
    /// keep its state across executions.
    custom_source: bool,
    last: Mutex<Option<Arc<Scheduler>>>,
}

impl Runtime {
    /// Creates a runtime using the decision source named by `config.policy`.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let source = config.policy.clone().into_source();
        Self {
            config,
            decisions: Arc::new(Mutex::new(Recorder::new(source))),
            custom_source: false,
            last: Mutex::new(None),
        }
    }

    /// Creates a runtime driven by a caller-supplied decision source.
    ///
    /// `config.policy` is ignored. The source is reused, with whatever
    /// state it has, by every execution of this runtime.
    #[must_use]
    pub fn with_decision_source(config: Config, source: impl DecisionSource + 'static) -> Self {
        Self {
            config,
            decisions: Arc::new(Mutex::new(Recorder::new(Box::new(source)))),
            custom_source: true,
            last: Mutex::new(None),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Runs a controlled execution to completion.
    ///
    /// `f` receives the execution's [`Context`] and returns the body of the
    /// entry operation. The call returns once the entry operation is
    /// terminal and every other operation that can still make progress has
    /// run. Operations left blocked at that point are handled according to
    /// [`Config::unfinished`].
    ///
    /// # Errors
    ///
    /// - [`Error::Faulted`] if the entry operation faulted.
    /// - [`Error::Deadlock`] if the execution got stuck.
    /// - [`Error::StepLimitExceeded`] if it ran for too many steps.
    /// - [`Error::InvalidDecision`] if the decision source misbehaved.
    pub fn block_on<F, Fut, T, E>(&self, f: F) -> Result<T>
    where
        F: FnOnce(Context) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Into<Fault>,
    {
        let span = info_span!("controlled_execution");
        let _guard = span.enter();

        if let Some(previous) = self.last.lock().take() {
            previous.release();
        }
        {
            let mut decisions = self.decisions.lock();
            if self.custom_source {
                decisions.begin();
            } else {
                *decisions = Recorder::new(self.config.policy.clone().into_source());
            }
        }

        let scheduler = Scheduler::new(self.config.clone(), Arc::clone(&self.decisions));
        let ctx = Context::new(Arc::clone(&scheduler));
        let slot: Arc<Mutex<Option<T>>> = Arc::new(Mutex::new(None));

        let body = f(ctx.clone());
        let out = Arc::clone(&slot);
        let entry = ctx.run_named("entry", async move {
            let value = body.await.map_err(Into::<Fault>::into)?;
            *out.lock() = Some(value);
            Ok::<_, Fault>(())
        });
        drop(ctx);

        let outcome = scheduler.run(entry.id());
        let fault = entry.fault().ok();
        let status = entry.status();
        scheduler.teardown();
        debug!(steps = scheduler.steps(), entry = %status, "execution finished");
        *self.last.lock() = Some(scheduler);

        if let Some(fault) = fault {
            return Err(Error::Faulted(fault));
        }
        outcome?;
        let value = slot.lock().take();
        value.ok_or_else(|| Error::invalid_state(entry.id(), "Completed", status))
    }

    /// Returns the decisions made during the last execution.
    ///
    /// Feed it to [`SchedulingPolicy::Replay`](crate::SchedulingPolicy::Replay)
    /// to reproduce that execution.
    #[must_use]
    pub fn trace(&self) -> DecisionTrace {
        self.decisions.lock().trace().clone()
    }

    /// Returns a snapshot of every operation of the last execution.
    #[must_use]
    pub fn operations(&self) -> Vec<OperationInfo> {
        self.last
            .lock()
            .as_ref()
            .map(|scheduler| scheduler.infos())
            .unwrap_or_default()
    }

    /// Returns the number of scheduling steps of the last execution.
    #[must_use]
    pub fn steps(&self) -> usize {
        self.last
            .lock()
            .as_ref()
            .map_or(0, |scheduler| scheduler.steps())
    }

    /// Returns the operations of the last execution that never reached a
    /// terminal state.
    #[must_use]
    pub fn unfinished(&self) -> Vec<OperationInfo> {
        self.operations()
            .into_iter()
            .filter(|info| !info.status.is_terminal())
            .collect()
    }

    /// Returns how many operations of the last execution ended in `status`.
    #[must_use]
    pub fn count(&self, status: OperationStatus) -> usize {
        self.operations()
            .iter()
            .filter(|info| info.status == status)
            .count()
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        if let Some(scheduler) = self.last.get_mut().take() {
            scheduler.release();
        }
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.config)
            .field("custom_source", &self.custom_source)
            .finish_non_exhaustive()
    }
}
